pub mod attribute;
pub mod dynamodb;
