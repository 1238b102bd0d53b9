use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue as DynamoValue;
use table_drain_core::error::BackendError;
use table_drain_core::record::{AttributeValue, Record};

pub type DynamoItem = HashMap<String, DynamoValue>;

pub fn to_dynamo(value: &AttributeValue) -> DynamoValue {
    match value {
        AttributeValue::String(text) => DynamoValue::S(text.clone()),
        AttributeValue::Number(number) => DynamoValue::N(number.clone()),
        AttributeValue::Binary(bytes) => DynamoValue::B(Blob::new(bytes.clone())),
        AttributeValue::Bool(flag) => DynamoValue::Bool(*flag),
        AttributeValue::Null => DynamoValue::Null(true),
        AttributeValue::List(items) => DynamoValue::L(items.iter().map(to_dynamo).collect()),
        AttributeValue::Map(entries) => DynamoValue::M(record_to_dynamo(entries)),
        AttributeValue::StringSet(items) => DynamoValue::Ss(items.clone()),
        AttributeValue::NumberSet(items) => DynamoValue::Ns(items.clone()),
        AttributeValue::BinarySet(items) => {
            DynamoValue::Bs(items.iter().cloned().map(Blob::new).collect())
        }
    }
}

pub fn from_dynamo(value: &DynamoValue) -> Result<AttributeValue, BackendError> {
    let converted = match value {
        DynamoValue::S(text) => AttributeValue::String(text.clone()),
        DynamoValue::N(number) => AttributeValue::Number(number.clone()),
        DynamoValue::B(blob) => AttributeValue::Binary(blob.as_ref().to_vec()),
        DynamoValue::Bool(flag) => AttributeValue::Bool(*flag),
        DynamoValue::Null(_) => AttributeValue::Null,
        DynamoValue::L(items) => AttributeValue::List(
            items
                .iter()
                .map(from_dynamo)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        DynamoValue::M(entries) => AttributeValue::Map(record_from_dynamo(entries)?),
        DynamoValue::Ss(items) => AttributeValue::StringSet(items.clone()),
        DynamoValue::Ns(items) => AttributeValue::NumberSet(items.clone()),
        DynamoValue::Bs(items) => {
            AttributeValue::BinarySet(items.iter().map(|blob| blob.as_ref().to_vec()).collect())
        }
        _ => {
            return Err(BackendError::permanent(
                "DynamoDB returned an attribute value of an unsupported type",
            ))
        }
    };
    Ok(converted)
}

pub fn record_to_dynamo(record: &Record) -> DynamoItem {
    record
        .iter()
        .map(|(name, value)| (name.clone(), to_dynamo(value)))
        .collect()
}

pub fn record_from_dynamo(item: &DynamoItem) -> Result<Record, BackendError> {
    item.iter()
        .map(|(name, value)| Ok::<_, BackendError>((name.clone(), from_dynamo(value)?)))
        .collect()
}
