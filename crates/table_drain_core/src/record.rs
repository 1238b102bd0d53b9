use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DrainError;

pub const DEFAULT_PARTITION_KEY: &str = "id";

/// An item as returned by a scan. Schema-agnostic apart from the key attributes.
pub type Record = BTreeMap<String, AttributeValue>;

/// Attribute values in the DynamoDB data model. Numbers stay in their decimal
/// string form so conversions to and from the wire are lossless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Number(String),
    Binary(Vec<u8>),
    Bool(bool),
    Null,
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
    StringSet(Vec<String>),
    NumberSet(Vec<String>),
    BinarySet(Vec<Vec<u8>>),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn number(value: impl fmt::Display) -> Self {
        Self::Number(value.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) | Self::Number(value) => f.write_str(value),
            Self::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Null => f.write_str("null"),
            Self::List(items) => write!(f, "<list of {}>", items.len()),
            Self::Map(entries) => write!(f, "<map of {}>", entries.len()),
            Self::StringSet(items) | Self::NumberSet(items) => write!(f, "<set of {}>", items.len()),
            Self::BinarySet(items) => write!(f, "<set of {}>", items.len()),
        }
    }
}

/// Names of the attributes that make up a table's primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub partition_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
}

impl Default for KeySchema {
    fn default() -> Self {
        Self::partition(DEFAULT_PARTITION_KEY)
    }
}

impl KeySchema {
    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = vec![self.partition_key.clone()];
        names.extend(self.sort_key.clone());
        names
    }

    /// Extracts the primary key of `record`, failing if any key attribute is absent.
    pub fn key_of(&self, record: &Record) -> Result<PrimaryKey, DrainError> {
        let mut attributes = Record::new();
        for name in self.attribute_names() {
            let Some(value) = record.get(&name) else {
                return Err(DrainError::MissingKey { attribute: name });
            };
            attributes.insert(name, value.clone());
        }
        Ok(PrimaryKey(attributes))
    }
}

/// The key attributes identifying one record; what a delete is addressed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey(Record);

impl PrimaryKey {
    pub fn new(attributes: Record) -> Self {
        Self(attributes)
    }

    pub fn single(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Self(Record::from([(attribute.into(), value)]))
    }

    pub fn attributes(&self) -> &Record {
        &self.0
    }

    pub fn into_record(self) -> Record {
        self.0
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Opaque continuation token: the last key a bounded scan evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(Record);

impl Cursor {
    pub fn new(last_evaluated_key: Record) -> Self {
        Self(last_evaluated_key)
    }

    pub fn as_record(&self) -> &Record {
        &self.0
    }

    pub fn into_record(self) -> Record {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, count: i64) -> Record {
        Record::from([
            ("id".to_string(), AttributeValue::string(id)),
            ("count".to_string(), AttributeValue::number(count)),
        ])
    }

    #[test]
    fn key_of_keeps_only_key_attributes() {
        let key = KeySchema::default()
            .key_of(&item("a", 1))
            .expect("id should be present");

        assert_eq!(key, PrimaryKey::single("id", AttributeValue::string("a")));
        assert_eq!(key.to_string(), "id=a");
    }

    #[test]
    fn key_of_reports_missing_sort_key() {
        let schema = KeySchema::partition("id").with_sort_key("version");
        let error = schema
            .key_of(&item("a", 1))
            .expect_err("sort key is absent");

        assert_eq!(
            error,
            DrainError::MissingKey {
                attribute: "version".to_string()
            }
        );
    }

    #[test]
    fn composite_key_displays_in_attribute_order() {
        let mut record = item("a", 1);
        record.insert("version".to_string(), AttributeValue::number(3));
        let key = KeySchema::partition("id")
            .with_sort_key("version")
            .key_of(&record)
            .expect("both key attributes are present");

        assert_eq!(key.to_string(), "id=a,version=3");
        assert_eq!(key.attributes().len(), 2);
    }
}
