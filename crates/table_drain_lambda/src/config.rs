use std::str::FromStr;

use table_drain_core::batch::DEFAULT_MAX_UNPROCESSED_ROUNDS;
use table_drain_core::drain::DrainOptions;
use table_drain_core::record::{KeySchema, DEFAULT_PARTITION_KEY};

use crate::adapters::dynamodb::DYNAMODB_MAX_BATCH_WRITE_ITEMS;

pub const TABLE_NAME_VAR: &str = "DRAIN_TABLE_NAME";
pub const KEY_ATTRIBUTE_VAR: &str = "DRAIN_KEY_ATTRIBUTE";
pub const SORT_KEY_VAR: &str = "DRAIN_SORT_KEY";
pub const PAGE_LIMIT_VAR: &str = "DRAIN_PAGE_LIMIT";
pub const BATCH_SIZE_VAR: &str = "DRAIN_BATCH_SIZE";
pub const CONSISTENT_READ_VAR: &str = "DRAIN_CONSISTENT_READ";
pub const MAX_UNPROCESSED_ROUNDS_VAR: &str = "DRAIN_MAX_UNPROCESSED_ROUNDS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainerConfig {
    pub table_name: String,
    pub key_schema: KeySchema,
    pub page_limit: Option<u32>,
    pub batch_size: usize,
    pub consistent_read: bool,
    pub max_unprocessed_rounds: usize,
}

impl DrainerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let table_name = read(TABLE_NAME_VAR).ok_or(ConfigError::Missing(TABLE_NAME_VAR))?;

        let mut key_schema = KeySchema::partition(
            read(KEY_ATTRIBUTE_VAR).unwrap_or_else(|| DEFAULT_PARTITION_KEY.to_string()),
        );
        if let Some(sort_key) = read(SORT_KEY_VAR) {
            key_schema = key_schema.with_sort_key(sort_key);
        }

        let page_limit = read(PAGE_LIMIT_VAR)
            .map(|value| parse_positive::<u32>(PAGE_LIMIT_VAR, value))
            .transpose()?;

        let batch_size = read(BATCH_SIZE_VAR)
            .map(|value| parse_positive::<usize>(BATCH_SIZE_VAR, value))
            .transpose()?
            .unwrap_or(DYNAMODB_MAX_BATCH_WRITE_ITEMS);
        if batch_size > DYNAMODB_MAX_BATCH_WRITE_ITEMS {
            return Err(ConfigError::Invalid {
                name: BATCH_SIZE_VAR,
                value: batch_size.to_string(),
                reason: format!("must not exceed {DYNAMODB_MAX_BATCH_WRITE_ITEMS}"),
            });
        }

        let consistent_read = read(CONSISTENT_READ_VAR)
            .map(|value| parse_bool(CONSISTENT_READ_VAR, value))
            .transpose()?
            .unwrap_or(false);

        let max_unprocessed_rounds = read(MAX_UNPROCESSED_ROUNDS_VAR)
            .map(|value| parse_positive::<usize>(MAX_UNPROCESSED_ROUNDS_VAR, value))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_UNPROCESSED_ROUNDS);

        Ok(Self {
            table_name,
            key_schema,
            page_limit,
            batch_size,
            consistent_read,
            max_unprocessed_rounds,
        })
    }

    pub fn drain_options(&self) -> DrainOptions {
        DrainOptions {
            key_schema: self.key_schema.clone(),
            page_limit: self.page_limit,
            batch_capacity: self.batch_size,
            consistent_read: self.consistent_read,
            keys_only: true,
            max_unprocessed_rounds: self.max_unprocessed_rounds,
        }
    }
}

fn parse_positive<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    match value.parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(parsed),
        Ok(_) => Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        Err(_) => Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be a positive integer".to_string(),
        }),
    }
}

fn parse_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be true or false".to_string(),
        }),
    }
}
