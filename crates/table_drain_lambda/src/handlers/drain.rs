use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use table_drain_core::backend::TableBackend;
use table_drain_core::drain::drain;
use table_drain_core::error::DrainError;
use tracing::{error, info};

use crate::config::DrainerConfig;

/// Optional per-invocation overrides. Unknown fields are ignored so scheduler
/// and console test events can be sent as-is.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DrainRequest {
    #[serde(default)]
    pub page_limit: Option<u32>,
    #[serde(default)]
    pub consistent_read: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrainResponse {
    pub status: String,
    pub table_name: String,
    pub scan_calls: usize,
    pub records_scanned: usize,
    pub keys_deleted: usize,
    pub delete_calls: usize,
    pub completed_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DrainHandlerError {
    #[error("invalid drain request: {0}")]
    InvalidRequest(String),
    #[error("drain of table '{table_name}' failed: {source}")]
    Drain {
        table_name: String,
        #[source]
        source: DrainError,
    },
}

impl DrainHandlerError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidRequest(_) => false,
            Self::Drain { source, .. } => source.is_transient(),
        }
    }
}

pub fn handle_drain_event(
    event: Value,
    config: &DrainerConfig,
    backend: &impl TableBackend,
) -> Result<DrainResponse, DrainHandlerError> {
    let request = parse_request(event)?;

    let mut options = config.drain_options();
    if request.page_limit.is_some() {
        options.page_limit = request.page_limit;
    }
    if let Some(consistent_read) = request.consistent_read {
        options.consistent_read = consistent_read;
    }

    info!(
        component = "drain_handler",
        event = "drain_requested",
        table_name = %config.table_name,
        details = %json!({
            "page_limit": options.page_limit,
            "batch_size": options.batch_capacity,
            "consistent_read": options.consistent_read,
        })
    );

    let report = drain(backend, &options).map_err(|source| {
        error!(
            component = "drain_handler",
            event = "drain_failed",
            table_name = %config.table_name,
            transient = source.is_transient(),
            error = %source
        );
        DrainHandlerError::Drain {
            table_name: config.table_name.clone(),
            source,
        }
    })?;

    Ok(DrainResponse {
        status: "drained".to_string(),
        table_name: config.table_name.clone(),
        scan_calls: report.scan_calls,
        records_scanned: report.records_scanned,
        keys_deleted: report.keys_deleted,
        delete_calls: report.delete_calls,
        completed_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Accepts a bare request object, an API-Gateway-style envelope whose `body` is
/// an object or JSON string, or nothing at all.
fn parse_request(event: Value) -> Result<DrainRequest, DrainHandlerError> {
    let payload = match event {
        Value::Null => return Ok(DrainRequest::default()),
        Value::Object(mut object) => match object.remove("body") {
            None => Value::Object(object),
            Some(Value::Null) => return Ok(DrainRequest::default()),
            Some(Value::Object(body)) => Value::Object(body),
            Some(Value::String(text)) if text.trim().is_empty() => {
                return Ok(DrainRequest::default())
            }
            Some(Value::String(text)) => serde_json::from_str(&text).map_err(|error| {
                DrainHandlerError::InvalidRequest(format!("malformed JSON body: {error}"))
            })?,
            Some(_) => {
                return Err(DrainHandlerError::InvalidRequest(
                    "request body must be a JSON object".to_string(),
                ))
            }
        },
        _ => {
            return Err(DrainHandlerError::InvalidRequest(
                "request payload must be a JSON object".to_string(),
            ))
        }
    };

    let request: DrainRequest = serde_json::from_value(payload)
        .map_err(|error| DrainHandlerError::InvalidRequest(error.to_string()))?;
    if request.page_limit == Some(0) {
        return Err(DrainHandlerError::InvalidRequest(
            "page_limit must be greater than zero".to_string(),
        ));
    }
    Ok(request)
}
