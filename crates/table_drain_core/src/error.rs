use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// Throttling, timeouts and network faults. Retrying the whole drain later is expected to help.
    Transient,
    /// Missing table, denied access, malformed requests.
    Permanent,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// Failure reported by a scan or batch-delete call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} backend error: {message}")]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Permanent, message)
    }

    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transient(&self) -> bool {
        self.kind == BackendErrorKind::Transient
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrainError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("scanned record is missing key attribute '{attribute}'")]
    MissingKey { attribute: String },
}

impl DrainError {
    /// Whether re-invoking the drain later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend(error) => error.is_transient(),
            Self::MissingKey { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display_carries_kind_and_message() {
        let error = BackendError::transient("throughput exceeded");
        assert_eq!(
            error.to_string(),
            "transient backend error: throughput exceeded"
        );
        assert_eq!(error.message(), "throughput exceeded");
    }

    #[test]
    fn drain_error_preserves_backend_error_unchanged() {
        let backend = BackendError::permanent("table not found");
        let error = DrainError::from(backend.clone());

        assert_eq!(error.to_string(), backend.to_string());
        assert!(!error.is_transient());
        assert!(DrainError::from(BackendError::transient("slow down")).is_transient());
    }
}
