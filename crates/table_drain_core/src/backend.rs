use crate::error::BackendError;
use crate::record::{Cursor, PrimaryKey, Record};

/// DynamoDB's `BatchWriteItem` ceiling, used when a backend does not state its own.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 25;

/// Parameters shared by every page of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Upper bound on records per page. `None` leaves it to the backend.
    pub limit: Option<u32>,
    /// Attributes to return. Empty means whole records.
    pub projection: Vec<String>,
    pub consistent_read: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    pub cursor: Option<&'a Cursor>,
    pub options: &'a ScanOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub records: Vec<Record>,
    /// Present when the backend stopped early; absent on the last page.
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteOutcome {
    /// Keys the backend accepted the request for but did not delete this round.
    pub unprocessed: Vec<PrimaryKey>,
}

/// A remote key-value table that can be scanned in bounded pages and deleted from in batches.
///
/// Calls block until the backend answers. Deleting an absent key must succeed
/// as a no-op.
pub trait TableBackend {
    fn scan(&self, request: ScanRequest<'_>) -> Result<ScanPage, BackendError>;

    fn batch_delete(&self, keys: &[PrimaryKey]) -> Result<BatchDeleteOutcome, BackendError>;

    fn max_batch_size(&self) -> usize {
        DEFAULT_MAX_BATCH_SIZE
    }
}

impl<T: TableBackend + ?Sized> TableBackend for &T {
    fn scan(&self, request: ScanRequest<'_>) -> Result<ScanPage, BackendError> {
        (**self).scan(request)
    }

    fn batch_delete(&self, keys: &[PrimaryKey]) -> Result<BatchDeleteOutcome, BackendError> {
        (**self).batch_delete(keys)
    }

    fn max_batch_size(&self) -> usize {
        (**self).max_batch_size()
    }
}
