use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{ScanOptions, TableBackend};
use crate::batch::{DeleteBatch, DEFAULT_MAX_UNPROCESSED_ROUNDS};
use crate::error::DrainError;
use crate::record::KeySchema;
use crate::stream::{scan_records, RecordStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainOptions {
    pub key_schema: KeySchema,
    /// Records per scan page; `None` lets the backend decide.
    pub page_limit: Option<u32>,
    pub batch_capacity: usize,
    pub consistent_read: bool,
    /// Scan only the key attributes instead of whole records.
    pub keys_only: bool,
    pub max_unprocessed_rounds: usize,
}

impl Default for DrainOptions {
    fn default() -> Self {
        Self {
            key_schema: KeySchema::default(),
            page_limit: None,
            batch_capacity: crate::backend::DEFAULT_MAX_BATCH_SIZE,
            consistent_read: false,
            keys_only: true,
            max_unprocessed_rounds: DEFAULT_MAX_UNPROCESSED_ROUNDS,
        }
    }
}

impl DrainOptions {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            limit: self.page_limit,
            projection: if self.keys_only {
                self.key_schema.attribute_names()
            } else {
                Vec::new()
            },
            consistent_read: self.consistent_read,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub scan_calls: usize,
    pub records_scanned: usize,
    pub keys_deleted: usize,
    pub delete_calls: usize,
}

/// Deletes every record of the table behind `backend`.
///
/// Scans from the start of the table, following cursors until a page comes
/// back without one, and feeds each record's key into one delete batch. Any
/// backend error aborts the drain; keys from pages already scanned are still
/// flushed before the error is returned. Nothing is retried here, and calling
/// `drain` again simply starts over on whatever is left.
pub fn drain<B: TableBackend + ?Sized>(
    backend: &B,
    options: &DrainOptions,
) -> Result<DrainReport, DrainError> {
    let started_at = Instant::now();
    info!(
        component = "table_drainer",
        event = "drain_started",
        page_limit = ?options.page_limit,
        batch_capacity = options.batch_capacity,
        consistent_read = options.consistent_read
    );

    let mut records = scan_records(backend, options.scan_options());
    let mut batch = DeleteBatch::open(backend, options.batch_capacity)
        .with_max_unprocessed_rounds(options.max_unprocessed_rounds);

    let enqueued = enqueue_all(&mut records, &mut batch, &options.key_schema);
    let closed = batch.close();

    let stats = match (enqueued, closed) {
        (Ok(()), Ok(stats)) => stats,
        (Ok(()), Err(error)) => return Err(failed(&records, started_at, error.into())),
        (Err(error), Ok(_)) => return Err(failed(&records, started_at, error)),
        (Err(error), Err(close_error)) => {
            warn!(
                component = "table_drainer",
                event = "batch_close_failed",
                error = %close_error
            );
            return Err(failed(&records, started_at, error));
        }
    };

    let report = DrainReport {
        scan_calls: records.scan_calls(),
        records_scanned: records.records_scanned(),
        keys_deleted: stats.keys_deleted,
        delete_calls: stats.delete_calls,
    };
    info!(
        component = "table_drainer",
        event = "drain_completed",
        scan_calls = report.scan_calls,
        records_scanned = report.records_scanned,
        keys_deleted = report.keys_deleted,
        delete_calls = report.delete_calls,
        duration_ms = started_at.elapsed().as_millis() as u64
    );
    Ok(report)
}

fn enqueue_all<B: TableBackend + ?Sized>(
    records: &mut RecordStream<'_, B>,
    batch: &mut DeleteBatch<'_, B>,
    key_schema: &KeySchema,
) -> Result<(), DrainError> {
    for record in records.by_ref() {
        let key = key_schema.key_of(&record?)?;
        batch.delete(key)?;
    }
    Ok(())
}

fn failed<B: TableBackend + ?Sized>(
    records: &RecordStream<'_, B>,
    started_at: Instant,
    error: DrainError,
) -> DrainError {
    warn!(
        component = "table_drainer",
        event = "drain_failed",
        scan_calls = records.scan_calls(),
        records_scanned = records.records_scanned(),
        transient = error.is_transient(),
        duration_ms = started_at.elapsed().as_millis() as u64,
        error = %error
    );
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::memory::InMemoryTable;
    use crate::record::{AttributeValue, Record};

    fn item(id: &str, count: i64) -> Record {
        Record::from([
            ("id".to_string(), AttributeValue::string(id)),
            ("count".to_string(), AttributeValue::number(count)),
        ])
    }

    #[test]
    fn scan_options_project_key_attributes_by_default() {
        let options = DrainOptions {
            key_schema: KeySchema::partition("pk").with_sort_key("sk"),
            page_limit: Some(50),
            ..DrainOptions::default()
        };

        let scan = options.scan_options();
        assert_eq!(scan.projection, vec!["pk".to_string(), "sk".to_string()]);
        assert_eq!(scan.limit, Some(50));

        let whole = DrainOptions {
            keys_only: false,
            ..options
        };
        assert!(whole.scan_options().projection.is_empty());
    }

    #[test]
    fn record_without_key_aborts_drain() {
        let table = InMemoryTable::new("items", KeySchema::default());
        table
            .seed([item("a", 1), item("b", 2)])
            .expect("seed should pass");
        let options = DrainOptions {
            key_schema: KeySchema::partition("id").with_sort_key("missing"),
            keys_only: false,
            ..DrainOptions::default()
        };

        let error = drain(&table, &options).expect_err("sort key is absent");
        assert!(matches!(error, DrainError::MissingKey { .. }));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn delete_failure_surfaces_unchanged() {
        let table = InMemoryTable::new("items", KeySchema::default()).with_page_size(1);
        table
            .seed([item("a", 1), item("b", 2)])
            .expect("seed should pass");
        let denied = BackendError::permanent("access denied");
        table.fail_delete_call(1, denied.clone());
        let options = DrainOptions {
            batch_capacity: 1,
            ..DrainOptions::default()
        };

        let error = drain(&table, &options).expect_err("delete fails");
        assert_eq!(error, DrainError::Backend(denied));
    }
}
