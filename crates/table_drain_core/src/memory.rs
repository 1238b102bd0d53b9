//! In-process table used by tests and local dry runs.
//!
//! Pagination mirrors DynamoDB: records come back in key order, and a page
//! filled up to its limit always carries a cursor, even when nothing follows.
//! Failures and unprocessed deletes can be injected per call.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{BatchDeleteOutcome, ScanPage, ScanRequest, TableBackend};
use crate::error::{BackendError, DrainError};
use crate::record::{Cursor, KeySchema, PrimaryKey, Record};

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Default)]
struct TableState {
    records: BTreeMap<PrimaryKey, Record>,
    scan_calls: usize,
    delete_calls: usize,
    deleted_keys: Vec<PrimaryKey>,
    scan_failures: HashMap<usize, BackendError>,
    delete_failures: HashMap<usize, BackendError>,
    unprocessed_budget: usize,
}

#[derive(Debug)]
pub struct InMemoryTable {
    name: String,
    key_schema: KeySchema,
    page_size: usize,
    max_batch_size: usize,
    state: Mutex<TableState>,
}

impl InMemoryTable {
    pub fn new(name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            key_schema,
            page_size: DEFAULT_PAGE_SIZE,
            max_batch_size: crate::backend::DEFAULT_MAX_BATCH_SIZE,
            state: Mutex::new(TableState::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.name
    }

    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    /// Inserts or replaces the record addressed by its key attributes.
    pub fn insert(&self, record: Record) -> Result<(), DrainError> {
        let key = self.key_schema.key_of(&record)?;
        self.lock().records.insert(key, record);
        Ok(())
    }

    pub fn seed(&self, records: impl IntoIterator<Item = Record>) -> Result<(), DrainError> {
        for record in records {
            self.insert(record)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    pub fn contains(&self, key: &PrimaryKey) -> bool {
        self.lock().records.contains_key(key)
    }

    pub fn scan_calls(&self) -> usize {
        self.lock().scan_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.lock().delete_calls
    }

    /// Every key a batch delete processed, in submission order.
    pub fn deleted_keys(&self) -> Vec<PrimaryKey> {
        self.lock().deleted_keys.clone()
    }

    /// Makes the `call_number`-th scan (1-based, counted over the table's lifetime) fail.
    pub fn fail_scan_call(&self, call_number: usize, error: BackendError) {
        self.lock().scan_failures.insert(call_number, error);
    }

    pub fn fail_delete_call(&self, call_number: usize, error: BackendError) {
        self.lock().delete_failures.insert(call_number, error);
    }

    /// Reports the next `count` submitted keys as unprocessed instead of deleting them.
    pub fn leave_unprocessed(&self, count: usize) {
        self.lock().unprocessed_budget += count;
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TableBackend for InMemoryTable {
    fn scan(&self, request: ScanRequest<'_>) -> Result<ScanPage, BackendError> {
        let mut state = self.lock();
        state.scan_calls += 1;
        let call = state.scan_calls;
        if let Some(error) = state.scan_failures.remove(&call) {
            return Err(error);
        }

        let limit = match request.options.limit {
            Some(0) => {
                return Err(BackendError::permanent(
                    "scan limit must be greater than or equal to 1",
                ))
            }
            Some(limit) => (limit as usize).min(self.page_size),
            None => self.page_size,
        };

        let start = match request.cursor {
            Some(cursor) => {
                let key = self.key_schema.key_of(cursor.as_record()).map_err(|_| {
                    BackendError::permanent("exclusive start key does not match the key schema")
                })?;
                Bound::Excluded(key)
            }
            None => Bound::Unbounded,
        };

        let page: Vec<(&PrimaryKey, &Record)> = state
            .records
            .range((start, Bound::Unbounded))
            .take(limit)
            .collect();

        let cursor = if page.len() == limit {
            page.last()
                .map(|(key, _)| Cursor::new((*key).clone().into_record()))
        } else {
            None
        };
        let records = page
            .into_iter()
            .map(|(_, record)| project(record, &request.options.projection))
            .collect();

        Ok(ScanPage { records, cursor })
    }

    fn batch_delete(&self, keys: &[PrimaryKey]) -> Result<BatchDeleteOutcome, BackendError> {
        if keys.is_empty() {
            return Err(BackendError::permanent(
                "batch delete must contain at least one key",
            ));
        }
        if keys.len() > self.max_batch_size {
            return Err(BackendError::permanent(format!(
                "batch of {} keys exceeds the limit of {}",
                keys.len(),
                self.max_batch_size
            )));
        }

        let mut state = self.lock();
        state.delete_calls += 1;
        let call = state.delete_calls;
        if let Some(error) = state.delete_failures.remove(&call) {
            return Err(error);
        }

        let mut unprocessed = Vec::new();
        for key in keys {
            if state.unprocessed_budget > 0 {
                state.unprocessed_budget -= 1;
                unprocessed.push(key.clone());
                continue;
            }
            state.records.remove(key);
            state.deleted_keys.push(key.clone());
        }

        Ok(BatchDeleteOutcome { unprocessed })
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

fn project(record: &Record, projection: &[String]) -> Record {
    if projection.is_empty() {
        return record.clone();
    }
    record
        .iter()
        .filter(|(name, _)| projection.contains(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
