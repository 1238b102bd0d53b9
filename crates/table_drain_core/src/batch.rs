use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;

use crate::backend::TableBackend;
use crate::error::BackendError;
use crate::record::PrimaryKey;

pub const DEFAULT_MAX_UNPROCESSED_ROUNDS: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub keys_deleted: usize,
    pub delete_calls: usize,
    /// Keys re-queued because the backend reported them unprocessed.
    pub resubmitted: usize,
}

/// Scoped buffer of pending deletes.
///
/// Keys are sent in chunks of at most `capacity`. Unprocessed keys go back into
/// the buffer and ride along with the next flush. [`DeleteBatch::close`] flushes
/// everything and reports the outcome; dropping an unclosed batch flushes too,
/// logging any failure since it cannot be returned.
pub struct DeleteBatch<'a, B: TableBackend + ?Sized> {
    backend: &'a B,
    capacity: usize,
    max_unprocessed_rounds: usize,
    pending: Vec<PrimaryKey>,
    pending_keys: HashSet<PrimaryKey>,
    stats: BatchStats,
    closed: bool,
}

impl<'a, B: TableBackend + ?Sized> DeleteBatch<'a, B> {
    /// Opens a batch; `capacity` is clamped to `1..=backend.max_batch_size()`.
    pub fn open(backend: &'a B, capacity: usize) -> Self {
        let capacity = capacity.clamp(1, backend.max_batch_size().max(1));
        Self {
            backend,
            capacity,
            max_unprocessed_rounds: DEFAULT_MAX_UNPROCESSED_ROUNDS,
            pending: Vec::with_capacity(capacity),
            pending_keys: HashSet::with_capacity(capacity),
            stats: BatchStats::default(),
            closed: false,
        }
    }

    pub fn with_max_unprocessed_rounds(mut self, rounds: usize) -> Self {
        self.max_unprocessed_rounds = rounds.max(1);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    /// Queues `key`, flushing once a full chunk is buffered. A key already pending is ignored.
    pub fn delete(&mut self, key: PrimaryKey) -> Result<(), BackendError> {
        if !self.pending_keys.insert(key.clone()) {
            return Ok(());
        }
        self.pending.push(key);
        self.flush_while_at_least(self.capacity)
    }

    /// Sends every pending key, including keys that come back unprocessed.
    pub fn flush(&mut self) -> Result<(), BackendError> {
        self.flush_while_at_least(1)
    }

    pub fn close(mut self) -> Result<BatchStats, BackendError> {
        self.closed = true;
        self.flush()?;
        Ok(self.stats)
    }

    fn flush_while_at_least(&mut self, threshold: usize) -> Result<(), BackendError> {
        let mut stalled_rounds = 0usize;
        while self.pending.len() >= threshold {
            if self.send_chunk()? > 0 {
                stalled_rounds = 0;
                continue;
            }
            stalled_rounds += 1;
            if stalled_rounds >= self.max_unprocessed_rounds {
                return Err(BackendError::transient(format!(
                    "{} keys were still unprocessed after {stalled_rounds} consecutive batch rounds",
                    self.pending.len()
                )));
            }
        }
        Ok(())
    }

    /// Returns how many keys the backend actually processed.
    fn send_chunk(&mut self) -> Result<usize, BackendError> {
        let take = self.pending.len().min(self.capacity);
        let chunk: Vec<PrimaryKey> = self.pending.drain(..take).collect();
        for key in &chunk {
            self.pending_keys.remove(key);
        }

        self.stats.delete_calls += 1;
        let outcome = self.backend.batch_delete(&chunk)?;

        let processed = chunk.len().saturating_sub(outcome.unprocessed.len());
        self.stats.keys_deleted += processed;
        for key in outcome.unprocessed {
            if self.pending_keys.insert(key.clone()) {
                self.pending.push(key);
                self.stats.resubmitted += 1;
            }
        }
        Ok(processed)
    }
}

impl<B: TableBackend + ?Sized> Drop for DeleteBatch<'_, B> {
    fn drop(&mut self) {
        if self.closed || self.pending.is_empty() {
            return;
        }
        let pending = self.pending.len();
        if let Err(error) = self.flush() {
            warn!(
                component = "delete_batch",
                event = "flush_on_drop_failed",
                pending,
                error = %error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTable;
    use crate::record::{AttributeValue, KeySchema, Record};

    fn key(id: &str) -> PrimaryKey {
        PrimaryKey::single("id", AttributeValue::string(id))
    }

    fn table_with(ids: &[&str]) -> InMemoryTable {
        let table = InMemoryTable::new("items", KeySchema::default());
        table
            .seed(
                ids.iter()
                    .map(|id| Record::from([("id".to_string(), AttributeValue::string(*id))])),
            )
            .expect("seed should pass");
        table
    }

    #[test]
    fn flushes_when_capacity_is_reached() {
        let table = table_with(&["a", "b", "c"]);
        let mut batch = DeleteBatch::open(&table, 2);

        batch.delete(key("a")).expect("queue a");
        assert_eq!(table.delete_calls(), 0);
        batch.delete(key("b")).expect("queue b");
        assert_eq!(table.delete_calls(), 1);
        batch.delete(key("c")).expect("queue c");
        assert_eq!(batch.pending(), 1);

        let stats = batch.close().expect("close should flush");
        assert_eq!(stats.keys_deleted, 3);
        assert_eq!(stats.delete_calls, 2);
        assert!(table.is_empty());
    }

    #[test]
    fn capacity_is_clamped_to_backend_limit() {
        let table = InMemoryTable::new("items", KeySchema::default()).with_max_batch_size(10);
        assert_eq!(DeleteBatch::open(&table, 500).capacity(), 10);
        assert_eq!(DeleteBatch::open(&table, 0).capacity(), 1);
    }

    #[test]
    fn duplicate_pending_keys_collapse() {
        let table = table_with(&["a"]);
        let mut batch = DeleteBatch::open(&table, 5);
        batch.delete(key("a")).expect("queue a");
        batch.delete(key("a")).expect("queue a again");

        let stats = batch.close().expect("close should flush");
        assert_eq!(stats.keys_deleted, 1);
        assert_eq!(table.deleted_keys(), vec![key("a")]);
    }

    #[test]
    fn unprocessed_keys_are_resent() {
        let table = table_with(&["a", "b", "c"]);
        table.leave_unprocessed(2);
        let mut batch = DeleteBatch::open(&table, 3);
        for id in ["a", "b", "c"] {
            batch.delete(key(id)).expect("queue key");
        }

        let stats = batch.close().expect("close should flush");
        assert_eq!(stats.keys_deleted, 3);
        assert_eq!(stats.resubmitted, 2);
        assert_eq!(stats.delete_calls, 2);
        assert!(table.is_empty());
    }

    #[test]
    fn gives_up_when_backend_never_makes_progress() {
        let table = table_with(&["a"]);
        table.leave_unprocessed(usize::MAX);
        let mut batch = DeleteBatch::open(&table, 5).with_max_unprocessed_rounds(3);
        batch.delete(key("a")).expect("queue a");

        let error = batch.close().expect_err("backend keeps refusing");
        assert!(error.is_transient());
        assert_eq!(table.delete_calls(), 3);
    }

    #[test]
    fn dropping_an_unclosed_batch_flushes_pending_keys() {
        let table = table_with(&["a", "b"]);
        {
            let mut batch = DeleteBatch::open(&table, 25);
            batch.delete(key("a")).expect("queue a");
            batch.delete(key("b")).expect("queue b");
            assert_eq!(table.delete_calls(), 0);
        }

        assert_eq!(table.delete_calls(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn failed_chunk_is_not_resent() {
        let table = table_with(&["a", "b"]);
        table.fail_delete_call(1, BackendError::permanent("access denied"));
        let mut batch = DeleteBatch::open(&table, 1);

        let error = batch.delete(key("a")).expect_err("first flush fails");
        assert!(!error.is_transient());
        assert_eq!(batch.pending(), 0);

        batch.delete(key("b")).expect("later flush succeeds");
        let stats = batch.close().expect("close should pass");
        assert_eq!(stats.keys_deleted, 1);
        assert_eq!(stats.delete_calls, 2);
    }
}
