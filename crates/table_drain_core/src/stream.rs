use std::iter::FusedIterator;

use tracing::debug;

use crate::backend::{ScanOptions, ScanRequest, TableBackend};
use crate::error::BackendError;
use crate::record::{Cursor, Record};

#[derive(Debug)]
enum ScanState {
    Scanning(Option<Cursor>),
    Done,
}

/// Lazy sequence over every record of a table, one bounded page in memory at a time.
///
/// The stream cannot be resumed from the middle: starting over means building
/// a new one, which scans from the beginning of the table. After the first
/// error it yields nothing further.
pub struct RecordStream<'a, B: TableBackend + ?Sized> {
    backend: &'a B,
    options: ScanOptions,
    state: ScanState,
    page: std::vec::IntoIter<Record>,
    scan_calls: usize,
    records_scanned: usize,
}

pub fn scan_records<B: TableBackend + ?Sized>(
    backend: &B,
    options: ScanOptions,
) -> RecordStream<'_, B> {
    RecordStream {
        backend,
        options,
        state: ScanState::Scanning(None),
        page: Vec::new().into_iter(),
        scan_calls: 0,
        records_scanned: 0,
    }
}

impl<B: TableBackend + ?Sized> RecordStream<'_, B> {
    /// Scan calls issued so far, failed ones included.
    pub fn scan_calls(&self) -> usize {
        self.scan_calls
    }

    pub fn records_scanned(&self) -> usize {
        self.records_scanned
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, ScanState::Done) && self.page.as_slice().is_empty()
    }

    fn fetch_next_page(&mut self, cursor: Option<Cursor>) -> Result<(), BackendError> {
        self.scan_calls += 1;
        let result = self.backend.scan(ScanRequest {
            cursor: cursor.as_ref(),
            options: &self.options,
        });
        let page = match result {
            Ok(page) => page,
            Err(error) => {
                self.state = ScanState::Done;
                return Err(error);
            }
        };

        self.records_scanned += page.records.len();
        debug!(
            component = "record_stream",
            event = "page_scanned",
            page = self.scan_calls,
            records = page.records.len(),
            has_cursor = page.cursor.is_some()
        );

        self.state = match page.cursor {
            Some(next) => ScanState::Scanning(Some(next)),
            None => ScanState::Done,
        };
        self.page = page.records.into_iter();
        Ok(())
    }
}

impl<B: TableBackend + ?Sized> Iterator for RecordStream<'_, B> {
    type Item = Result<Record, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.page.next() {
                return Some(Ok(record));
            }

            let cursor = match &mut self.state {
                ScanState::Done => return None,
                ScanState::Scanning(cursor) => cursor.take(),
            };

            if let Err(error) = self.fetch_next_page(cursor) {
                return Some(Err(error));
            }
        }
    }
}

impl<B: TableBackend + ?Sized> FusedIterator for RecordStream<'_, B> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTable;
    use crate::record::{AttributeValue, KeySchema};

    fn seeded_table(count: usize, page_size: usize) -> InMemoryTable {
        let table = InMemoryTable::new("items", KeySchema::default()).with_page_size(page_size);
        table
            .seed((0..count).map(|index| {
                Record::from([(
                    "id".to_string(),
                    AttributeValue::string(format!("item-{index:04}")),
                )])
            }))
            .expect("seed should pass");
        table
    }

    #[test]
    fn yields_every_record_across_pages() {
        let table = seeded_table(7, 3);
        let mut stream = scan_records(&table, ScanOptions::default());

        let records: Vec<Record> = stream
            .by_ref()
            .collect::<Result<_, _>>()
            .expect("scan should pass");

        assert_eq!(records.len(), 7);
        assert_eq!(stream.scan_calls(), 3);
        assert_eq!(stream.records_scanned(), 7);
        assert!(stream.is_done());
    }

    #[test]
    fn pages_are_fetched_lazily() {
        let table = seeded_table(10, 5);
        let mut stream = scan_records(&table, ScanOptions::default());

        assert_eq!(table.scan_calls(), 0);
        stream.next().expect("first record").expect("scan should pass");
        assert_eq!(table.scan_calls(), 1);
        for _ in 0..4 {
            stream.next().expect("record").expect("scan should pass");
        }
        assert_eq!(table.scan_calls(), 1);
        stream.next().expect("sixth record").expect("scan should pass");
        assert_eq!(table.scan_calls(), 2);
    }

    #[test]
    fn stops_after_first_error() {
        let table = seeded_table(6, 2);
        table.fail_scan_call(2, BackendError::transient("throttled"));
        let mut stream = scan_records(&table, ScanOptions::default());

        assert!(stream.next().expect("record").is_ok());
        assert!(stream.next().expect("record").is_ok());
        let error = stream
            .next()
            .expect("error item")
            .expect_err("second page fails");
        assert!(error.is_transient());
        assert!(stream.next().is_none());
        assert_eq!(table.scan_calls(), 2);
    }

    #[test]
    fn empty_table_takes_one_scan() {
        let table = seeded_table(0, 4);
        let mut stream = scan_records(&table, ScanOptions::default());

        assert!(stream.next().is_none());
        assert_eq!(stream.scan_calls(), 1);
    }
}
