//! Lazy paged iteration over stored records.

use std::collections::VecDeque;

use quarry_core::errors::QuarryResult;
use quarry_core::models::{Record, RecordId};

use crate::engine::ContentStore;

/// Iterator over records in ascending id order.
///
/// Pages are read from persisted storage as the iterator advances, so a scan
/// started after a `put` sees that record. Calling `ContentStore::scan` again
/// restarts from the beginning. Iteration stops after the first error.
pub struct RecordScan<'a> {
    store: &'a ContentStore,
    after: RecordId,
    page_size: usize,
    buffered: VecDeque<Record>,
    exhausted: bool,
}

impl<'a> RecordScan<'a> {
    pub(crate) fn new(store: &'a ContentStore, after: RecordId, page_size: usize) -> Self {
        Self {
            store,
            after,
            page_size: page_size.max(1),
            buffered: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Id of the last record handed out (or the starting point).
    pub fn position(&self) -> RecordId {
        self.after
    }

    fn fill(&mut self) -> QuarryResult<()> {
        let page = self.store.read_page(self.after, self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        self.buffered.extend(page);
        Ok(())
    }
}

impl Iterator for RecordScan<'_> {
    type Item = QuarryResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffered.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let record = self.buffered.pop_front()?;
        self.after = record.id;
        Some(Ok(record))
    }
}
