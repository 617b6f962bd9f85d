//! Changeset rendering.
//!
//! Pages the change memory between two sequence checkpoints into changeset
//! documents. Page `k` covers `(from_k, to_k]`:
//!
//! ```text
//! render(from = 10, to = 17), page size 3, records 11..=17
//!
//!   page 0: (10, 13]  11 12 13
//!   page 1: (13, 16]  14 15 16
//!   page 2: (16, 17]  17
//! ```
//!
//! A consumer continues by passing the last page's `to_seq` as the next
//! `from`. Evicted history is reported as [`ReadError::Gap`] and left to the
//! caller to recover from.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::document::{ChangeEntry, ChangesetDocument, paginate};
use crate::error::ReadError;
use crate::event::{ChangeRecord, Seq};
use crate::memory::ChangeMemory;

#[derive(Debug, Clone)]
pub struct ChangesetRenderer {
    memory: Arc<ChangeMemory>,
    page_size: NonZeroUsize,
}

impl ChangesetRenderer {
    pub fn new(memory: Arc<ChangeMemory>, page_size: NonZeroUsize) -> Self {
        Self { memory, page_size }
    }

    pub fn memory(&self) -> &Arc<ChangeMemory> {
        &self.memory
    }

    /// Render changes with `from < seq <= to`.
    ///
    /// `to` defaults to, and is capped at, the latest checkpoint: the last
    /// page never claims sequence numbers that were not assigned yet. An
    /// empty range still yields one empty document so the consumer receives
    /// a cursor.
    pub fn render(&self, from: Seq, to: Option<Seq>) -> Result<Vec<ChangesetDocument>, ReadError> {
        if let Some(to) = to
            && to < from
        {
            return Err(ReadError::InvalidRange { from, to });
        }

        let (to, records) = self.memory.range_clamped(from, to)?;
        let entries: Vec<ChangeEntry> = records.iter().map(entry).collect();

        let pages = paginate(entries, self.page_size.get());
        let last = pages.len() - 1;
        let mut lower = from;
        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(i, doc)| {
                let upper = match doc.entries.last() {
                    Some(entry) if i < last => entry.seq,
                    _ => to,
                };
                let page = ChangesetDocument {
                    from_seq: lower,
                    to_seq: upper,
                    doc,
                };
                lower = upper;
                page
            })
            .collect())
    }
}

fn entry(record: &ChangeRecord) -> ChangeEntry {
    let event = &record.event;
    ChangeEntry {
        seq: record.seq,
        loc: event.resource_id().to_string(),
        lastmod: event.timestamp(),
        change: event.event_type(),
        metadata: event.metadata().clone(),
    }
}
