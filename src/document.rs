//! Serializable document tree shared by inventories and changesets.
//!
//! A document is one page of entries plus pagination metadata. The XML
//! vocabulary is applied later by [`crate::generator::sitemap`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{EventType, Metadata, Seq};

/// Position of a page within its document set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Zero-based page index.
    pub index: usize,
    /// Number of pages in the set.
    pub count: usize,
    /// Entries across all pages at render time.
    pub total_entries: usize,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl Pagination {
    fn new(index: usize, count: usize, total_entries: usize) -> Self {
        Self {
            index,
            count,
            total_entries,
            prev: index.checked_sub(1),
            next: (index + 1 < count).then_some(index + 1),
        }
    }
}

/// A single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document<E> {
    pub page: Pagination,
    pub entries: Vec<E>,
}

/// Split `entries` into pages of at most `page_size`.
///
/// Always returns at least one (possibly empty) page.
pub fn paginate<E>(entries: Vec<E>, page_size: usize) -> Vec<Document<E>> {
    let page_size = page_size.max(1);
    let total = entries.len();
    let count = total.div_ceil(page_size).max(1);

    let mut pages = Vec::with_capacity(count);
    let mut rest = entries.into_iter();
    for index in 0..count {
        let entries: Vec<E> = rest.by_ref().take(page_size).collect();
        pages.push(Document {
            page: Pagination::new(index, count, total),
            entries,
        });
    }
    pages
}

// ============================================================================
// Inventory
// ============================================================================

/// A present resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub loc: String,
    pub lastmod: DateTime<Utc>,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

pub type InventoryDocument = Document<InventoryEntry>;

// ============================================================================
// Changeset
// ============================================================================

/// A recorded change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub seq: Seq,
    pub loc: String,
    pub lastmod: DateTime<Utc>,
    pub change: EventType,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// One changeset page, covering sequence numbers `from < seq <= to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangesetDocument {
    pub from_seq: Seq,
    pub to_seq: Seq,
    #[serde(flatten)]
    pub doc: Document<ChangeEntry>,
}
