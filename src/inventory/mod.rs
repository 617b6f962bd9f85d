//! Inventory building.
//!
//! Folds the change memory (baseline + retained records up to a checkpoint)
//! into a [`ResourceSet`] and paginates the present resources, in
//! `resource_id` order, into inventory documents.
//!
//! # Module Structure
//!
//! - `set` - resource set and folding
//! - `strategy` - on-demand vs periodic (cached) building

mod set;
mod strategy;

pub use set::{ResourceSet, ResourceState, fold};
pub use strategy::{InventoryMode, InventoryService, InventoryStrategy, OnDemand, Periodic};

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::document::{InventoryDocument, InventoryEntry, paginate};
use crate::error::{BuildWarning, GapError};
use crate::event::{RawEvent, Seq};
use crate::log;
use crate::memory::ChangeMemory;

/// A rendered inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    /// Sequence checkpoint the inventory reflects. A changeset consumer
    /// continues from here.
    pub as_of: Seq,
    pub documents: Vec<InventoryDocument>,
    /// Events skipped while folding.
    pub warnings: Vec<BuildWarning>,
}

impl Inventory {
    fn from_set(as_of: Seq, set: &ResourceSet, page_size: usize, warnings: Vec<BuildWarning>) -> Self {
        let entries = set
            .present()
            .map(|(loc, lastmod, metadata)| InventoryEntry {
                loc: loc.to_string(),
                lastmod,
                metadata: metadata.clone(),
            })
            .collect();
        Self {
            as_of,
            documents: paginate(entries, page_size),
            warnings,
        }
    }

    /// Number of present resources.
    pub fn resource_count(&self) -> usize {
        self.documents.first().map_or(0, |d| d.page.total_entries)
    }
}

/// Builds inventories from a change memory.
#[derive(Debug, Clone)]
pub struct InventoryBuilder {
    memory: Arc<ChangeMemory>,
    max_sitemap_entries: NonZeroUsize,
}

impl InventoryBuilder {
    pub fn new(memory: Arc<ChangeMemory>, max_sitemap_entries: NonZeroUsize) -> Self {
        Self {
            memory,
            max_sitemap_entries,
        }
    }

    pub fn memory(&self) -> &Arc<ChangeMemory> {
        &self.memory
    }

    /// Inventory as of checkpoint `as_of`.
    ///
    /// Pure function of the checkpoint: two builds at the same `as_of` with no
    /// eviction in between produce identical documents.
    pub fn build(&self, as_of: Seq) -> Result<Inventory, GapError> {
        let view = self.memory.view(as_of)?;
        let set = fold(&view.baseline, &view.records);
        Ok(Inventory::from_set(
            view.as_of,
            &set,
            self.max_sitemap_entries.get(),
            Vec::new(),
        ))
    }

    /// Inventory at the latest checkpoint.
    pub fn build_latest(&self) -> Result<Inventory, GapError> {
        self.build(self.memory.snapshot_seq())
    }

    /// Inventory from a fresh enumeration of the source instead of the memory.
    ///
    /// Malformed listing entries are skipped and reported as warnings; they
    /// never abort the build. The result is stamped with the current memory
    /// checkpoint.
    pub fn enumerate(&self, listing: impl IntoIterator<Item = RawEvent>) -> Inventory {
        let as_of = self.memory.snapshot_seq();
        let mut set = ResourceSet::new();
        let mut warnings = Vec::new();
        for raw in listing {
            if let Err(warning) = set.apply_raw(raw) {
                log!("inventory"; "{}", warning);
                warnings.push(warning);
            }
        }
        Inventory::from_set(as_of, &set, self.max_sitemap_entries.get(), warnings)
    }
}
