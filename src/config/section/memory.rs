//! `[memory]` and `[changeset]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [memory]
//! max_changes = 1000          # Retained change records
//! fail_fast = false           # Reject a whole batch on one invalid event
//! persist = "state.json"      # Snapshot file, restored on start
//!
//! [changeset]
//! max_entries = 1000          # Entries per changeset document
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::super::util::non_zero;
use crate::config::{ConfigDiagnostics, FieldPath};
use crate::memory::MemoryConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySectionConfig {
    pub max_changes: usize,
    pub fail_fast: bool,
    pub persist: Option<PathBuf>,
}

impl Default for MemorySectionConfig {
    fn default() -> Self {
        Self {
            max_changes: 1000,
            fail_fast: false,
            persist: None,
        }
    }
}

impl MemorySectionConfig {
    pub const MAX_CHANGES: FieldPath = FieldPath::new("memory.max_changes");
    pub const FAIL_FAST: FieldPath = FieldPath::new("memory.fail_fast");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.max_changes == 0 {
            diag.error_with_hint(
                Self::MAX_CHANGES,
                "must be greater than 0",
                "the memory needs room for at least one change",
            );
        }
        if self.fail_fast {
            diag.hint(
                Self::FAIL_FAST,
                "a rejected harvest page is fetched again every cycle until the source is fixed",
            );
        }
    }

    pub fn to_memory_config(&self) -> MemoryConfig {
        MemoryConfig {
            max_changes: non_zero(self.max_changes),
            fail_fast: self.fail_fast,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangesetConfig {
    pub max_entries: usize,
}

impl Default for ChangesetConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

impl ChangesetConfig {
    pub const MAX_ENTRIES: FieldPath = FieldPath::new("changeset.max_entries");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.max_entries == 0 {
            diag.error(Self::MAX_ENTRIES, "must be greater than 0");
        }
    }

    pub fn page_size(&self) -> NonZeroUsize {
        non_zero(self.max_entries)
    }
}
