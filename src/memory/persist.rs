//! Change memory persistence.
//!
//! The whole memory is written as one JSON document:
//!
//! ```json
//! {
//!   "last_seq": 5,
//!   "horizon": 2,
//!   "baseline": { "http://ex.org/b": { "state": "present", "timestamp": "..." } },
//!   "records": [ { "seq": 3, "event": { "resource_id": "...", "event_type": "create", ... } } ]
//! }
//! ```
//!
//! Records are stored in their raw form and validated again on restore.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{ChangeMemory, MemoryConfig, MemoryState};
use crate::event::{ChangeRecord, RawEvent, ResourceEvent, Seq};
use crate::inventory::ResourceSet;
use crate::log;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedRecord {
    seq: Seq,
    event: RawEvent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedMemory {
    last_seq: Seq,
    horizon: Seq,
    #[serde(default)]
    baseline: ResourceSet,
    #[serde(default)]
    records: Vec<PersistedRecord>,
}

impl PersistedMemory {
    fn capture(memory: &ChangeMemory) -> Self {
        memory.read_state(|state| Self {
            last_seq: state.last_seq,
            horizon: state.horizon,
            baseline: (*state.baseline).clone(),
            records: state
                .records
                .iter()
                .map(|r| PersistedRecord {
                    seq: r.seq,
                    event: RawEvent::from(r.event.as_ref()),
                })
                .collect(),
        })
    }

    /// Rebuild the in-memory state.
    ///
    /// A record that cannot be restored leaves a hole in the numbering. The
    /// records before it are folded into the baseline and the horizon moves
    /// up to the hole, so cursors below it get a gap instead of a silent skip.
    fn into_state(self) -> MemoryState {
        let mut records = VecDeque::with_capacity(self.records.len());
        let mut baseline = self.baseline;
        let mut horizon = self.horizon;

        for PersistedRecord { seq, event } in self.records {
            let floor = records.back().map_or(horizon, |r: &ChangeRecord| r.seq);
            if seq <= floor {
                log!("memory"; "restore: dropping out-of-order record #{}", seq);
                continue;
            }
            let resource_id = event.resource_id.clone();
            match ResourceEvent::try_from(event) {
                Ok(event) => {
                    if seq > floor + 1 {
                        log!("warning"; "restore: records #{}..#{} are missing", floor + 1, seq - 1);
                        horizon = fold_into(&mut baseline, &mut records, seq - 1);
                    }
                    records.push_back(ChangeRecord::new(seq, event));
                }
                Err(e) => {
                    log!("warning"; "restore: skipping #{} `{}`: {}", seq, resource_id, e);
                    horizon = fold_into(&mut baseline, &mut records, seq);
                }
            }
        }

        let restored = records.back().map_or(horizon, |r| r.seq);
        let last_seq = self.last_seq.max(restored);
        if last_seq > restored {
            log!("warning"; "restore: records #{}..#{} are missing", restored + 1, last_seq);
            horizon = fold_into(&mut baseline, &mut records, last_seq);
        }

        MemoryState {
            records,
            last_seq,
            horizon,
            baseline: Arc::new(baseline),
        }
    }
}

/// Fold every restored record into the baseline and return `horizon`.
fn fold_into(baseline: &mut ResourceSet, records: &mut VecDeque<ChangeRecord>, horizon: Seq) -> Seq {
    for record in records.drain(..) {
        baseline.apply(&record.event);
    }
    baseline.forget_absent();
    horizon
}

/// Write the memory to `path` (temp file + rename).
pub fn save(memory: &ChangeMemory, path: &Path) -> Result<()> {
    let snapshot = PersistedMemory::capture(memory);
    let json = serde_json::to_vec_pretty(&snapshot).context("Failed to serialize change memory")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to move state to {}", path.display()))?;
    Ok(())
}

/// Restore a memory from `path`, or `None` if no state was saved yet.
///
/// Oldest records beyond `config.max_changes` are evicted into the baseline.
pub fn load(path: &Path, config: MemoryConfig) -> Result<Option<ChangeMemory>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read(path).with_context(|| format!("Failed to read state from {}", path.display()))?;
    let snapshot: PersistedMemory = serde_json::from_slice(&content)
        .with_context(|| format!("Failed to parse state in {}", path.display()))?;

    let memory = ChangeMemory::from_state(config, snapshot.into_state());
    log!("memory"; "restored {} changes (last #{}, horizon #{})",
        memory.len(), memory.snapshot_seq(), memory.horizon());
    Ok(Some(memory))
}
