//! Change memory: bounded, ordered record of resource events.
//!
//! # Layout
//!
//! ```text
//!   baseline (folded)        retained records (FIFO, capacity C)
//! ┌──────────────────┐ ┌─────┬─────┬─────┬─────┬─────┐
//! │ seq <= horizon   │ │ h+1 │ h+2 │ ... │     │last │ <- next record gets last+1
//! └──────────────────┘ └─────┴─────┴─────┴─────┴─────┘
//!        ▲                 │
//!        └──── evict ──────┘
//! ```
//!
//! Records evicted from the front are folded into a baseline resource set, so
//! an inventory still reflects every event ever recorded. The highest evicted
//! sequence number is the *horizon*: any read that would need history at or
//! below it is a [`GapError`].
//!
//! # Concurrency
//!
//! One writer at a time (`ingest` mutex, held across mutation and
//! notification so publishers see batches in order), many readers. State is
//! behind a `RwLock`; a batch is applied under a single write guard, so
//! readers never observe a partial batch.

pub mod persist;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{BatchError, BuildWarning, GapError, ValidationError};
use crate::event::{ChangeRecord, RawEvent, ResourceEvent, Seq};
use crate::inventory::ResourceSet;
use crate::publisher::Publisher;
use crate::{debug, log};

/// Construction parameters, validated and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Maximum number of retained records.
    pub max_changes: NonZeroUsize,
    /// Reject a whole batch when any event in it is invalid.
    pub fail_fast: bool,
}

impl MemoryConfig {
    pub fn new(max_changes: NonZeroUsize) -> Self {
        Self {
            max_changes,
            fail_fast: false,
        }
    }
}

/// Result of a `record_batch` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Sequence numbers assigned, in input order.
    pub recorded: Vec<Seq>,
    /// Input index and reason of every rejected event.
    pub rejected: Vec<(usize, ValidationError)>,
}

/// One page of a `query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePage {
    pub records: Vec<ChangeRecord>,
    /// Cursor to pass as `since` on the next call.
    pub next_seq: Seq,
}

/// Consistent read snapshot: baseline plus retained records up to `as_of`.
#[derive(Debug, Clone)]
pub struct MemoryView {
    pub as_of: Seq,
    pub baseline: Arc<ResourceSet>,
    pub records: Vec<ChangeRecord>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    records: VecDeque<ChangeRecord>,
    /// Highest sequence number ever assigned.
    last_seq: Seq,
    /// Highest evicted sequence number.
    horizon: Seq,
    baseline: Arc<ResourceSet>,
}

impl MemoryState {
    /// Append and evict. The returned record stays valid even when it was
    /// evicted by this very push.
    fn push(&mut self, event: ResourceEvent, capacity: usize) -> ChangeRecord {
        if let Some(last) = self.records.back()
            && event.timestamp() < last.event.timestamp()
        {
            debug!("memory"; "`{}` arrived with an earlier timestamp than #{}, kept in arrival order",
                event.resource_id(), last.seq);
        }

        self.last_seq += 1;
        let record = ChangeRecord::new(self.last_seq, event);
        self.records.push_back(record.clone());
        self.evict(capacity);
        record
    }

    fn evict(&mut self, capacity: usize) {
        if self.records.len() <= capacity {
            return;
        }
        let baseline = Arc::make_mut(&mut self.baseline);
        while self.records.len() > capacity {
            let Some(oldest) = self.records.pop_front() else {
                break;
            };
            baseline.apply(&oldest.event);
            self.horizon = oldest.seq;
        }
        baseline.forget_absent();
    }

    fn check_cursor(&self, since: Seq) -> Result<(), GapError> {
        if since < self.horizon {
            Err(GapError {
                requested: since,
                horizon: self.horizon,
            })
        } else {
            Ok(())
        }
    }

    /// Index of the first retained record with `seq > since`.
    fn start_index(&self, since: Seq) -> usize {
        self.records.partition_point(|r| r.seq <= since)
    }
}

/// The change memory.
pub struct ChangeMemory {
    config: MemoryConfig,
    state: RwLock<MemoryState>,
    ingest: Mutex<()>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl std::fmt::Debug for ChangeMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ChangeMemory")
            .field("config", &self.config)
            .field("len", &state.records.len())
            .field("last_seq", &state.last_seq)
            .field("horizon", &state.horizon)
            .field("publisher", &self.publisher.is_some())
            .finish()
    }
}

impl ChangeMemory {
    pub fn new(config: MemoryConfig) -> Self {
        Self::from_state(config, MemoryState::default())
    }

    pub(crate) fn from_state(config: MemoryConfig, mut state: MemoryState) -> Self {
        state.evict(config.max_changes.get());
        Self {
            config,
            state: RwLock::new(state),
            ingest: Mutex::new(()),
            publisher: None,
        }
    }

    /// Attach the collaborator notified after each `record_batch`.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn config(&self) -> MemoryConfig {
        self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.max_changes.get()
    }

    // ========================================================================
    // Ingest
    // ========================================================================

    /// Seed the baseline with an initial listing.
    ///
    /// Seeds consume no sequence numbers and trigger no notification.
    /// Malformed seeds are skipped and returned as warnings.
    pub fn bootstrap(&self, seeds: impl IntoIterator<Item = RawEvent>) -> Vec<BuildWarning> {
        let _writer = self.ingest.lock();
        let mut state = self.state.write();
        let baseline = Arc::make_mut(&mut state.baseline);

        let mut warnings = Vec::new();
        let mut seeded = 0usize;
        for raw in seeds {
            match baseline.apply_raw(raw) {
                Ok(()) => seeded += 1,
                Err(warning) => warnings.push(warning),
            }
        }
        baseline.forget_absent();

        log!("memory"; "bootstrapped {} resources ({} skipped)", seeded, warnings.len());
        warnings
    }

    /// Append one event and return its sequence number.
    ///
    /// Does not notify the publisher; use [`Self::record_batch`] for that.
    pub fn record(&self, raw: RawEvent) -> Result<Seq, ValidationError> {
        let event = ResourceEvent::try_from(raw)?;
        let _writer = self.ingest.lock();
        Ok(self.state.write().push(event, self.capacity()).seq)
    }

    /// Append a batch atomically with respect to readers, then notify.
    ///
    /// Invalid events are rejected individually unless `fail_fast` is set, in
    /// which case the first invalid event rejects the whole batch and nothing
    /// is recorded.
    pub fn record_batch(&self, batch: Vec<RawEvent>) -> Result<BatchReport, BatchError> {
        let mut report = BatchReport::default();
        let mut valid = Vec::with_capacity(batch.len());
        for (index, raw) in batch.into_iter().enumerate() {
            match ResourceEvent::try_from(raw) {
                Ok(event) => valid.push(event),
                Err(source) if self.config.fail_fast => {
                    return Err(BatchError { index, source });
                }
                Err(source) => report.rejected.push((index, source)),
            }
        }

        let _writer = self.ingest.lock();
        // The publisher sees the whole batch, including records a large
        // batch pushed out of the window before the call returned.
        let recorded: Vec<ChangeRecord> = {
            let mut state = self.state.write();
            let capacity = self.capacity();
            valid
                .into_iter()
                .map(|event| state.push(event, capacity))
                .collect()
        };
        report.recorded = recorded.iter().map(|r| r.seq).collect();

        for (index, error) in &report.rejected {
            log!("memory"; "rejected event #{}: {}", index, error);
        }
        debug!("memory"; "recorded {} events", report.recorded.len());

        self.notify(&recorded);
        Ok(report)
    }

    fn notify(&self, batch: &[ChangeRecord]) {
        if let Some(publisher) = &self.publisher
            && let Err(e) = publisher.on_batch_recorded(batch)
        {
            log!("publish"; "notification failed: {:#}", e);
        }
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Records with `seq > since`, oldest first, at most `limit`.
    pub fn query(&self, since: Seq, limit: usize) -> Result<ChangePage, GapError> {
        let state = self.state.read();
        state.check_cursor(since)?;

        let start = state.start_index(since);
        let records: Vec<ChangeRecord> = state.records.range(start..).take(limit).cloned().collect();
        let next_seq = records.last().map_or(since, |r| r.seq);
        Ok(ChangePage { records, next_seq })
    }

    /// Records with `from < seq <= to`, read under one lock.
    pub fn range(&self, from: Seq, to: Seq) -> Result<Vec<ChangeRecord>, GapError> {
        self.range_clamped(from, Some(to)).map(|(_, records)| records)
    }

    /// Like [`Self::range`], with `to` clamped to the latest checkpoint under
    /// the same lock. Returns the effective upper bound, never below `from`.
    pub fn range_clamped(&self, from: Seq, to: Option<Seq>) -> Result<(Seq, Vec<ChangeRecord>), GapError> {
        let state = self.state.read();
        state.check_cursor(from)?;

        let upper = to.map_or(state.last_seq, |to| to.min(state.last_seq)).max(from);
        let start = state.start_index(from);
        let records = state
            .records
            .range(start..)
            .take_while(|r| r.seq <= upper)
            .cloned()
            .collect();
        Ok((upper, records))
    }

    /// Baseline plus records up to `as_of`, for inventory folding.
    pub fn view(&self, as_of: Seq) -> Result<MemoryView, GapError> {
        let state = self.state.read();
        state.check_cursor(as_of)?;

        let as_of = as_of.min(state.last_seq);
        let records = state
            .records
            .iter()
            .take_while(|r| r.seq <= as_of)
            .cloned()
            .collect();
        Ok(MemoryView {
            as_of,
            baseline: Arc::clone(&state.baseline),
            records,
        })
    }

    /// Highest assigned sequence number (0 before the first record).
    pub fn snapshot_seq(&self) -> Seq {
        self.state.read().last_seq
    }

    /// Highest evicted sequence number (0 if nothing was evicted).
    pub fn horizon(&self) -> Seq {
        self.state.read().horizon
    }

    /// Sequence number of the oldest retained record.
    pub fn oldest_seq(&self) -> Option<Seq> {
        self.state.read().records.front().map(|r| r.seq)
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    pub(crate) fn read_state<R>(&self, f: impl FnOnce(&MemoryState) -> R) -> R {
        f(&self.state.read())
    }
}
