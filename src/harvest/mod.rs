//! Harvesting from an upstream source into the change memory.
//!
//! A [`HarvestDriver`] knows how to talk to one source; the [`Harvester`]
//! runs poll cycles against it:
//!
//! ```text
//! poll_once
//!   ├── fetch(from, None)        → page 1 ─→ record_batch
//!   ├── fetch(from, Some(token)) → page 2 ─→ record_batch
//!   └── ...until resumption == None
//! ```
//!
//! A failed fetch is retried with exponential backoff before the cycle
//! gives up. Pages already recorded in the cycle stay recorded and are
//! committed to the driver; a page whose batch was rejected is not, so the
//! next cycle fetches it again.

mod file;

pub use file::{JsonLinesSource, read_events, read_listing};

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::event::RawEvent;
use crate::memory::ChangeMemory;
use crate::{debug, log};

/// One page of upstream events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestPage {
    pub events: Vec<RawEvent>,
    /// Token for the next page; `None` when the source is exhausted for now.
    pub resumption: Option<String>,
}

/// Fetches pages of events from an upstream source.
pub trait HarvestDriver: Send {
    /// Fetch the page after `resumption` (or the first page when `None`).
    ///
    /// `from` is the newest event timestamp the harvester has seen, for
    /// sources that filter by time.
    fn fetch(&mut self, from: Option<DateTime<Utc>>, resumption: Option<&str>)
    -> Result<HarvestPage>;

    /// The page returned by the last `fetch` was recorded.
    ///
    /// Drivers that keep their own position across cycles advance it here.
    fn commit(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per fetch, including the first.
    pub attempts: u32,
    /// Delay before the first retry; doubled for each following one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << retry.min(16))
    }
}

/// Totals for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub pages: usize,
    pub recorded: usize,
    pub rejected: usize,
}

pub struct Harvester<D> {
    driver: D,
    memory: Arc<ChangeMemory>,
    retry: RetryPolicy,
    last_seen: Option<DateTime<Utc>>,
}

impl<D: HarvestDriver> Harvester<D> {
    pub fn new(driver: D, memory: Arc<ChangeMemory>, retry: RetryPolicy) -> Self {
        Self {
            driver,
            memory,
            retry,
            last_seen: None,
        }
    }

    pub fn memory(&self) -> &Arc<ChangeMemory> {
        &self.memory
    }

    /// Newest event timestamp harvested so far.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Run one cycle: fetch until the source is exhausted, one batch per page.
    pub fn poll_once(&mut self) -> Result<HarvestReport> {
        let mut report = HarvestReport::default();
        let mut resumption: Option<String> = None;

        loop {
            let page = self.fetch_with_retry(resumption.as_deref())?;
            report.pages += 1;

            if let Some(newest) = page.events.iter().map(|e| e.timestamp).max() {
                self.last_seen = self.last_seen.max(Some(newest));
            }

            if !page.events.is_empty() {
                let batch = self
                    .memory
                    .record_batch(page.events)
                    .context("Harvested batch rejected")?;
                report.recorded += batch.recorded.len();
                report.rejected += batch.rejected.len();
            }
            self.driver.commit();

            match page.resumption {
                Some(token) => resumption = Some(token),
                None => break,
            }
        }

        if report.recorded > 0 || report.rejected > 0 {
            log!("harvest"; "{} recorded, {} rejected in {} page(s)",
                report.recorded, report.rejected, report.pages);
        } else {
            debug!("harvest"; "no new events");
        }
        Ok(report)
    }

    fn fetch_with_retry(&mut self, resumption: Option<&str>) -> Result<HarvestPage> {
        let attempts = self.retry.attempts.max(1);
        let mut retry = 0;
        loop {
            match self.driver.fetch(self.last_seen, resumption) {
                Ok(page) => return Ok(page),
                Err(e) if retry + 1 < attempts => {
                    let delay = self.retry.delay(retry);
                    log!("harvest"; "fetch failed ({:#}), retrying in {:?}", e, delay);
                    thread::sleep(delay);
                    retry += 1;
                }
                Err(e) => {
                    return Err(e.context(format!("Fetch failed after {attempts} attempt(s)")));
                }
            }
        }
    }
}
