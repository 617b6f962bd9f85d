//! Batch notification for downstream publishers.
//!
//! The change memory calls [`Publisher::on_batch_recorded`] once per
//! successful `record_batch`, after the batch is visible to readers. A
//! failing publisher is logged and ignored: it never rolls back or blocks
//! the ingest. The server also reports each inventory written to disk
//! through [`Publisher::on_inventory_written`].

use std::path::Path;

use anyhow::{Result, anyhow};
use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};

use crate::event::ChangeRecord;
use crate::inventory::Inventory;
use crate::log;

/// Receives every recorded batch.
pub trait Publisher: Send + Sync {
    fn on_batch_recorded(&self, batch: &[ChangeRecord]) -> Result<()>;

    /// Sitemaps for `inventory` were written into `dir`.
    fn on_inventory_written(&self, _dir: &Path, _inventory: &Inventory) -> Result<()> {
        Ok(())
    }
}

/// Logs each change with a `[publish]` prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn on_batch_recorded(&self, batch: &[ChangeRecord]) -> Result<()> {
        for record in batch {
            log!("publish"; "#{} {} {}",
                record.seq, record.event.event_type().change_tag(), record.event.resource_id());
        }
        Ok(())
    }

    fn on_inventory_written(&self, dir: &Path, inventory: &Inventory) -> Result<()> {
        log!("publish"; "inventory at #{} written to {}", inventory.as_of, dir.display());
        Ok(())
    }
}

/// Forwards batches over a bounded channel without ever blocking.
///
/// When the consumer falls behind and the channel is full, the batch is
/// dropped and an error is reported to the memory (which logs it).
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: Sender<Vec<ChangeRecord>>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end for the consumer.
    pub fn new(capacity: usize) -> (Self, Receiver<Vec<ChangeRecord>>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn on_batch_recorded(&self, batch: &[ChangeRecord]) -> Result<()> {
        match self.tx.try_send(batch.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => Err(anyhow!(
                "subscriber channel full, dropped batch of {} changes",
                dropped.len()
            )),
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("subscriber disconnected")),
        }
    }
}
