//! Background timers: harvest cycles and periodic inventory rebuilds.
//!
//! Each tick hands the blocking work to `spawn_blocking` so a slow source or
//! a large rebuild never stalls the timer itself.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};

use super::FeedState;
use super::lifecycle::Task;
use crate::harvest::{HarvestDriver, Harvester};
use crate::inventory::InventoryStrategy;
use crate::memory::persist;
use crate::{generator, log};

/// Poll the source every `every`, saving a snapshot after each cycle.
pub fn harvest_task<D>(mut harvester: Harvester<D>, every: Duration, snapshot: Option<PathBuf>) -> Task
where
    D: HarvestDriver + 'static,
{
    Box::pin(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let snapshot = snapshot.clone();
            let cycle = tokio::task::spawn_blocking(move || {
                if let Err(e) = harvester.poll_once() {
                    log!("harvest"; "cycle failed: {:#}", e);
                }
                if let Some(path) = &snapshot
                    && let Err(e) = persist::save(harvester.memory(), path)
                {
                    log!("error"; "failed to save snapshot: {:#}", e);
                }
                harvester
            });

            match cycle.await {
                Ok(returned) => harvester = returned,
                Err(e) => {
                    log!("error"; "harvest task stopped: {}", e);
                    return;
                }
            }
        }
    })
}

/// Rebuild the inventory every `every`, writing it out if configured.
pub fn refresh_task(state: Arc<FeedState>, every: Duration) -> Task {
    Box::pin(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let state = Arc::clone(&state);
            let rebuild = tokio::task::spawn_blocking(move || rebuild(&state));

            if let Err(e) = rebuild.await {
                log!("error"; "inventory task stopped: {}", e);
                return;
            }
        }
    })
}

/// One rebuild: refresh the inventory, write `inventory.output`, tell the
/// publisher.
fn rebuild(state: &FeedState) {
    let inventory = match state.inventory.refresh() {
        Ok(inventory) => inventory,
        Err(e) => {
            log!("inventory"; "rebuild failed: {}", e);
            return;
        }
    };
    let Some(dir) = &state.config.inventory.output else {
        return;
    };
    if let Err(e) = generator::write_inventory(dir, &inventory, &state.links, state.config.build.minify) {
        log!("error"; "failed to write sitemaps: {:#}", e);
        return;
    }
    if let Some(publisher) = &state.publisher
        && let Err(e) = publisher.on_inventory_written(dir, &inventory)
    {
        log!("publish"; "notification failed: {:#}", e);
    }
}
