//! `replay`: offline run over recorded event files.
//!
//! Each file is one `record_batch`. Afterwards the inventory and every
//! retained change are written to the output directory:
//!
//! ```text
//! public/
//! ├── sitemap.xml            # inventory (or index + sitemap00000.xml, ...)
//! ├── changeset00000.xml     # (horizon, ...]
//! └── changeset00001.xml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::changeset::ChangesetRenderer;
use crate::config::FeedConfig;
use crate::generator;
use crate::harvest::{read_events, read_listing};
use crate::inventory::InventoryBuilder;
use crate::log;
use crate::memory::{ChangeMemory, persist};

/// Summary of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub recorded: usize,
    pub rejected: usize,
    pub resources: usize,
    pub changeset_pages: usize,
}

pub fn run_replay(config: &FeedConfig, events: &[PathBuf], output: &Path) -> Result<ReplaySummary> {
    let memory = Arc::new(ChangeMemory::new(config.memory.to_memory_config()));
    if let Some(seed) = &config.source.seed {
        for warning in memory.bootstrap(read_listing(seed)?) {
            log!("warning"; "{}", warning);
        }
    }

    let mut summary = ReplaySummary::default();
    for path in events {
        let batch = read_events(path)?;
        let report = memory
            .record_batch(batch)
            .with_context(|| format!("Batch {} rejected", path.display()))?;
        for (index, error) in &report.rejected {
            log!("warning"; "{}: event {} rejected: {}", path.display(), index, error);
        }
        summary.recorded += report.recorded.len();
        summary.rejected += report.rejected.len();
    }

    let links = config.links();
    let minify = config.build.minify;

    let builder = InventoryBuilder::new(Arc::clone(&memory), config.inventory.page_size());
    let inventory = builder.build_latest()?;
    for warning in &inventory.warnings {
        log!("warning"; "{}", warning);
    }
    generator::write_inventory(output, &inventory, &links, minify)?;

    let renderer = ChangesetRenderer::new(Arc::clone(&memory), config.changeset.page_size());
    let docs = renderer.render(memory.horizon(), None)?;
    generator::write_changeset(output, &docs, &links, minify)?;

    if let Some(path) = &config.memory.persist {
        persist::save(&memory, path)?;
    }

    summary.resources = inventory.resource_count();
    summary.changeset_pages = docs.len();
    log!("replay"; "{} recorded, {} rejected, {} resources at #{}",
        summary.recorded, summary.rejected, summary.resources, inventory.as_of);
    Ok(summary)
}
