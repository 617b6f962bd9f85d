//! Feed server.
//!
//! Startup order:
//!
//! ```text
//! restore snapshot ─→ bootstrap seeds ─→ bind ─→ timers ─→ request loop
//!                      (fresh state only)        │
//!                                                ├── harvest every poll_interval
//!                                                └── rebuild every interval
//!                                                    (periodic, or when writing output)
//! ```
//!
//! | Route                          | Response                              |
//! |--------------------------------|---------------------------------------|
//! | `/sitemap.xml`                 | inventory, or its index               |
//! | `/sitemap00000.xml`            | inventory page                        |
//! | `/changeset.xml?from=N[&to=M]` | first changeset page of `(N, M]`      |
//! | `/status`                      | memory counters as JSON               |
//!
//! A changeset request behind the eviction horizon answers `410 Gone`.

mod lifecycle;
mod response;
mod route;
mod tasks;

pub use lifecycle::setup_shutdown_handler;

use crate::changeset::ChangesetRenderer;
use crate::config::FeedConfig;
use crate::error::ReadError;
use crate::event::Seq;
use crate::generator::{FeedLinks, sitemap};
use crate::harvest::{Harvester, JsonLinesSource, read_listing};
use crate::inventory::{InventoryBuilder, InventoryService, InventoryStrategy};
use crate::memory::{ChangeMemory, persist};
use crate::publisher::{LogPublisher, Publisher};
use crate::{debug, log, logger};
use anyhow::{Context, Result};
use crossbeam::channel;
use route::Route;
use std::sync::Arc;
use tiny_http::{Request, Server};

/// Number of threads answering requests.
const REQUEST_THREADS: usize = 4;

/// Everything a request handler reads.
pub struct FeedState {
    pub config: FeedConfig,
    pub memory: Arc<ChangeMemory>,
    pub inventory: InventoryService,
    pub changesets: ChangesetRenderer,
    pub links: FeedLinks,
    /// Also attached to the memory; told about written sitemaps.
    pub publisher: Option<Arc<dyn Publisher>>,
}

impl FeedState {
    /// Restore or create the memory and wire up the readers.
    pub fn open(config: FeedConfig) -> Result<Self> {
        let memory_config = config.memory.to_memory_config();
        let restored = match &config.memory.persist {
            Some(path) => persist::load(path, memory_config)?,
            None => None,
        };

        let memory = match restored {
            Some(memory) => memory,
            None => {
                let memory = ChangeMemory::new(memory_config);
                if let Some(seed) = &config.source.seed {
                    let warnings = memory.bootstrap(read_listing(seed)?);
                    for warning in &warnings {
                        log!("warning"; "{}", warning);
                    }
                }
                memory
            }
        };
        let publisher: Option<Arc<dyn Publisher>> =
            logger::is_verbose().then(|| Arc::new(LogPublisher) as Arc<dyn Publisher>);
        let memory = match &publisher {
            Some(publisher) => memory.with_publisher(Arc::clone(publisher)),
            None => memory,
        };
        let memory = Arc::new(memory);

        let builder = InventoryBuilder::new(Arc::clone(&memory), config.inventory.page_size());
        let inventory = InventoryService::new(config.inventory.mode, builder);
        let changesets = ChangesetRenderer::new(Arc::clone(&memory), config.changeset.page_size());
        let links = config.links();

        Ok(Self {
            config,
            memory,
            inventory,
            changesets,
            links,
            publisher,
        })
    }

    fn status(&self) -> serde_json::Value {
        serde_json::json!({
            "snapshot_seq": self.memory.snapshot_seq(),
            "horizon": self.memory.horizon(),
            "oldest_seq": self.memory.oldest_seq(),
            "retained": self.memory.len(),
            "capacity": self.memory.capacity(),
            "inventory_mode": self.inventory.mode(),
            "base_uri": self.links.base(),
        })
    }
}

/// Run the server until Ctrl+C.
pub fn serve(config: FeedConfig) -> Result<()> {
    let state = Arc::new(FeedState::open(config)?);
    let config = &state.config;

    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    lifecycle::register_server(Arc::clone(&server), shutdown_tx);

    let source = JsonLinesSource::new(&config.source.events, config.source.page_size());
    let harvester = Harvester::new(source, Arc::clone(&state.memory), config.source.retry_policy());

    let mut background = vec![tasks::harvest_task(
        harvester,
        config.source.poll_interval(),
        config.memory.persist.clone(),
    )];
    if config.inventory.rebuilds() {
        background.push(tasks::refresh_task(Arc::clone(&state), config.inventory.interval()));
    }
    let runtime = lifecycle::spawn_runtime(shutdown_rx, background)?;

    log!("serve"; "http://{} (harvesting {})", addr, config.source.events.display());
    run_request_loop(&server, &state)?;

    lifecycle::wait_for_shutdown(runtime);
    if let Some(path) = &state.config.memory.persist {
        persist::save(&state.memory, path)?;
        debug!("serve"; "snapshot saved to {}", path.display());
    }
    Ok(())
}

fn run_request_loop(server: &Server, state: &Arc<FeedState>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()
        .context("Failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let state = Arc::clone(state);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &state) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, state: &FeedState) -> Result<()> {
    if lifecycle::is_shutdown() {
        return response::respond_unavailable(request, "shutting down");
    }
    if !response::is_read_request(&request) {
        return response::respond_method_not_allowed(request);
    }

    let route = match route::resolve(request.url()) {
        Ok(route) => route,
        Err(bad) => return response::respond_bad_request(request, &bad.0),
    };
    debug!("serve"; "{} {}", request.method(), request.url());

    match route {
        Route::Sitemap(name) => serve_sitemap(request, state, &name),
        Route::Changeset { from, to } => serve_changeset(request, state, from, to),
        Route::Status => response::respond_json(request, &state.status()),
        Route::NotFound => response::respond_not_found(request),
    }
}

fn serve_sitemap(request: Request, state: &FeedState, name: &str) -> Result<()> {
    let inventory = match state.inventory.current() {
        Ok(inventory) => inventory,
        Err(e) => return response::respond_unavailable(request, &e.to_string()),
    };
    let file = sitemap::inventory_files(&inventory, &state.links)?
        .into_iter()
        .find(|(file, _)| file == name);
    match file {
        Some((_, xml)) => response::respond_xml(request, xml),
        None => response::respond_not_found(request),
    }
}

fn serve_changeset(request: Request, state: &FeedState, from: Seq, to: Option<Seq>) -> Result<()> {
    match state.changesets.render(from, to) {
        // Later pages are reached through each page's `next` link.
        Ok(docs) => match docs.first() {
            Some(doc) => response::respond_xml(request, sitemap::changeset_xml(doc, to, &state.links)?),
            None => response::respond_not_found(request),
        },
        Err(ReadError::Gap(gap)) => {
            log!("serve"; "410 for changeset from #{}: {}", from, gap);
            response::respond_gone(request, &gap.to_string())
        }
        Err(e @ ReadError::InvalidRange { .. }) => {
            response::respond_bad_request(request, &e.to_string())
        }
    }
}
