//! Inventory build strategies.
//!
//! - [`OnDemand`]: every read builds at the latest checkpoint.
//! - [`Periodic`]: reads return the last cached build; the caller's timer
//!   calls `refresh` every interval.
//!
//! The strategy is chosen once at startup ([`InventoryService::new`]); the
//! timer itself belongs to the caller.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};

use super::{Inventory, InventoryBuilder};
use crate::error::GapError;
use crate::{debug, log};

/// Configured build mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InventoryMode {
    #[default]
    OnDemand,
    Periodic,
}

/// Common interface of the build strategies.
pub trait InventoryStrategy: Send + Sync {
    /// Inventory to serve for a read request.
    fn current(&self) -> Result<Arc<Inventory>, GapError>;

    /// Rebuild at the latest checkpoint.
    fn refresh(&self) -> Result<Arc<Inventory>, GapError>;
}

// ============================================================================
// OnDemand
// ============================================================================

#[derive(Debug, Clone)]
pub struct OnDemand {
    builder: InventoryBuilder,
}

impl OnDemand {
    pub fn new(builder: InventoryBuilder) -> Self {
        Self { builder }
    }
}

impl InventoryStrategy for OnDemand {
    fn current(&self) -> Result<Arc<Inventory>, GapError> {
        self.refresh()
    }

    fn refresh(&self) -> Result<Arc<Inventory>, GapError> {
        self.builder.build_latest().map(Arc::new)
    }
}

// ============================================================================
// Periodic
// ============================================================================

/// Serves a cached inventory until the next `refresh`.
#[derive(Debug)]
pub struct Periodic {
    builder: InventoryBuilder,
    cache: ArcSwapOption<Inventory>,
}

impl Periodic {
    pub fn new(builder: InventoryBuilder) -> Self {
        Self {
            builder,
            cache: ArcSwapOption::empty(),
        }
    }

    /// Last cached build, if any tick happened yet.
    pub fn cached(&self) -> Option<Arc<Inventory>> {
        self.cache.load_full()
    }
}

impl InventoryStrategy for Periodic {
    fn current(&self) -> Result<Arc<Inventory>, GapError> {
        match self.cache.load_full() {
            Some(inventory) => Ok(inventory),
            None => self.refresh(),
        }
    }

    fn refresh(&self) -> Result<Arc<Inventory>, GapError> {
        let started = Instant::now();
        let inventory = Arc::new(self.builder.build_latest()?);
        self.cache.store(Some(Arc::clone(&inventory)));

        debug!("inventory"; "rebuilt at #{} in {:?}", inventory.as_of, started.elapsed());
        if !inventory.warnings.is_empty() {
            log!("inventory"; "{} events skipped", inventory.warnings.len());
        }
        Ok(inventory)
    }
}

// ============================================================================
// InventoryService
// ============================================================================

/// Closed set of strategies, selected from configuration.
#[derive(Debug)]
pub enum InventoryService {
    OnDemand(OnDemand),
    Periodic(Periodic),
}

impl InventoryService {
    pub fn new(mode: InventoryMode, builder: InventoryBuilder) -> Self {
        match mode {
            InventoryMode::OnDemand => Self::OnDemand(OnDemand::new(builder)),
            InventoryMode::Periodic => Self::Periodic(Periodic::new(builder)),
        }
    }

    pub fn mode(&self) -> InventoryMode {
        match self {
            Self::OnDemand(_) => InventoryMode::OnDemand,
            Self::Periodic(_) => InventoryMode::Periodic,
        }
    }

    fn strategy(&self) -> &dyn InventoryStrategy {
        match self {
            Self::OnDemand(s) => s,
            Self::Periodic(s) => s,
        }
    }
}

impl InventoryStrategy for InventoryService {
    fn current(&self) -> Result<Arc<Inventory>, GapError> {
        self.strategy().current()
    }

    fn refresh(&self) -> Result<Arc<Inventory>, GapError> {
        self.strategy().refresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEvent;
    use crate::memory::{ChangeMemory, MemoryConfig};
    use chrono::DateTime;
    use std::num::NonZeroUsize;

    fn builder() -> InventoryBuilder {
        let memory = ChangeMemory::new(MemoryConfig::new(NonZeroUsize::new(10).unwrap()));
        InventoryBuilder::new(Arc::new(memory), NonZeroUsize::new(10).unwrap())
    }

    fn record(builder: &InventoryBuilder, id: &str) {
        let ts = DateTime::from_timestamp(1, 0).unwrap();
        builder.memory().record(RawEvent::new(id, "create", ts)).unwrap();
    }

    #[test]
    fn test_on_demand_sees_new_events() {
        let builder = builder();
        let service = InventoryService::new(InventoryMode::OnDemand, builder.clone());

        record(&builder, "a");
        assert_eq!(service.current().unwrap().resource_count(), 1);
        record(&builder, "b");
        assert_eq!(service.current().unwrap().resource_count(), 2);
    }

    #[test]
    fn test_periodic_serves_cache_until_refresh() {
        let builder = builder();
        let service = InventoryService::new(InventoryMode::Periodic, builder.clone());
        assert_eq!(service.mode(), InventoryMode::Periodic);

        record(&builder, "a");
        let first = service.current().unwrap();
        assert_eq!(first.resource_count(), 1);

        record(&builder, "b");
        let cached = service.current().unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
        assert_eq!(cached.as_of, 1);

        let fresh = service.refresh().unwrap();
        assert_eq!(fresh.resource_count(), 2);
        assert!(Arc::ptr_eq(&fresh, &service.current().unwrap()));
    }

    #[test]
    fn test_periodic_starts_empty() {
        let periodic = Periodic::new(builder());
        assert!(periodic.cached().is_none());
        periodic.current().unwrap();
        assert!(periodic.cached().is_some());
    }
}
