//! Change-feed engine for resource synchronization.
//!
//! A harvester pushes resource events into a bounded [`memory::ChangeMemory`];
//! consumers read a point-in-time inventory ([`inventory`]) or the ordered
//! changes between two checkpoints ([`changeset`]), rendered as
//! sitemap-style XML by [`generator`].

pub mod logger;

pub mod changeset;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod generator;
pub mod harvest;
pub mod inventory;
pub mod memory;
pub mod publisher;

pub use changeset::ChangesetRenderer;
pub use error::{BatchError, BuildWarning, GapError, ReadError, ValidationError};
pub use event::{ChangeRecord, EventType, RawEvent, ResourceEvent, Seq};
pub use inventory::{Inventory, InventoryBuilder, InventoryMode, InventoryService, InventoryStrategy};
pub use memory::{BatchReport, ChangeMemory, MemoryConfig};
