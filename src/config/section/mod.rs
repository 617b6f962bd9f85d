//! Configuration section definitions.
//!
//! Each module corresponds to a section in `syncfeed.toml`:
//!
//! | Module      | TOML Section                | Purpose                          |
//! |-------------|-----------------------------|----------------------------------|
//! | `source`    | `[source]`                  | Upstream events, seeds, polling  |
//! | `memory`    | `[memory]`, `[changeset]`   | Retention, persistence, paging   |
//! | `inventory` | `[inventory]`               | Inventory strategy and output    |
//! | `serve`     | `[serve]`, `[build]`        | HTTP server, XML output          |

mod inventory;
mod memory;
mod serve;
mod source;

pub use inventory::InventorySectionConfig;
pub use memory::{ChangesetConfig, MemorySectionConfig};
pub use serve::{BuildConfig, ServeConfig};
pub use source::SourceConfig;
