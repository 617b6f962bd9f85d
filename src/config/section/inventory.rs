//! `[inventory]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [inventory]
//! mode = "periodic"           # on-demand | periodic
//! interval = 60               # Seconds between rebuilds and output writes
//! max_sitemap_entries = 50000 # URLs per sitemap file
//! output = "public"           # Directory for written sitemaps (any mode)
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::super::util::non_zero;
use crate::config::{ConfigDiagnostics, FieldPath};
use crate::inventory::InventoryMode;

/// Sitemap protocol limit on URLs per file.
pub const SITEMAP_PROTOCOL_LIMIT: usize = 50_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySectionConfig {
    pub mode: InventoryMode,
    /// Seconds between rebuilds in periodic mode, and between writes to
    /// `output` in either mode.
    pub interval: u64,
    pub max_sitemap_entries: usize,
    /// Where sitemaps are written after each rebuild.
    pub output: Option<PathBuf>,
}

impl Default for InventorySectionConfig {
    fn default() -> Self {
        Self {
            mode: InventoryMode::OnDemand,
            interval: 60,
            max_sitemap_entries: SITEMAP_PROTOCOL_LIMIT,
            output: None,
        }
    }
}

impl InventorySectionConfig {
    pub const INTERVAL: FieldPath = FieldPath::new("inventory.interval");
    pub const MAX_SITEMAP_ENTRIES: FieldPath = FieldPath::new("inventory.max_sitemap_entries");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !(1..=SITEMAP_PROTOCOL_LIMIT).contains(&self.max_sitemap_entries) {
            diag.error_with_hint(
                Self::MAX_SITEMAP_ENTRIES,
                format!("{} is out of range", self.max_sitemap_entries),
                format!("sitemaps hold 1 to {SITEMAP_PROTOCOL_LIMIT} URLs"),
            );
        }
        if self.rebuilds() && self.interval == 0 {
            diag.error_with_hint(
                Self::INTERVAL,
                "must be at least 1 second",
                "periodic mode and `inventory.output` rebuild on this interval",
            );
        }
    }

    /// Whether the server runs a timed rebuild: to refresh the periodic
    /// cache, or to keep `output` current.
    pub fn rebuilds(&self) -> bool {
        self.mode == InventoryMode::Periodic || self.output.is_some()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn page_size(&self) -> NonZeroUsize {
        non_zero(self.max_sitemap_entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_inventory_mode_parsing() {
        let config = test_parse_config("[inventory]\nmode = \"periodic\"\ninterval = 5");
        assert_eq!(config.inventory.mode, InventoryMode::Periodic);
        assert_eq!(config.inventory.interval(), Duration::from_secs(5));

        let config = test_parse_config("");
        assert_eq!(config.inventory.mode, InventoryMode::OnDemand);
        assert_eq!(config.inventory.page_size().get(), SITEMAP_PROTOCOL_LIMIT);
    }

    #[test]
    fn test_unknown_mode_is_parse_error() {
        let result: Result<crate::config::FeedConfig, _> =
            toml::from_str("[inventory]\nmode = \"nightly\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let inventory = InventorySectionConfig {
            mode: InventoryMode::Periodic,
            interval: 0,
            max_sitemap_entries: SITEMAP_PROTOCOL_LIMIT + 1,
            output: None,
        };
        let mut diag = ConfigDiagnostics::new();
        inventory.validate(&mut diag);
        assert_eq!(diag.len(), 2);
    }

    #[test]
    fn test_output_rebuilds_in_on_demand_mode() {
        let config = test_parse_config("");
        assert!(!config.inventory.rebuilds());

        let config = test_parse_config("[inventory]\noutput = \"public\"");
        assert_eq!(config.inventory.mode, InventoryMode::OnDemand);
        assert!(config.inventory.rebuilds());

        let inventory = InventorySectionConfig {
            interval: 0,
            output: Some("public".into()),
            ..InventorySectionConfig::default()
        };
        let mut diag = ConfigDiagnostics::new();
        inventory.validate(&mut diag);
        assert_eq!(diag.errors()[0].field, InventorySectionConfig::INTERVAL);
    }
}
