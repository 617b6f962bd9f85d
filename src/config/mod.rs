//! Feed configuration management for `syncfeed.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── inventory  # [inventory]
//! │   ├── memory     # [memory], [changeset]
//! │   ├── serve      # [serve], [build]
//! │   └── source     # [source]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # FeedConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section       | Purpose                                             |
//! |---------------|-----------------------------------------------------|
//! | `[source]`    | Base URI, event log, seed listing, polling, retries |
//! | `[memory]`    | Retained changes, fail-fast batches, snapshot file  |
//! | `[inventory]` | on-demand / periodic builds, sitemap size, output   |
//! | `[changeset]` | Entries per changeset document                      |
//! | `[serve]`     | HTTP interface and port                             |
//! | `[build]`     | XML minification                                    |

pub mod section;
pub mod types;
mod util;

pub use section::{
    BuildConfig, ChangesetConfig, InventorySectionConfig, MemorySectionConfig, ServeConfig,
    SourceConfig,
};
pub use types::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};
pub use util::find_config_file;

use crate::generator::FeedLinks;
use crate::{debug, log};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing syncfeed.toml
///
/// Immutable once [`FeedConfig::load`] returns; paths are absolute by then.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Absolute path to the config file, if one was found (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Directory relative paths resolve against (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub memory: MemorySectionConfig,

    #[serde(default)]
    pub inventory: InventorySectionConfig,

    #[serde(default)]
    pub changeset: ChangesetConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub build: BuildConfig,
}

impl FeedConfig {
    /// Find, parse, normalize and validate the configuration.
    ///
    /// Searches upward from cwd for `config_name`. Without a config file the
    /// defaults apply, rooted at cwd.
    pub fn load(config_name: &Path) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(config_name) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.config_path = Some(path);
                config
            }
            None => {
                debug!("config"; "{} not found, using defaults", config_name.display());
                Self::default()
            }
        };

        let root = config
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or(cwd);
        config.finalize(&root);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Resolve all paths against `root`.
    fn finalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();
        self.source.events = util::resolve_path(&self.source.events, root);
        if let Some(seed) = self.source.seed.take() {
            self.source.seed = Some(util::resolve_path(&seed, root));
        }
        if let Some(persist) = self.memory.persist.take() {
            self.memory.persist = Some(util::resolve_path(&persist, root));
        }
        if let Some(output) = self.inventory.output.take() {
            self.inventory.output = Some(util::resolve_path(&output, root));
        }
    }

    /// Validate every section.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.source.validate(&mut diag);
        self.memory.validate(&mut diag);
        self.inventory.validate(&mut diag);
        self.changeset.validate(&mut diag);

        diag.print_hints();
        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }

    /// Apply `serve` command-line overrides.
    pub fn apply_serve_options(&mut self, interface: Option<IpAddr>, port: Option<u16>) {
        Self::update_option(&mut self.serve.interface, interface.as_ref());
        Self::update_option(&mut self.serve.port, port.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    pub fn links(&self) -> FeedLinks {
        FeedLinks::new(&self.source.base_uri)
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> FeedConfig {
    let (parsed, ignored) = FeedConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryMode;
    use tempfile::TempDir;

    #[test]
    fn test_from_str_invalid_toml() {
        assert!(FeedConfig::from_str("[memory\nmax_changes = 3").is_err());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[memory]\nmax_changes = 5\nmax_change = 6\n[unknown_section]\nfield = 1";
        let (config, ignored) = FeedConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.memory.max_changes, 5);
        assert!(ignored.iter().any(|f| f == "memory.max_change"));
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_full_config() {
        let config = test_parse_config(
            r#"
[source]
base_uri = "http://example.com/feed"
events = "data/events.jsonl"
seed = "data/dump.txt"

[memory]
max_changes = 3
persist = "~/state.json"

[inventory]
mode = "periodic"
interval = 10
max_sitemap_entries = 2
output = "public"

[changeset]
max_entries = 2

[serve]
port = 9000

[build]
minify = true
"#,
        );
        assert_eq!(config.inventory.mode, InventoryMode::Periodic);
        assert_eq!(config.changeset.page_size().get(), 2);
        assert!(config.build.minify);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.links().changeset(0, None),
            "http://example.com/feed/changeset.xml?from=0"
        );
    }

    #[test]
    fn test_load_resolves_paths_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("syncfeed.toml");
        fs::write(
            &path,
            "[source]\nevents = \"events.jsonl\"\nseed = \"/abs/dump.txt\"\n[memory]\npersist = \"state/memory.json\"",
        )
        .unwrap();

        let config = FeedConfig::load(&path).unwrap();
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.source.events, dir.path().join("events.jsonl"));
        assert_eq!(config.source.seed, Some(PathBuf::from("/abs/dump.txt")));
        assert_eq!(
            config.memory.persist,
            Some(dir.path().join("state/memory.json"))
        );
    }

    #[test]
    fn test_load_reports_all_validation_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("syncfeed.toml");
        fs::write(
            &path,
            "[source]\nbase_uri = \"feed\"\n[memory]\nmax_changes = 0\n[inventory]\nmax_sitemap_entries = 0",
        )
        .unwrap();

        let err = FeedConfig::load(&path).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Diagnostics(diag)) => assert_eq!(diag.len(), 3),
            other => panic!("expected diagnostics, got {other:?}"),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let mut config = FeedConfig::default();
        config.apply_serve_options(None, Some(9999));
        assert_eq!(config.serve.port, 9999);
        assert_eq!(config.serve.interface, ServeConfig::default().interface);
    }
}
