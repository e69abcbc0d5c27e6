//! Configuration management for `medialink.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── gateway    # [gateway]
//! │   └── sync       # [sync]
//! ├── error          # ConfigError, ConfigDiagnostics
//! ├── util           # Config file lookup
//! └── mod.rs         # AppConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `debug`     | Verbose logging (same as `--verbose`)            |
//! | `[gateway]` | Port, interface, library roots, proxy, watcher   |
//! | `[sync]`    | Automatic reverse sync, notice verbosity         |
//!
//! The file is optional: without one, defaults apply and the library root
//! must come from `--library`.

mod error;
pub mod section;
mod util;

pub use error::{ConfigDiagnostics, ConfigError};
pub use section::{GatewayConfig, SyncConfig};

use util::find_config_file;

use crate::utils::path::normalize_path;
use crate::{cli::Cli, log};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing medialink.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Absolute path to the config file, if one was found (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Directory relative paths are resolved against (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Verbose logging
    pub debug: bool,

    pub gateway: GatewayConfig,

    pub sync: SyncConfig,
}

impl AppConfig {
    /// Load configuration for a CLI invocation.
    ///
    /// Searches upward from cwd for the config file, then applies CLI
    /// overrides and validates for the command.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cli.config, &cwd) {
            Some(path) => {
                let path = normalize_path(&path);
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.clone());
                config.config_path = Some(path);
                config
            }
            None => Self {
                root: cwd.clone(),
                ..Self::default()
            },
        };

        config.apply_cli(cli, &cwd);
        config.validate(cli.needs_library())?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path, warning about unknown fields.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        log!("warning"; "unknown fields in {}, ignoring:", path.display());
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Apply CLI overrides. Paths given on the command line are relative to
    /// `cwd`, paths from the file to the file's directory.
    fn apply_cli(&mut self, cli: &Cli, cwd: &Path) {
        crate::logger::set_verbose(cli.verbose || self.debug);

        let root = self.root.clone();
        self.gateway.normalize(&root);

        if let Some(library) = &cli.library {
            self.gateway.library = Some(crate::utils::path::expand_path(library, cwd));
        }
        Self::update_option(&mut self.gateway.port, cli.port.as_ref());
        Self::update_option(&mut self.gateway.interface, cli.interface.as_ref());

        if let crate::cli::Commands::Serve { watch } = &cli.command {
            Self::update_option(&mut self.gateway.watch, watch.as_ref());
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate configuration, collecting all errors at once.
    pub fn validate(&self, needs_library: bool) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.gateway.validate(needs_library, &mut diag);
        diag.into_result()
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> AppConfig {
    let (parsed, ignored) = AppConfig::parse_with_ignored(content).unwrap();
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
