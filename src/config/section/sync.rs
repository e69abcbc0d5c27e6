//! `[sync]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [sync]
//! on_open = true    # Retitle links whenever a document is opened
//! quiet = false     # Suppress "checking" / "up to date" notices
//! ```

use serde::{Deserialize, Serialize};

/// Link synchronization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Automatic reverse sync when a document is opened or focused.
    /// `medialink sync` without `--force` does nothing while this is off.
    pub on_open: bool,

    pub quiet: bool,
}
