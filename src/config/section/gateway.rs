//! `[gateway]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [gateway]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 6060                 # Port documents link to
//! library = "~/Pictures/Main.library"
//! libraries = ["/Volumes/Ext/Main.library", "~/Pictures/Main.library"]
//! backend_port = 41595        # Asset manager's own API port
//! proxy_timeout_secs = 10
//! workers = 8
//! watch = true                # Track newly created asset directories
//! ```
//!
//! When `library` is unset, the first entry of `libraries` that exists on
//! this machine is used; the same library is often mounted at different
//! paths on different machines.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, ConfigError};
use crate::gateway::{DEFAULT_BACKEND_PORT, DEFAULT_PORT, GatewaySettings};
use crate::utils::path::expand_path;

/// Gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Network interface to bind.
    pub interface: IpAddr,

    /// Port the gateway listens on, and that document links embed.
    pub port: u16,

    /// Active library root.
    pub library: Option<PathBuf>,

    /// Known library roots, in order of preference.
    pub libraries: Vec<PathBuf>,

    /// Port of the asset manager's API server.
    pub backend_port: u16,

    /// Upper bound for one proxied round trip.
    pub proxy_timeout_secs: u64,

    /// Request worker threads.
    pub workers: usize,

    pub watch: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            library: None,
            libraries: Vec::new(),
            backend_port: DEFAULT_BACKEND_PORT,
            proxy_timeout_secs: 10,
            workers: 8,
            watch: true,
        }
    }
}

impl GatewayConfig {
    /// Expand paths relative to `base`, drop duplicate libraries and pick
    /// the active root.
    pub fn normalize(&mut self, base: &Path) {
        if let Some(library) = self.library.take() {
            self.library = Some(expand_path(&library, base));
        }

        let mut seen = FxHashSet::default();
        self.libraries = std::mem::take(&mut self.libraries)
            .into_iter()
            .map(|p| expand_path(&p, base))
            .filter(|p| seen.insert(p.clone()))
            .collect();

        if self.library.is_none() {
            self.library = self
                .libraries
                .iter()
                .find(|p| p.is_dir())
                .or_else(|| self.libraries.first())
                .cloned();
        }
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    pub fn validate(&self, needs_library: bool, diag: &mut ConfigDiagnostics) {
        if self.port == 0 {
            diag.error("gateway.port", "port must not be 0");
        }
        if self.backend_port == 0 {
            diag.error("gateway.backend_port", "port must not be 0");
        }
        if self.proxy_timeout_secs == 0 {
            diag.error("gateway.proxy_timeout_secs", "timeout must be at least 1 second");
        }
        if self.workers == 0 {
            diag.error("gateway.workers", "at least one worker is required");
        }

        if needs_library {
            match &self.library {
                None => diag.error_with_hint(
                    "gateway.library",
                    "no library configured",
                    "set `library` or `libraries` in [gateway], or pass --library",
                ),
                Some(library) if !library.is_dir() => diag.error(
                    "gateway.library",
                    format!("`{}` is not a directory", library.display()),
                ),
                Some(_) => {}
            }
        }
    }

    /// Settings for starting a gateway. Requires a library root.
    pub fn settings(&self) -> Result<GatewaySettings, ConfigError> {
        let library = self
            .library
            .clone()
            .ok_or_else(|| ConfigError::Validation("no library configured".into()))?;
        Ok(GatewaySettings {
            library,
            interface: self.interface,
            port: self.port,
            backend_port: self.backend_port,
            proxy_timeout: self.proxy_timeout(),
            workers: self.workers,
            watch: self.watch,
        })
    }
}
