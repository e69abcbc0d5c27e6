//! Core types - pure abstractions shared across the codebase.

mod scheme;
mod state;

pub use scheme::{
    ASSET_DIR, INFO_SUFFIX, SIDECAR_FILE, asset_dir, asset_id_from_url,
    gateway_origin, media_prefix, media_url,
};
pub use state::setup_shutdown_handler;
