//! The asset manager's on-disk library as seen by this tool.
//!
//! Only two things are read from it: per-asset sidecar metadata and the
//! media file the sidecar names. Sidecars are edited in place with every
//! unrecognized key preserved.

mod metadata;
mod sidecar;

pub use metadata::{AssetMetadata, normalize_tags};
pub use sidecar::{Sidecar, SidecarEdit, SidecarError, edit_asset};
