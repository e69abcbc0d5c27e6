//! The gateway's URL scheme and on-disk library layout.
//!
//! Assets live in `<library>/images/<id>.info/`, each directory holding a
//! `metadata.json` sidecar plus the media file `<name>.<ext>`. Documents
//! reference them as `http://localhost:<port>/images/<id>.info`.

use std::path::{Path, PathBuf};

/// Library subdirectory holding one directory per asset.
pub const ASSET_DIR: &str = "images";

/// Suffix of every per-asset directory name.
pub const INFO_SUFFIX: &str = ".info";

/// Sidecar metadata file inside an asset directory.
pub const SIDECAR_FILE: &str = "metadata.json";

/// Origin the gateway is reachable at from the editor.
pub fn gateway_origin(port: u16) -> String {
    format!("http://localhost:{port}")
}

/// Prefix shared by every media URL for the given port.
///
/// Its absence from a document is the sync engine's fast path.
pub fn media_prefix(port: u16) -> String {
    format!("{}/{ASSET_DIR}/", gateway_origin(port))
}

/// Media URL of one asset.
pub fn media_url(port: u16, id: &str) -> String {
    format!("{}{id}{INFO_SUFFIX}", media_prefix(port))
}

/// Directory of one asset inside a library root.
pub fn asset_dir(library: &Path, id: &str) -> PathBuf {
    library.join(ASSET_DIR).join(format!("{id}{INFO_SUFFIX}"))
}

/// Asset id embedded in a media URL (`.../images/ABC123.info` -> `ABC123`).
///
/// Any origin is accepted; only the `/images/<id>.info` tail matters.
pub fn asset_id_from_url(url: &str) -> Option<&str> {
    let marker = format!("/{ASSET_DIR}/");
    let start = url.find(&marker)? + marker.len();
    let rest = &url[start..];
    let id = &rest[..rest.find(INFO_SUFFIX)?];
    (!id.is_empty() && !id.contains('/')).then_some(id)
}
