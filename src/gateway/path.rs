//! Request URL to library-relative path.

use std::path::PathBuf;

use percent_encoding::percent_decode_str;

use crate::utils::path::clean_relative;

/// Split `path?query` into its parts.
pub fn split_query(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Percent-decode a URL path. `None` if the bytes are not UTF-8.
pub fn decode_path(path: &str) -> Option<String> {
    percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(std::borrow::Cow::into_owned)
}

/// Decode a request path and resolve it to a relative filesystem path.
///
/// `..` segments are resolved lexically; a path that climbs above the
/// library root yields `None`.
pub fn to_relative(url_path: &str) -> Option<PathBuf> {
    let decoded = decode_path(url_path)?;
    clean_relative(std::path::Path::new(decoded.trim_start_matches('/')))
}
