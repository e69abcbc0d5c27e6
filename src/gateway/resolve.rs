//! Request path to servable target.
//!
//! Resolution is pure decision making: it stats and reads small files
//! (sidecars, shortcuts) but never touches the response. The HTTP layer
//! consumes the resulting [`Resolution`] uniformly.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;

use super::cache::MetadataCache;
use super::path::to_relative;
use crate::core::{ASSET_DIR, SIDECAR_FILE};
use crate::utils::mime;
use crate::utils::path::is_plain_file_name;

/// Extension of link-shortcut files.
const SHORTCUT_EXT: &str = "url";

/// Resolution failures, each mapped to one HTTP status.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("not found")]
    NotFound,

    /// Deliberately rendered like `NotFound` to the client.
    #[error("path escapes the asset directory")]
    PathTraversal,

    #[error("malformed sidecar `{0}`")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("IO error on `{0}`")]
    Io(PathBuf, #[source] io::Error),
}

impl ResolveError {
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound | Self::PathTraversal => 404,
            Self::Parse(..) | Self::Io(..) => 500,
        }
    }
}

/// What to answer for a resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Shortcut file pointing elsewhere (302).
    Redirect(String),
    /// Nothing servable: unknown type, or a shortcut without a URL (204).
    NoContent,
    /// Stream a file from disk (200).
    Stream {
        path: PathBuf,
        content_type: &'static str,
    },
}

/// Maps request paths under a library root to files inside its asset tree.
pub struct MediaResolver {
    library: PathBuf,
    cache: Arc<MetadataCache>,
}

impl MediaResolver {
    pub fn new(library: PathBuf, cache: Arc<MetadataCache>) -> Self {
        Self { library, cache }
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    /// Resolve a URL path (without query string).
    pub fn resolve(&self, url_path: &str) -> Result<Resolution, ResolveError> {
        let target = self.locate(url_path)?;
        let meta = fs::metadata(&target).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ResolveError::NotFound,
            _ => ResolveError::Io(target.clone(), e),
        })?;

        if meta.is_dir() {
            self.resolve_asset_dir(&target)
        } else {
            let ext = target
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            resolve_file(target, &ext)
        }
    }

    /// Map a URL path to an existing location strictly inside the asset tree.
    fn locate(&self, url_path: &str) -> Result<PathBuf, ResolveError> {
        let relative = to_relative(url_path).ok_or(ResolveError::PathTraversal)?;
        let inner = relative
            .strip_prefix(ASSET_DIR)
            .map_err(|_| ResolveError::PathTraversal)?;
        if inner.as_os_str().is_empty() {
            return Err(ResolveError::PathTraversal);
        }

        let assets = self.library.join(ASSET_DIR);
        let target = assets.join(inner);

        // Symlinks may still point out of the tree
        let canonical = target.canonicalize().map_err(|_| ResolveError::NotFound)?;
        let root = assets.canonicalize().map_err(|_| ResolveError::NotFound)?;
        if canonical == root || !canonical.starts_with(&root) {
            return Err(ResolveError::PathTraversal);
        }

        Ok(target)
    }

    /// An asset directory: serve the file its sidecar names.
    fn resolve_asset_dir(&self, dir: &Path) -> Result<Resolution, ResolveError> {
        let name = self.cache.resolve(&dir.join(SIDECAR_FILE))?;
        let file_name = format!("{}.{}", name.display_name, name.extension);

        // The sidecar must name a file inside this directory
        if !is_plain_file_name(&file_name) {
            return Err(ResolveError::NotFound);
        }

        resolve_file(dir.join(file_name), &name.extension.to_ascii_lowercase())
    }
}

/// A concrete file: shortcut redirect or typed stream.
fn resolve_file(path: PathBuf, ext: &str) -> Result<Resolution, ResolveError> {
    if ext == SHORTCUT_EXT {
        let content = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ResolveError::NotFound,
            _ => ResolveError::Io(path.clone(), e),
        })?;
        let content = String::from_utf8_lossy(&content);
        return Ok(match parse_shortcut(&content) {
            Some(url) => Resolution::Redirect(url),
            None => Resolution::NoContent,
        });
    }

    Ok(match mime::from_extension(ext) {
        Some(content_type) => Resolution::Stream { path, content_type },
        None => Resolution::NoContent,
    })
}

/// Extract the first `URL=<value>` line of a shortcut file (case-insensitive key).
pub fn parse_shortcut(content: &str) -> Option<String> {
    static RE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)URL=(.+)").unwrap());

    let url = RE_URL.captures(content)?.get(1)?.as_str().trim();
    (!url.is_empty()).then(|| url.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library() -> (TempDir, MediaResolver) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(ASSET_DIR)).unwrap();
        let resolver = MediaResolver::new(temp.path().to_path_buf(), Arc::new(MetadataCache::new()));
        (temp, resolver)
    }

    fn add_asset(root: &Path, id: &str, name: &str, ext: &str, body: &[u8]) -> PathBuf {
        let dir = root.join(ASSET_DIR).join(format!("{id}.info"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(SIDECAR_FILE),
            format!(r#"{{"id":"{id}","name":"{name}","ext":"{ext}"}}"#),
        )
        .unwrap();
        fs::write(dir.join(format!("{name}.{ext}")), body).unwrap();
        dir
    }

    #[test]
    fn test_directory_resolves_to_named_file() {
        let (temp, resolver) = library();
        let dir = add_asset(temp.path(), "ABC123", "cat", "png", b"png");

        let resolution = resolver.resolve("/images/ABC123.info").unwrap();
        assert_eq!(
            resolution,
            Resolution::Stream {
                path: dir.join("cat.png"),
                content_type: mime::types::PNG,
            }
        );
    }

    #[test]
    fn test_encoded_directory_name() {
        let (temp, resolver) = library();
        let dir = add_asset(temp.path(), "ID 1", "my cat", "jpg", b"jpg");

        let resolution = resolver.resolve("/images/ID%201.info").unwrap();
        assert_eq!(
            resolution,
            Resolution::Stream {
                path: dir.join("my cat.jpg"),
                content_type: mime::types::JPEG,
            }
        );
    }

    #[test]
    fn test_direct_file_route() {
        let (temp, resolver) = library();
        let dir = add_asset(temp.path(), "F1", "clip", "mp4", b"mp4");

        let resolution = resolver.resolve("/images/F1.info/clip.mp4").unwrap();
        assert_eq!(
            resolution,
            Resolution::Stream {
                path: dir.join("clip.mp4"),
                content_type: mime::types::MP4,
            }
        );
    }

    #[test]
    fn test_shortcut_redirect() {
        let (temp, resolver) = library();
        add_asset(
            temp.path(),
            "S1",
            "link",
            "url",
            b"[InternetShortcut]\r\nURL=https://example.com/x\r\n",
        );

        let resolution = resolver.resolve("/images/S1.info").unwrap();
        assert_eq!(resolution, Resolution::Redirect("https://example.com/x".into()));

        let direct = resolver.resolve("/images/S1.info/link.url").unwrap();
        assert_eq!(direct, Resolution::Redirect("https://example.com/x".into()));
    }

    #[test]
    fn test_shortcut_without_url() {
        let (temp, resolver) = library();
        add_asset(temp.path(), "S2", "empty", "url", b"[InternetShortcut]\n");
        assert_eq!(resolver.resolve("/images/S2.info").unwrap(), Resolution::NoContent);
    }

    #[test]
    fn test_unknown_extension_is_no_content() {
        let (temp, resolver) = library();
        add_asset(temp.path(), "P1", "slides", "pptx", b"zip");
        assert_eq!(resolver.resolve("/images/P1.info").unwrap(), Resolution::NoContent);
    }

    #[test]
    fn test_missing_asset_is_not_found() {
        let (_temp, resolver) = library();
        let err = resolver.resolve("/images/NOPE.info").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_missing_sidecar_is_not_found() {
        let (temp, resolver) = library();
        fs::create_dir_all(temp.path().join("images/BARE.info")).unwrap();
        let err = resolver.resolve("/images/BARE.info").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));
    }

    #[test]
    fn test_malformed_sidecar_is_server_error() {
        let (temp, resolver) = library();
        let dir = temp.path().join("images/BAD.info");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SIDECAR_FILE), "{").unwrap();

        let err = resolver.resolve("/images/BAD.info").unwrap_err();
        assert!(matches!(err, ResolveError::Parse(..)));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_path_traversal_rejected() {
        let (temp, resolver) = library();
        fs::write(temp.path().join("library.json"), "{}").unwrap();
        add_asset(temp.path(), "A", "a", "png", b"a");

        for path in [
            "/../../etc/passwd",
            "/images/../../etc/passwd",
            "/images/%2e%2e/library.json",
            "/library.json",
            "/images",
            "/images/",
            "/images/A.info/../../library.json",
        ] {
            let err = resolver.resolve(path).unwrap_err();
            assert_eq!(err.status(), 404, "{path}");
        }
    }

    #[test]
    fn test_sidecar_name_cannot_escape_directory() {
        let (temp, resolver) = library();
        fs::write(temp.path().join("secret.png"), b"secret").unwrap();
        let dir = temp.path().join("images/EVIL.info");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SIDECAR_FILE), r#"{"name":"../../secret","ext":"png"}"#).unwrap();

        let err = resolver.resolve("/images/EVIL.info").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));
    }

    #[test]
    fn test_parse_shortcut() {
        assert_eq!(
            parse_shortcut("url=https://a.example/b"),
            Some("https://a.example/b".into())
        );
        assert_eq!(
            parse_shortcut("[x]\nIconIndex=0\nURL=https://first\nURL=https://second"),
            Some("https://first".into())
        );
        assert_eq!(parse_shortcut("URL=   \n"), None);
        assert_eq!(parse_shortcut("nothing here"), None);
    }
}
