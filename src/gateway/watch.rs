//! Newly imported asset directories.
//!
//! The asset manager creates one directory per imported item under
//! `<library>/images/`. Watching that directory (not recursively) yields a
//! "most recent import" pointer the editor can poll via `/latest`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;

use crate::core::{ASSET_DIR, gateway_origin};

/// Single-slot "latest value + subscribe" publisher.
///
/// Only the most recent directory matters, so there is no queue: a slow
/// subscriber simply observes the newest value when it next looks.
#[derive(Clone)]
pub struct LatestDirectory {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl LatestDirectory {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Current pointer, `None` until a directory was created.
    pub fn get(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn publish(&self, url: String) {
        self.tx.send_replace(Some(url));
    }

    /// Forget the pointer (the library it pointed into is no longer served).
    pub fn reset(&self) {
        self.tx.send_if_modified(|current| current.take().is_some());
    }

    /// Receiver notified on every update.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for LatestDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Watches `<library>/images` for new first-level directories.
///
/// Dropping the watcher stops the notification stream.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl DirectoryWatcher {
    /// Start watching. Entries existing before this call are never reported.
    pub fn start(library: &Path, port: u16, latest: LatestDirectory) -> notify::Result<Self> {
        let root = library.join(ASSET_DIR);
        let library = library.to_path_buf();
        let watched = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for url in new_directories(&event, &library, &watched, port) {
                    crate::debug!("watch"; "new directory: {}", url);
                    latest.publish(url);
                }
            }
            Err(e) => crate::log!("watch"; "notify error: {}", e),
        })?;
        watcher.watch(&root, RecursiveMode::NonRecursive)?;

        crate::debug!("watch"; "watching {}", root.display());
        Ok(Self {
            _watcher: watcher,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// URLs of directories an event reports as newly present under `root`.
///
/// Creations and renames into the directory count; hidden entries and
/// anything that is not a direct child directory are ignored.
fn new_directories(event: &Event, library: &Path, root: &Path, port: u16) -> Vec<String> {
    let appeared = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
    );
    if !appeared {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter(|path| path.parent() == Some(root))
        .filter(|path| !is_hidden(path))
        .filter(|path| path.is_dir())
        .filter_map(|path| directory_url(library, path, port))
        .collect()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|name| name.starts_with('.'))
}

/// Gateway URL of a directory inside the library.
pub fn directory_url(library: &Path, dir: &Path, port: u16) -> Option<String> {
    let relative = dir.strip_prefix(library).ok()?;
    let segments: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(format!("{}/{}", gateway_origin(port), segments.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use std::fs;
    use tempfile::TempDir;

    fn make_event(paths: Vec<PathBuf>, kind: EventKind) -> Event {
        Event {
            kind,
            paths,
            attrs: Default::default(),
        }
    }

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let library = temp.path().to_path_buf();
        let root = library.join(ASSET_DIR);
        fs::create_dir_all(&root).unwrap();
        (temp, library, root)
    }

    #[test]
    fn test_directory_url() {
        let url = directory_url(
            Path::new("/lib"),
            Path::new("/lib/images/KXY12.info"),
            6060,
        );
        assert_eq!(url.as_deref(), Some("http://localhost:6060/images/KXY12.info"));
        assert_eq!(directory_url(Path::new("/lib"), Path::new("/other/x"), 6060), None);
    }

    #[test]
    fn test_created_directory_reported() {
        let (_temp, library, root) = fixture();
        let dir = root.join("A1.info");
        fs::create_dir(&dir).unwrap();

        let event = make_event(vec![dir], EventKind::Create(CreateKind::Folder));
        assert_eq!(
            new_directories(&event, &library, &root, 6060),
            vec!["http://localhost:6060/images/A1.info"]
        );
    }

    #[test]
    fn test_renamed_in_directory_reported() {
        let (_temp, library, root) = fixture();
        let dir = root.join("B1.info");
        fs::create_dir(&dir).unwrap();

        let kind = EventKind::Modify(ModifyKind::Name(RenameMode::To));
        let event = make_event(vec![dir], kind);
        assert_eq!(new_directories(&event, &library, &root, 6060).len(), 1);
    }

    #[test]
    fn test_ignored_entries() {
        let (_temp, library, root) = fixture();
        let hidden = root.join(".tmp.info");
        let nested = root.join("C1.info").join("thumbs");
        let file = root.join("stray.json");
        fs::create_dir(&hidden).unwrap();
        fs::create_dir_all(&nested).unwrap();
        fs::write(&file, "{}").unwrap();

        let create = EventKind::Create(CreateKind::Any);
        for path in [hidden, nested, file] {
            let event = make_event(vec![path.clone()], create);
            assert!(
                new_directories(&event, &library, &root, 6060).is_empty(),
                "{}",
                path.display()
            );
        }

        let dir = root.join("D1.info");
        fs::create_dir(&dir).unwrap();
        for kind in [
            EventKind::Remove(RemoveKind::Folder),
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
        ] {
            let event = make_event(vec![dir.clone()], kind);
            assert!(new_directories(&event, &library, &root, 6060).is_empty());
        }
    }

    #[test]
    fn test_latest_directory_publish_and_subscribe() {
        let latest = LatestDirectory::new();
        let mut rx = latest.subscribe();
        assert_eq!(latest.get(), None);
        assert!(!rx.has_changed().unwrap());

        latest.publish("http://localhost:6060/images/A.info".into());
        latest.publish("http://localhost:6060/images/B.info".into());

        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().as_deref(),
            Some("http://localhost:6060/images/B.info")
        );
        assert_eq!(latest.get().as_deref(), Some("http://localhost:6060/images/B.info"));

        latest.reset();
        assert_eq!(latest.get(), None);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_reset_when_empty_does_not_notify() {
        let latest = LatestDirectory::new();
        let rx = latest.subscribe();
        latest.reset();
        assert!(!rx.has_changed().unwrap());
    }
}
