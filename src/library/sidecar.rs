//! Reading and editing `metadata.json` sidecars.
//!
//! The sidecar is kept as an order-preserving JSON object; edits touch
//! only the keys they name, so fields owned by the asset manager that this
//! tool does not understand survive a read-modify-write cycle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use super::{AssetMetadata, normalize_tags};
use crate::core::SIDECAR_FILE;
use crate::utils::path::is_plain_file_name;

/// Sidecar read/write errors
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("no sidecar at `{0}`")]
    NotFound(PathBuf),

    #[error("IO error on `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("malformed sidecar `{0}`")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("sidecar `{0}` is not a JSON object")]
    NotObject(PathBuf),

    #[error("`{0}` is not a valid asset name")]
    InvalidName(String),
}

/// Field changes to apply to a sidecar. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SidecarEdit {
    pub name: Option<String>,
    pub annotation: Option<String>,
    pub url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub folders: Option<Vec<String>>,
}

impl SidecarEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.annotation.is_none()
            && self.url.is_none()
            && self.tags.is_none()
            && self.folders.is_none()
    }
}

/// One loaded sidecar.
#[derive(Debug, Clone)]
pub struct Sidecar {
    path: PathBuf,
    data: Map<String, Value>,
}

impl Sidecar {
    /// Load `<dir>/metadata.json`.
    pub fn load(dir: &Path) -> Result<Self, SidecarError> {
        let path = dir.join(SIDECAR_FILE);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SidecarError::NotFound(path.clone()),
            _ => SidecarError::Io(path.clone(), e),
        })?;

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(data)) => Ok(Self { path, data }),
            Ok(_) => Err(SidecarError::NotObject(path)),
            Err(e) => Err(SidecarError::Parse(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn ext(&self) -> Option<&str> {
        self.str_field("ext")
    }

    pub fn tags(&self) -> Vec<String> {
        self.data.get("tags").map(normalize_tags).unwrap_or_default()
    }

    pub fn folders(&self) -> Vec<String> {
        self.data
            .get("folders")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Typed view of the known fields.
    pub fn metadata(&self) -> AssetMetadata {
        // Known fields are all lenient (`#[serde(default)]`); only a
        // wrongly typed value can fail, in which case fall back field-wise.
        serde_json::from_value(Value::Object(self.data.clone())).unwrap_or_else(|_| {
            AssetMetadata {
                id: self.str_field("id").unwrap_or_default().to_owned(),
                display_name: self.name().unwrap_or_default().to_owned(),
                extension: self.ext().unwrap_or_default().to_owned(),
                annotation: self.str_field("annotation").unwrap_or_default().to_owned(),
                tags: self.tags(),
                source_url: self.str_field("url").unwrap_or_default().to_owned(),
                folder_ids: self.folders(),
            }
        })
    }

    /// Apply an edit in memory. Tags are stored normalized and folder ids
    /// deduplicated in first-seen order.
    pub fn apply(&mut self, edit: &SidecarEdit) {
        if let Some(name) = &edit.name {
            self.data.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(annotation) = &edit.annotation {
            self.data
                .insert("annotation".into(), Value::String(annotation.clone()));
        }
        if let Some(url) = &edit.url {
            self.data.insert("url".into(), Value::String(url.clone()));
        }
        if let Some(tags) = &edit.tags {
            let tags = tags.iter().cloned().map(Value::String).collect();
            self.data.insert("tags".into(), Value::Array(tags));
        }
        if let Some(folders) = &edit.folders {
            let mut seen = rustc_hash::FxHashSet::default();
            let folders = folders
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .cloned()
                .map(Value::String)
                .collect();
            self.data.insert("folders".into(), Value::Array(folders));
        }
    }

    /// Write the sidecar back as 2-space indented JSON.
    pub fn save(&self) -> Result<(), SidecarError> {
        let content = serde_json::to_string_pretty(&self.data)
            .map_err(|e| SidecarError::Parse(self.path.clone(), e))?;
        fs::write(&self.path, content).map_err(|e| SidecarError::Io(self.path.clone(), e))
    }
}

/// Edit the sidecar of the asset stored in `dir`.
///
/// A name change also renames the media file `<old>.<ext>` to `<new>.<ext>`
/// so the gateway keeps resolving the asset. The rename happens first and
/// is undone if the sidecar cannot be written.
pub fn edit_asset(dir: &Path, edit: &SidecarEdit) -> Result<AssetMetadata, SidecarError> {
    if let Some(name) = &edit.name
        && !is_plain_file_name(name)
    {
        return Err(SidecarError::InvalidName(name.clone()));
    }
    let mut sidecar = Sidecar::load(dir)?;

    let rename = match (&edit.name, sidecar.name(), sidecar.ext()) {
        (Some(new), Some(old), Some(ext)) if new != old => {
            let from = dir.join(format!("{old}.{ext}"));
            let to = dir.join(format!("{new}.{ext}"));
            (from.is_file() && !to.exists()).then_some((from, to))
        }
        _ => None,
    };

    if let Some((from, to)) = &rename {
        fs::rename(from, to).map_err(|e| SidecarError::Io(from.clone(), e))?;
        crate::debug!("library"; "renamed {} -> {}", from.display(), to.display());
    }

    sidecar.apply(edit);
    if let Err(e) = sidecar.save() {
        if let Some((from, to)) = &rename
            && let Err(undo) = fs::rename(to, from)
        {
            crate::log!("library"; "failed to restore {} -> {}: {}", to.display(), from.display(), undo);
        }
        return Err(e);
    }

    Ok(sidecar.metadata())
}
