//! Asset metadata as reported by the asset manager.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Metadata of one asset.
///
/// Field names follow the sidecar/API JSON (`name`, `ext`, `url`, `folders`).
/// Missing fields default to empty so partially populated items still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetMetadata {
    /// Stable identifier, also the asset directory name (`<id>.info`).
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    /// Lower-case extension without dot.
    #[serde(rename = "ext")]
    pub extension: String,
    pub annotation: String,
    #[serde(deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "folders")]
    pub folder_ids: Vec<String>,
}

impl AssetMetadata {
    /// Title used for embedded links: `<name>.<ext>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.display_name, self.extension)
    }
}

/// Normalize a tag list to plain strings.
///
/// Accepts a sequence of strings or of `{name}` / `{title}` objects;
/// anything else (including a non-array value) contributes nothing.
pub fn normalize_tags(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(tag) => Some(tag.clone()),
            Value::Object(obj) => obj
                .get("name")
                .and_then(Value::as_str)
                .or_else(|| obj.get("title").and_then(Value::as_str))
                .map(str::to_owned),
            _ => None,
        })
        .collect()
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_tags(&value))
}
