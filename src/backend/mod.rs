//! Client for the asset manager's local API.
//!
//! Requests normally go through the gateway's `/api/*` proxy, so the base
//! URL is the gateway origin; pointing it at the backend port directly works
//! the same way.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::library::AssetMetadata;
use crate::utils::mime::is_image_extension;

/// Upper bound of candidates requested per search.
const SEARCH_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("asset manager unreachable")]
    Unreachable(#[from] reqwest::Error),

    #[error("asset manager answered HTTP {0}")]
    Status(u16),

    #[error("unexpected response from asset manager: {0}")]
    Decode(String),

    #[error("asset manager rejected the request (status `{0}`)")]
    Rejected(String),

    #[error("invalid base URL `{0}`")]
    Url(String),
}

/// Source of current asset metadata.
///
/// The sync engine only depends on this, so tests can substitute a fixed map.
pub trait MetadataSource {
    fn item_info(&self, id: &str) -> Result<AssetMetadata, BackendError>;
}

/// `{status, data}` envelope wrapped around every API answer.
#[derive(Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
}

pub struct BackendClient {
    client: Client,
    base: Url,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let base = Url::parse(base_url).map_err(|e| BackendError::Url(format!("{base_url}: {e}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// Client talking to `http://localhost:<port>`.
    pub fn for_port(port: u16, timeout: Duration) -> Result<Self, BackendError> {
        Self::new(&crate::core::gateway_origin(port), timeout)
    }

    /// Search image items whose name contains every term (case-insensitive).
    ///
    /// Only the longest term is sent as the backend keyword; the remaining
    /// terms are matched locally, so word order does not matter.
    pub fn search(&self, terms: &[String], folders: &[String]) -> Result<Vec<AssetMetadata>, BackendError> {
        let terms: Vec<String> = terms
            .iter()
            .flat_map(|t| t.split_whitespace())
            .map(str::to_lowercase)
            .collect();
        let keyword = terms.iter().max_by_key(|t| t.len()).cloned().unwrap_or_default();

        let limit = SEARCH_LIMIT.to_string();
        let mut query = vec![
            ("limit", limit.as_str()),
            ("orderBy", "-CREATEDATE"),
            ("keyword", keyword.as_str()),
        ];
        let folders = folders.join(",");
        if !folders.is_empty() {
            query.push(("folders", folders.as_str()));
        }

        let items: Vec<Value> = self.get("/api/item/list", &query)?;
        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<AssetMetadata>(item).ok())
            .filter(|item| matches_terms(item, &terms))
            .collect())
    }

    /// GET `path` with `query` plus a cache-busting stamp, unwrapping the envelope.
    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, BackendError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| BackendError::Url(e.to_string()))?;
        url.query_pairs_mut()
            .extend_pairs(query)
            .append_pair("t", &timestamp_millis().to_string());

        crate::debug!("backend"; "GET {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let body = response.text()?;
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        if envelope.status != "success" {
            return Err(BackendError::Rejected(envelope.status));
        }
        envelope
            .data
            .ok_or_else(|| BackendError::Decode("missing `data`".into()))
    }
}

impl MetadataSource for BackendClient {
    fn item_info(&self, id: &str) -> Result<AssetMetadata, BackendError> {
        self.get("/api/item/info", &[("id", id)])
    }
}

fn matches_terms(item: &AssetMetadata, terms: &[String]) -> bool {
    if item.display_name.is_empty() || !is_image_extension(&item.extension) {
        return false;
    }
    let name = item.display_name.to_lowercase();
    terms.iter().all(|term| name.contains(term.as_str()))
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
