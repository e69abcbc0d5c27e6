//! Reverse proxy to the asset manager's local API.
//!
//! The editor's renderer cannot call the asset manager directly (no CORS
//! headers there), so `/api/*` is relayed verbatim through the gateway.

use std::io::{self, Read};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tiny_http::{Request, Response, StatusCode};

use super::response::{respond_text, send, with_header};

/// Reserved path prefix relayed to the backend.
pub const API_PREFIX: &str = "/api/";

/// Default port of the asset manager's API server.
pub const DEFAULT_BACKEND_PORT: u16 = 41595;

/// Why a request could not be relayed.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("unsupported method `{0}`")]
    Method(String),

    #[error("failed to read request body")]
    Body(#[from] io::Error),

    #[error("backend unreachable")]
    Unreachable(#[from] reqwest::Error),
}

/// Forwards requests to `http://127.0.0.1:<backend_port>`.
pub struct ReverseProxy {
    client: Client,
    backend: String,
}

impl ReverseProxy {
    /// Build a proxy whose backend round trips give up after `timeout`.
    pub fn new(backend_port: u16, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            backend: format!("http://127.0.0.1:{backend_port}"),
        })
    }

    /// Relay one request. Backend failures become a 500 with a generic body.
    pub fn forward(&self, mut request: Request, path_with_query: &str) -> io::Result<()> {
        match self.send_upstream(&mut request, path_with_query) {
            Ok(upstream) => relay(request, upstream),
            Err(e) => {
                crate::log!("proxy"; "error proxying {}: {}", path_with_query, e);
                respond_text(request, 500, "Proxy Error")
            }
        }
    }

    fn send_upstream(
        &self,
        request: &mut Request,
        path_with_query: &str,
    ) -> Result<reqwest::blocking::Response, ProxyError> {
        let method_name = request.method().to_string();
        let method = reqwest::Method::from_bytes(method_name.as_bytes())
            .map_err(|_| ProxyError::Method(method_name.clone()))?;

        let content_type = request
            .headers()
            .iter()
            .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("content-type"))
            .map(|h| h.value.to_string())
            .unwrap_or_else(|| "application/json".to_owned());

        let url = format!("{}{}", self.backend, path_with_query);
        crate::debug!("proxy"; "{} {}", method, url);

        let mut builder = self
            .client
            .request(method.clone(), url)
            .header(CONTENT_TYPE, content_type);

        if method != reqwest::Method::GET && method != reqwest::Method::HEAD {
            let mut body = Vec::new();
            request.as_reader().read_to_end(&mut body)?;
            builder = builder.body(body);
        }

        Ok(builder.send()?)
    }
}

/// Relay status, content type and body of a backend response.
fn relay(request: Request, upstream: reqwest::blocking::Response) -> io::Result<()> {
    let status = upstream.status().as_u16();
    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let length = upstream
        .content_length()
        .and_then(|n| usize::try_from(n).ok());

    let mut response = Response::new(StatusCode(status), Vec::new(), upstream, length, None);
    if let Some(content_type) = content_type {
        response = with_header(response, "Content-Type", &content_type);
    }
    send(request, response)
}
