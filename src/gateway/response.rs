//! HTTP response handlers.
//!
//! Every response leaves through [`send`], which attaches the CORS headers
//! the editor's renderer needs to call the gateway from its own origin.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use percent_encoding::{CONTROLS, utf8_percent_encode};
use tiny_http::{Header, Request, Response, StatusCode};

use super::resolve::{ResolveError, Resolution};
use crate::utils::mime::types::{JSON, PLAIN};

/// Clients may cache media for a week: asset URLs are keyed by stable id.
const CACHE_CONTROL: &str = "public, max-age=604800";

const CORS_HEADERS: &[(&str, &str)] = &[
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Methods",
        "GET, POST, OPTIONS, PUT, PATCH, DELETE",
    ),
    ("Access-Control-Allow-Headers", "X-Requested-With,content-type"),
    ("Access-Control-Allow-Credentials", "true"),
];

/// Add a header, skipping values that are not valid header bytes.
pub fn with_header<R: Read>(response: Response<R>, key: &str, value: &str) -> Response<R> {
    match Header::from_bytes(key.as_bytes(), value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => {
            crate::debug!("gateway"; "dropping invalid header {}: {:?}", key, value);
            response
        }
    }
}

/// Attach CORS headers and write the response.
pub fn send<R: Read>(request: Request, response: Response<R>) -> io::Result<()> {
    let response = CORS_HEADERS
        .iter()
        .fold(response, |response, (key, value)| with_header(response, key, value));
    request.respond(response)
}

/// Respond with a resolved target, or with the status of a resolution error.
pub fn respond_resolution(
    request: Request,
    resolution: Result<Resolution, ResolveError>,
) -> io::Result<()> {
    match resolution {
        Ok(Resolution::Stream { path, content_type }) => respond_stream(request, &path, content_type),
        Ok(Resolution::Redirect(url)) => respond_redirect(request, &url),
        Ok(Resolution::NoContent) => respond_empty(request, 204),
        Err(err) => {
            match &err {
                ResolveError::NotFound | ResolveError::PathTraversal => {
                    crate::debug!("gateway"; "{}: {}", request.url(), err);
                }
                ResolveError::Parse(path, source) => {
                    crate::log!("gateway"; "malformed sidecar {}: {}", path.display(), source);
                }
                ResolveError::Io(path, source) => {
                    crate::log!("gateway"; "failed to read {}: {}", path.display(), source);
                }
            }
            let body = match err.status() {
                404 => "Not Found",
                _ => "Internal Server Error",
            };
            respond_text(request, err.status(), body)
        }
    }
}

/// Stream a file. The file is handed to the server as a reader and copied
/// in bounded chunks; a blocking socket write pauses the copy until the
/// client drains it.
pub fn respond_stream(request: Request, path: &Path, content_type: &'static str) -> io::Result<()> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return respond_text(request, 404, "File not found");
        }
        Err(e) => {
            crate::log!("gateway"; "failed to open {}: {}", path.display(), e);
            return respond_text(request, 500, "Internal Server Error");
        }
    };
    let length = file
        .metadata()
        .ok()
        .and_then(|m| usize::try_from(m.len()).ok());

    let response = Response::new(StatusCode(200), Vec::new(), file, length, None);
    let response = with_header(response, "Content-Type", content_type);
    let response = with_header(response, "Cache-Control", CACHE_CONTROL);

    // Headers are gone once streaming starts: a failure here is a dropped
    // client or a mid-file read error, and the connection is simply closed.
    if let Err(e) = send(request, response) {
        crate::debug!("gateway"; "stream of {} aborted: {}", path.display(), e);
    }
    Ok(())
}

/// 302 to an external address.
pub fn respond_redirect(request: Request, url: &str) -> io::Result<()> {
    // Header values must be ASCII
    let location = utf8_percent_encode(url, CONTROLS).to_string();
    let response = with_header(Response::empty(StatusCode(302)), "Location", &location);
    send(request, response)
}

pub fn respond_empty(request: Request, status: u16) -> io::Result<()> {
    send(request, Response::empty(StatusCode(status)))
}

pub fn respond_text(request: Request, status: u16, body: &str) -> io::Result<()> {
    let response = Response::from_string(body).with_status_code(StatusCode(status));
    send(request, with_header(response, "Content-Type", PLAIN))
}

pub fn respond_json(request: Request, status: u16, body: &serde_json::Value) -> io::Result<()> {
    let response = Response::from_string(body.to_string()).with_status_code(StatusCode(status));
    send(request, with_header(response, "Content-Type", JSON))
}
