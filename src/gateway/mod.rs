//! Local media gateway.
//!
//! One listening socket serving three route families:
//!
//! | Route            | Handler                                        |
//! |------------------|------------------------------------------------|
//! | `/latest`        | most recently created asset directory (JSON)   |
//! | `/api/*`         | [`proxy::ReverseProxy`] to the asset manager   |
//! | everything else  | [`resolve::MediaResolver`] + streaming         |
//!
//! The [`Gateway`] handle owns the whole lifecycle: the accept thread, the
//! request worker pool, the directory watcher and the metadata cache.

mod cache;
mod path;
mod proxy;
mod resolve;
mod response;
mod watch;

pub use cache::{AssetName, MetadataCache};
pub use proxy::{API_PREFIX, DEFAULT_BACKEND_PORT, ProxyError, ReverseProxy};
pub use resolve::{MediaResolver, Resolution, ResolveError, parse_shortcut};
pub use watch::{DirectoryWatcher, LatestDirectory, directory_url};

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tiny_http::{Method, Request, Server};

use crate::{debug, log};

/// Path answering with the latest directory pointer.
pub const LATEST_PATH: &str = "/latest";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 6060;

/// Everything needed to start a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Library root; assets live in `<library>/images`.
    pub library: PathBuf,
    pub interface: IpAddr,
    /// `0` picks a free port.
    pub port: u16,
    pub backend_port: u16,
    pub proxy_timeout: Duration,
    /// Request worker threads.
    pub workers: usize,
    pub watch: bool,
}

impl GatewaySettings {
    /// Settings with defaults for everything but the library root.
    pub fn new(library: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            backend_port: DEFAULT_BACKEND_PORT,
            proxy_timeout: Duration::from_secs(10),
            workers: 8,
            watch: true,
        }
    }
}

/// Lifecycle of a [`Gateway`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Stopped,
    Starting,
    Running,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, String),

    #[error("failed to watch asset directory")]
    Watch(#[from] notify::Error),

    #[error("failed to build proxy client")]
    Client(#[from] reqwest::Error),

    #[error("failed to build request worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Shared by every request worker.
struct Handler {
    resolver: MediaResolver,
    proxy: ReverseProxy,
    latest: LatestDirectory,
}

/// Resources alive while the gateway is running.
struct Running {
    server: Arc<Server>,
    addr: SocketAddr,
    accept: JoinHandle<()>,
    watcher: Option<DirectoryWatcher>,
}

/// Explicit handle to the gateway process.
///
/// Dropping the handle stops the gateway.
pub struct Gateway {
    settings: Mutex<GatewaySettings>,
    state: Mutex<GatewayState>,
    running: Mutex<Option<Running>>,
    cache: Arc<MetadataCache>,
    latest: LatestDirectory,
}

impl Gateway {
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            state: Mutex::new(GatewayState::Stopped),
            running: Mutex::new(None),
            cache: Arc::new(MetadataCache::new()),
            latest: LatestDirectory::new(),
        }
    }

    pub fn state(&self) -> GatewayState {
        *self.state.lock()
    }

    /// Bound address while running.
    pub fn addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.addr)
    }

    pub fn settings(&self) -> GatewaySettings {
        self.settings.lock().clone()
    }

    /// The latest-directory pointer, for reading or subscribing.
    pub fn latest(&self) -> &LatestDirectory {
        &self.latest
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Start serving. A no-op returning the current address when running.
    pub fn start(&self) -> Result<SocketAddr, GatewayError> {
        let mut running = self.running.lock();
        if let Some(current) = running.as_ref() {
            return Ok(current.addr);
        }

        *self.state.lock() = GatewayState::Starting;
        match self.launch() {
            Ok(launched) => {
                let addr = launched.addr;
                *running = Some(launched);
                *self.state.lock() = GatewayState::Running;
                log!("gateway"; "http://{}", addr);
                Ok(addr)
            }
            Err(e) => {
                *self.state.lock() = GatewayState::Stopped;
                Err(e)
            }
        }
    }

    /// Stop serving: drop the watcher, close the socket, clear the cache.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        drop(running.watcher);
        running.server.unblock();
        if running.accept.join().is_err() {
            log!("gateway"; "accept thread panicked");
        }
        drop(running.server);

        self.cache.clear();
        self.latest.reset();
        *self.state.lock() = GatewayState::Stopped;
        debug!("gateway"; "stopped {}", running.addr);
    }

    /// Restart with new settings (library root or port changed).
    pub fn refresh(&self, settings: GatewaySettings) -> Result<SocketAddr, GatewayError> {
        self.stop();
        *self.settings.lock() = settings;
        self.start()
    }

    fn launch(&self) -> Result<Running, GatewayError> {
        let settings = self.settings();
        let requested = SocketAddr::new(settings.interface, settings.port);

        let server = Server::http(requested).map_err(|e| {
            match e.downcast_ref::<io::Error>().map(io::Error::kind) {
                Some(io::ErrorKind::AddrInUse) => GatewayError::PortInUse(settings.port),
                _ => GatewayError::Bind(requested, e.to_string()),
            }
        })?;
        let server = Arc::new(server);
        let addr = server.server_addr().to_ip().unwrap_or(requested);

        let handler = Arc::new(Handler {
            resolver: MediaResolver::new(settings.library.clone(), Arc::clone(&self.cache)),
            proxy: ReverseProxy::new(settings.backend_port, settings.proxy_timeout)?,
            latest: self.latest.clone(),
        });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers.max(1))
            .thread_name(|i| format!("gateway-worker-{i}"))
            .build()?;

        let watcher = if settings.watch {
            match DirectoryWatcher::start(&settings.library, addr.port(), self.latest.clone()) {
                Ok(watcher) => {
                    debug!("watch"; "publishing new directories of {}", watcher.root().display());
                    Some(watcher)
                }
                Err(e) => {
                    let e = GatewayError::from(e);
                    log!("watch"; "{}: {}, latest directory disabled", e, settings.library.display());
                    None
                }
            }
        } else {
            None
        };

        let accept_server = Arc::clone(&server);
        let accept = thread::Builder::new()
            .name("gateway-accept".into())
            .spawn(move || run_request_loop(&accept_server, &pool, &handler))
            .map_err(|e| GatewayError::Bind(addr, e.to_string()))?;

        Ok(Running {
            server,
            addr,
            accept,
            watcher,
        })
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Hand each accepted request to the pool so slow streams and proxy round
/// trips never block the accept loop. Returns once the server is unblocked.
fn run_request_loop(server: &Server, pool: &rayon::ThreadPool, handler: &Arc<Handler>) {
    for request in server.incoming_requests() {
        let handler = Arc::clone(handler);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &handler) {
                debug!("gateway"; "request error: {e}");
            }
        });
    }
}

/// Handle a single HTTP request.
fn handle_request(request: Request, handler: &Handler) -> io::Result<()> {
    let url = request.url().to_owned();
    let (path, _query) = path::split_query(&url);

    if path == LATEST_PATH {
        let body = serde_json::json!({ "url": handler.latest.get() });
        return response::respond_json(request, 200, &body);
    }

    if path.starts_with(API_PREFIX) {
        if *request.method() == Method::Options {
            return response::respond_empty(request, 204);
        }
        return handler.proxy.forward(request, &url);
    }

    response::respond_resolution(request, handler.resolver.resolve(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ASSET_DIR, SIDECAR_FILE};
    use reqwest::blocking::Client;
    use std::fs;
    use std::io::Read;
    use std::net::TcpListener;
    use tempfile::TempDir;

    fn library() -> TempDir {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(ASSET_DIR).join("ABC123.info");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SIDECAR_FILE), r#"{"id":"ABC123","name":"cat","ext":"png"}"#).unwrap();
        fs::write(dir.join("cat.png"), b"\x89PNG fake bytes").unwrap();

        let link = temp.path().join(ASSET_DIR).join("LINK1.info");
        fs::create_dir_all(&link).unwrap();
        fs::write(link.join(SIDECAR_FILE), r#"{"name":"site","ext":"url"}"#).unwrap();
        fs::write(link.join("site.url"), "[InternetShortcut]\nURL=https://example.com/x\n").unwrap();
        temp
    }

    fn settings(library: &TempDir) -> GatewaySettings {
        GatewaySettings {
            port: 0,
            workers: 2,
            watch: false,
            proxy_timeout: Duration::from_secs(2),
            ..GatewaySettings::new(library.path())
        }
    }

    fn client() -> Client {
        Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    /// A port nothing listens on.
    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_serves_asset_directory() {
        let lib = library();
        let gateway = Gateway::new(settings(&lib));
        let addr = gateway.start().unwrap();

        let resp = client()
            .get(format!("http://{addr}/images/ABC123.info"))
            .send()
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(resp.headers()["content-type"], "image/png");
        assert_eq!(resp.headers()["cache-control"], "public, max-age=604800");
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(resp.bytes().unwrap().as_ref(), b"\x89PNG fake bytes");
    }

    #[test]
    fn test_shortcut_redirects() {
        let lib = library();
        let gateway = Gateway::new(settings(&lib));
        let addr = gateway.start().unwrap();

        let resp = client()
            .get(format!("http://{addr}/images/LINK1.info"))
            .send()
            .unwrap();
        assert_eq!(resp.status().as_u16(), 302);
        assert_eq!(resp.headers()["location"], "https://example.com/x");
    }

    #[test]
    fn test_not_found_and_traversal() {
        let lib = library();
        fs::write(lib.path().join("secret.txt"), "secret").unwrap();
        let gateway = Gateway::new(settings(&lib));
        let addr = gateway.start().unwrap();

        for path in ["/images/MISSING.info", "/secret.txt", "/images/%2e%2e/secret.txt"] {
            let resp = client().get(format!("http://{addr}{path}")).send().unwrap();
            assert_eq!(resp.status().as_u16(), 404, "{path}");
            assert!(!resp.text().unwrap().contains("secret"));
        }
    }

    #[test]
    fn test_latest_starts_empty() {
        let lib = library();
        let gateway = Gateway::new(settings(&lib));
        let addr = gateway.start().unwrap();

        let body: serde_json::Value = client()
            .get(format!("http://{addr}/latest"))
            .send()
            .unwrap()
            .json()
            .unwrap();
        assert_eq!(body, serde_json::json!({ "url": null }));

        gateway.latest().publish("http://localhost:6060/images/N.info".into());
        let body: serde_json::Value = client()
            .get(format!("http://{addr}/latest"))
            .send()
            .unwrap()
            .json()
            .unwrap();
        assert_eq!(body["url"], "http://localhost:6060/images/N.info");
    }

    #[test]
    fn test_api_preflight_answered_locally() {
        let lib = library();
        let mut config = settings(&lib);
        config.backend_port = closed_port();
        let gateway = Gateway::new(config);
        let addr = gateway.start().unwrap();

        let resp = client()
            .request(reqwest::Method::OPTIONS, format!("http://{addr}/api/item/info"))
            .send()
            .unwrap();
        assert_eq!(resp.status().as_u16(), 204);
        assert_eq!(
            resp.headers()["access-control-allow-methods"],
            "GET, POST, OPTIONS, PUT, PATCH, DELETE"
        );
    }

    #[test]
    fn test_proxy_relays_backend_response() {
        let backend = Server::http("127.0.0.1:0").unwrap();
        let backend_port = backend.server_addr().to_ip().unwrap().port();
        let backend_thread = thread::spawn(move || {
            let mut request = backend.recv().unwrap();
            let seen = format!("{} {}", request.method(), request.url());
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).unwrap();
            let response = tiny_http::Response::from_string(r#"{"status":"success"}"#)
                .with_status_code(201)
                .with_header(
                    tiny_http::Header::from_bytes("Content-Type", "application/json").unwrap(),
                );
            request.respond(response).unwrap();
            (seen, body)
        });

        let lib = library();
        let mut config = settings(&lib);
        config.backend_port = backend_port;
        let gateway = Gateway::new(config);
        let addr = gateway.start().unwrap();

        let resp = client()
            .post(format!("http://{addr}/api/item/update?id=ABC123"))
            .body(r#"{"name":"kitten"}"#)
            .send()
            .unwrap();
        assert_eq!(resp.status().as_u16(), 201);
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(resp.text().unwrap(), r#"{"status":"success"}"#);

        let (seen, body) = backend_thread.join().unwrap();
        assert_eq!(seen, "POST /api/item/update?id=ABC123");
        assert_eq!(body, r#"{"name":"kitten"}"#);
    }

    #[test]
    fn test_backend_down_is_proxy_error() {
        let lib = library();
        let mut config = settings(&lib);
        config.backend_port = closed_port();
        let gateway = Gateway::new(config);
        let addr = gateway.start().unwrap();

        let resp = client()
            .get(format!("http://{addr}/api/item/info?id=ABC123"))
            .send()
            .unwrap();
        assert_eq!(resp.status().as_u16(), 500);
        assert_eq!(resp.text().unwrap(), "Proxy Error");

        // Local files keep working without the backend
        let resp = client()
            .get(format!("http://{addr}/images/ABC123.info"))
            .send()
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    #[test]
    fn test_lifecycle() {
        let lib = library();
        let gateway = Gateway::new(settings(&lib));
        assert_eq!(gateway.state(), GatewayState::Stopped);
        assert_eq!(gateway.addr(), None);

        let addr = gateway.start().unwrap();
        assert_eq!(gateway.state(), GatewayState::Running);
        assert_eq!(gateway.start().unwrap(), addr);

        client()
            .get(format!("http://{addr}/images/ABC123.info"))
            .send()
            .unwrap();
        assert_eq!(gateway.cache().len(), 1);

        gateway.stop();
        assert_eq!(gateway.state(), GatewayState::Stopped);
        assert!(gateway.cache().is_empty());
        assert_eq!(gateway.addr(), None);

        gateway.stop();
        assert_eq!(gateway.state(), GatewayState::Stopped);
    }

    #[test]
    fn test_refresh_switches_library() {
        let first = library();
        let second = TempDir::new().unwrap();
        fs::create_dir_all(second.path().join(ASSET_DIR)).unwrap();

        let gateway = Gateway::new(settings(&first));
        let addr = gateway.start().unwrap();
        let resp = client().get(format!("http://{addr}/images/ABC123.info")).send().unwrap();
        assert_eq!(resp.status().as_u16(), 200);

        let addr = gateway.refresh(settings(&second)).unwrap();
        assert_eq!(gateway.state(), GatewayState::Running);
        assert_eq!(gateway.settings().library, second.path());
        let resp = client().get(format!("http://{addr}/images/ABC123.info")).send().unwrap();
        assert_eq!(resp.status().as_u16(), 404);
    }

    #[test]
    fn test_port_in_use() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let lib = library();
        let mut config = settings(&lib);
        config.port = port;
        let gateway = Gateway::new(config);

        let err = gateway.start().unwrap_err();
        assert!(matches!(err, GatewayError::PortInUse(p) if p == port));
        assert_eq!(gateway.state(), GatewayState::Stopped);
        drop(listener);
    }

    #[test]
    fn test_watcher_publishes_new_directory() {
        let lib = library();
        let mut config = settings(&lib);
        config.watch = true;
        let gateway = Gateway::new(config);
        let addr = gateway.start().unwrap();
        let mut rx = gateway.latest().subscribe();

        fs::create_dir(lib.path().join(ASSET_DIR).join("NEW1.info")).unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let changed = runtime.block_on(async {
            tokio::time::timeout(Duration::from_secs(5), rx.changed()).await
        });
        assert!(matches!(changed, Ok(Ok(()))));
        assert_eq!(
            gateway.latest().get(),
            Some(format!("http://localhost:{}/images/NEW1.info", addr.port()))
        );
    }
}
