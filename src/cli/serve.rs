//! `serve` and `latest` commands.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use crossbeam::channel::Receiver;
use serde::Deserialize;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::core::gateway_origin;
use crate::gateway::{Gateway, GatewayError, LATEST_PATH};
use crate::logger::notice_error;
use crate::{debug, log};

/// Body of `GET /latest`.
#[derive(Debug, Deserialize)]
struct LatestBody {
    url: Option<String>,
}

/// Run the gateway until Ctrl+C.
pub fn run_serve(config: &AppConfig, shutdown: &Receiver<()>) -> Result<()> {
    let settings = config.gateway.settings()?;
    let library = settings.library.clone();
    let gateway = Gateway::new(settings);

    match gateway.start() {
        Ok(_) => {}
        Err(GatewayError::PortInUse(port)) => {
            notice_error(&format!("port {port} is already in use"));
            bail!("another process is listening on {port}; pass --port or set `[gateway] port`");
        }
        Err(e) => return Err(e.into()),
    }
    log!("gateway"; "library {}", library.display());

    if let Err(e) = spawn_latest_listener(gateway.latest().subscribe()) {
        debug!("watch"; "listener thread failed to start: {}", e);
    }

    // Blocks until the Ctrl+C handler fires
    let _ = shutdown.recv();
    log!("gateway"; "shutting down");
    gateway.stop();
    Ok(())
}

/// Log every directory the watcher publishes.
///
/// The thread ends once all senders are gone, i.e. after the gateway is
/// dropped.
fn spawn_latest_listener(
    mut rx: watch::Receiver<Option<String>>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("latest-listener".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    log!("watch"; "failed to start runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(async move {
                while rx.changed().await.is_ok() {
                    let latest = rx.borrow_and_update().clone();
                    if let Some(url) = latest {
                        log!("watch"; "new directory {}", url);
                    }
                }
            });
        })
}

/// Ask a running gateway for the most recently created asset directory.
pub fn run_latest(config: &AppConfig) -> Result<()> {
    match fetch_latest(config.gateway.port, config.gateway.proxy_timeout())? {
        Some(url) => println!("{url}"),
        None => log!("watch"; "no directory created since the gateway started"),
    }
    Ok(())
}

fn fetch_latest(port: u16, timeout: Duration) -> Result<Option<String>> {
    let url = format!("{}{LATEST_PATH}", gateway_origin(port));
    let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
    let response = client
        .get(&url)
        .send()
        .with_context(|| format!("no gateway answering at {url}"))?
        .error_for_status()?;
    let body: LatestBody = response.json().context("malformed /latest response")?;
    Ok(body.url)
}
