//! Document commands: `sync`, `retitle` and `unlink`.
//!
//! Each command reads the whole document, edits it in memory and writes it
//! back only when something changed (or prints it with `--dry-run`).

use std::fs;
use std::io::Write;

use anyhow::{Context, Result, bail};

use crate::backend::{BackendClient, MetadataSource};
use crate::cli::{FileArgs, LinkArgs};
use crate::config::AppConfig;
use crate::core::{asset_id_from_url, media_prefix};
use crate::logger::{notice_info, notice_success};
use crate::sync::{Document, SyncOutcome, delete_link, rewrite_title, synchronize};
use crate::{debug, log};

/// Whole-document reverse sync.
pub fn run_sync(target: &FileArgs, force: bool, config: &AppConfig) -> Result<()> {
    if !force && !config.sync.on_open {
        debug!("sync"; "`[sync] on_open` is disabled, skipping {}", target.file.display());
        return Ok(());
    }

    let client = backend(config)?;
    sync_file(target, config.gateway.port, &client, config.sync.quiet)?;
    Ok(())
}

/// Scoped rewrite of one link's title.
pub fn run_retitle(
    target: &FileArgs,
    link: &LinkArgs,
    name: Option<&str>,
    ext: Option<&str>,
    config: &AppConfig,
) -> Result<()> {
    let (name, ext) = match (name, ext) {
        (Some(name), Some(ext)) => (name.to_owned(), ext.to_owned()),
        _ => {
            let Some(id) = asset_id_from_url(&link.url) else {
                bail!("`{}` is not a gateway media URL, pass --name and --ext", link.url);
            };
            let meta = backend(config)?
                .item_info(id)
                .with_context(|| format!("failed to fetch metadata of {id}"))?;
            (meta.display_name, meta.extension)
        }
    };

    retitle_file(target, link, &name, &ext)
}

/// Scoped removal of one link.
pub fn run_unlink(target: &FileArgs, link: &LinkArgs) -> Result<()> {
    let mut doc = read_document(target)?;
    delete_link(&mut doc, link.line_index(), &link.url)
        .with_context(|| format!("{}:{}", target.file.display(), link.line))?;

    write_document(target, &doc.text())?;
    notice_success("link removed");
    Ok(())
}

fn backend(config: &AppConfig) -> Result<BackendClient> {
    Ok(BackendClient::for_port(
        config.gateway.port,
        config.gateway.proxy_timeout(),
    )?)
}

fn sync_file(
    target: &FileArgs,
    port: u16,
    source: &dyn MetadataSource,
    quiet: bool,
) -> Result<SyncOutcome> {
    let text = fs::read_to_string(&target.file)
        .with_context(|| format!("failed to read {}", target.file.display()))?;

    if !quiet && text.contains(&media_prefix(port)) {
        notice_info("checking links");
    }

    let (synced, stats) = synchronize(&text, port, source);
    let outcome = stats.outcome();
    match outcome {
        SyncOutcome::Updated(count) => {
            write_document(target, &synced)?;
            notice_success(&links_updated(count));
        }
        SyncOutcome::UpToDate if !quiet => notice_info("already up to date"),
        SyncOutcome::UpToDate | SyncOutcome::NoLinks => {}
    }

    if !stats.failed.is_empty() {
        log!("sync"; "{} asset(s) could not be fetched", stats.failed.len());
    }
    Ok(outcome)
}

fn retitle_file(target: &FileArgs, link: &LinkArgs, name: &str, ext: &str) -> Result<()> {
    let mut doc = read_document(target)?;
    let before = doc.text();
    let hit = rewrite_title(&mut doc, link.line_index(), &link.url, name, ext)
        .with_context(|| format!("{}:{}", target.file.display(), link.line))?;

    let after = doc.text();
    if after == before {
        notice_info("title already current");
        return Ok(());
    }

    write_document(target, &after)?;
    notice_success(&format!("retitled link on line {}", hit.line + 1));
    Ok(())
}

fn read_document(target: &FileArgs) -> Result<Document> {
    let text = fs::read_to_string(&target.file)
        .with_context(|| format!("failed to read {}", target.file.display()))?;
    Ok(Document::new(&text))
}

fn write_document(target: &FileArgs, text: &str) -> Result<()> {
    if target.dry_run {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        return Ok(stdout.flush()?);
    }
    fs::write(&target.file, text)
        .with_context(|| format!("failed to write {}", target.file.display()))
}

fn links_updated(count: usize) -> String {
    match count {
        1 => "1 link updated".to_owned(),
        n => format!("{n} links updated"),
    }
}
