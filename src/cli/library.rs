//! Library commands: `edit` and `search`.

use anyhow::{Context, Result, bail};

use crate::backend::BackendClient;
use crate::cli::EditArgs;
use crate::config::AppConfig;
use crate::core::{asset_dir, media_url};
use crate::library::{AssetMetadata, SidecarEdit, edit_asset};
use crate::log;
use crate::logger::{notice_info, notice_success};
use crate::utils::path::is_plain_file_name;

/// Edit one asset's sidecar in the active library.
pub fn run_edit(args: &EditArgs, config: &AppConfig) -> Result<()> {
    let Some(library) = config.gateway.library.as_deref() else {
        bail!("no library configured");
    };

    let edit = sidecar_edit(args);
    if edit.is_empty() {
        bail!("nothing to change for {}, pass at least one field", args.id);
    }

    if !is_plain_file_name(&args.id) {
        bail!("`{}` is not a valid asset id", args.id);
    }
    let dir = asset_dir(library, &args.id);
    let meta = edit_asset(&dir, &edit).with_context(|| format!("failed to edit {}", args.id))?;
    notice_success(&format!("updated {} ({})", meta.file_name(), args.id));
    Ok(())
}

fn sidecar_edit(args: &EditArgs) -> SidecarEdit {
    let tags = if args.clear_tags {
        Some(Vec::new())
    } else {
        non_empty(&args.tags)
    };

    SidecarEdit {
        name: args.name.clone(),
        annotation: args.annotation.clone(),
        url: args.url.clone(),
        tags,
        folders: non_empty(&args.folders),
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

/// Search image assets through the gateway's API proxy.
pub fn run_search(terms: &[String], folders: &[String], config: &AppConfig) -> Result<()> {
    let port = config.gateway.port;
    let client = BackendClient::for_port(port, config.gateway.proxy_timeout())?;
    let items = client.search(terms, folders)?;

    if items.is_empty() {
        notice_info("no matching images");
        return Ok(());
    }

    for item in &items {
        println!("{}", search_line(port, item));
    }
    log!("search"; "{} match(es)", items.len());
    Ok(())
}

fn search_line(port: u16, item: &AssetMetadata) -> String {
    format!("![{}]({})", item.file_name(), media_url(port, &item.id))
}
