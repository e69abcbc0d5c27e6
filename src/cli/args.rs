//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Local media gateway and link sync for an asset-manager library
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (searched upward from the current directory)
    #[arg(short = 'C', long, global = true, default_value = "medialink.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Library root, overrides `[gateway] library`
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub library: Option<PathBuf>,

    /// Gateway port, overrides `[gateway] port`
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long, global = true)]
    pub interface: Option<IpAddr>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the media gateway until Ctrl+C
    #[command(visible_alias = "s")]
    Serve {
        /// Publish newly created asset directories on `/latest`
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// Retitle every embedded asset link in a document
    Sync {
        #[command(flatten)]
        target: FileArgs,

        /// Run even when `[sync] on_open` is disabled
        #[arg(short, long)]
        force: bool,
    },

    /// Retitle the one link for URL around a line
    Retitle {
        #[command(flatten)]
        target: FileArgs,

        #[command(flatten)]
        link: LinkArgs,

        /// New title; fetched from the asset manager when omitted
        #[arg(long, requires = "ext")]
        name: Option<String>,

        /// New extension; fetched from the asset manager when omitted
        #[arg(long, requires = "name")]
        ext: Option<String>,
    },

    /// Remove the one link for URL around a line
    Unlink {
        #[command(flatten)]
        target: FileArgs,

        #[command(flatten)]
        link: LinkArgs,
    },

    /// Print the most recently created asset directory of a running gateway
    Latest,

    /// Edit an asset's sidecar metadata
    #[command(visible_alias = "e")]
    Edit {
        #[command(flatten)]
        args: EditArgs,
    },

    /// Search image assets by name
    #[command(visible_alias = "q")]
    Search {
        /// Terms that must all appear in the name, in any order
        #[arg(required = true)]
        terms: Vec<String>,

        /// Restrict to folder ids (repeatable)
        #[arg(long = "folder", value_name = "ID")]
        folders: Vec<String>,
    },
}

/// A document to operate on.
#[derive(clap::Args, Debug, Clone)]
pub struct FileArgs {
    /// Markdown document
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,

    /// Print the result instead of writing the file
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// The link a scoped operation targets.
#[derive(clap::Args, Debug, Clone)]
pub struct LinkArgs {
    /// Line the link is on or next to (1-based)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub line: u32,

    /// Link target
    #[arg(long)]
    pub url: String,
}

/// Sidecar fields to change.
#[derive(clap::Args, Debug, Clone)]
pub struct EditArgs {
    /// Asset id (directory `<id>.info`)
    pub id: String,

    /// New name; the media file is renamed along
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub annotation: Option<String>,

    /// Source URL
    #[arg(long)]
    pub url: Option<String>,

    /// Replace tags (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Remove all tags
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,

    /// Replace folder ids (repeatable)
    #[arg(long = "folder", value_name = "ID")]
    pub folders: Vec<String>,
}

impl LinkArgs {
    /// Zero-based line index.
    pub fn line_index(&self) -> usize {
        self.line as usize - 1
    }
}

impl Cli {
    /// Whether the command needs a library root on disk.
    pub const fn needs_library(&self) -> bool {
        matches!(self.command, Commands::Serve { .. } | Commands::Edit { .. })
    }
}
