//! Command-line interface module.

mod args;
pub mod library;
pub mod serve;
pub mod sync;

pub use args::{Cli, Commands, EditArgs, FileArgs, LinkArgs};
