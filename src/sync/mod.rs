//! Link synchronization.
//!
//! Keeps the titles of embedded gateway links in a document in step with
//! the asset manager's current names:
//!
//! - [`synchronize`] rewrites every link in a document
//! - [`rewrite_title`] and [`delete_link`] act on the one link a user
//!   pointed at, and refuse when the scope holds more than one candidate

mod document;
mod engine;
mod scope;

pub use document::Document;
pub use engine::{SyncOutcome, SyncStats, synchronize};
pub use scope::{
    LineKind, LinkHit, SyncError, classify_line, delete_link, find_links_in_line, locate,
    replace_link_title, rewrite_title, scoped_find,
};
