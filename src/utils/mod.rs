//! Shared helpers: MIME lookup and path normalization.

pub mod mime;
pub mod path;
