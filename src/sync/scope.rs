//! Scoped link search.
//!
//! Finding "the" link a user pointed at is only safe when exactly one
//! candidate exists in scope. Plain text scopes to the anchor line; table
//! rows and callouts scope to their whole contiguous block, since the same
//! URL may repeat across its lines.

use std::sync::LazyLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use thiserror::Error;

use super::Document;

/// Characters `encodeURI` leaves alone.
const URI_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

/// Structural context of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Plain,
    TableRow,
    CalloutLine,
}

impl LineKind {
    /// Whether `line` continues a block of this kind.
    fn continues(self, line: &str) -> bool {
        classify_line(line) == self
    }

    /// Scope name used in user-facing messages.
    pub fn scope(self) -> &'static str {
        match self {
            Self::Plain => "line",
            Self::TableRow => "table",
            Self::CalloutLine => "callout",
        }
    }
}

pub fn classify_line(text: &str) -> LineKind {
    static RE_TABLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\|").unwrap());

    if RE_TABLE.is_match(text) {
        LineKind::TableRow
    } else if text.starts_with('>') {
        LineKind::CalloutLine
    } else {
        LineKind::Plain
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("link not found in {scope}")]
    NoMatch { scope: &'static str },

    #[error("{count} matching links in {scope}, not guessing which one")]
    Ambiguous { scope: &'static str, count: usize },

    #[error("line {0} is out of range")]
    LineOutOfRange(usize),
}

/// One link occurrence: byte range `start..end` of line `line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkHit {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// Byte ranges of markdown links/embeds on `line` whose target starts with `url`.
///
/// Matches `[title](url...)` and `![title](url...)`, non-overlapping, left
/// to right.
pub fn find_links_in_line(url: &str, line: &str) -> Vec<(usize, usize)> {
    if url.is_empty() || !line.contains(url) {
        return Vec::new();
    }

    let pattern = format!(r"!?\[[^\]]*\]\({}[^)]*\)", regex::escape(url));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            crate::debug!("sync"; "cannot search for {}: {}", url, e);
            return Vec::new();
        }
    };
    re.find_iter(line).map(|m| (m.start(), m.end())).collect()
}

/// Every occurrence of `url` within the scope of `anchor` under `context`.
///
/// Block scopes scan downward from the anchor (inclusive), then upward,
/// each direction stopping at the first line that does not continue the
/// block.
pub fn scoped_find(doc: &Document, anchor: usize, url: &str, context: LineKind) -> Vec<LinkHit> {
    let hits_on = |index: usize, line: &str| {
        find_links_in_line(url, line)
            .into_iter()
            .map(move |(start, end)| LinkHit {
                line: index,
                start,
                end,
            })
    };

    let Some(anchor_line) = doc.line(anchor) else {
        return Vec::new();
    };
    if context == LineKind::Plain {
        return hits_on(anchor, anchor_line).collect();
    }

    let mut hits = Vec::new();
    for index in anchor..doc.line_count() {
        let Some(line) = doc.line(index).filter(|l| context.continues(l)) else {
            break;
        };
        hits.extend(hits_on(index, line));
    }
    for index in (0..anchor).rev() {
        let Some(line) = doc.line(index).filter(|l| context.continues(l)) else {
            break;
        };
        hits.extend(hits_on(index, line));
    }
    hits
}

/// The single link for `url` in the scope of `anchor`.
///
/// On a plain line, a URL written in another escaping form still matches:
/// the percent-decoded and then the percent-encoded spelling are tried.
pub fn locate(doc: &Document, anchor: usize, url: &str) -> Result<LinkHit, SyncError> {
    let line = doc.line(anchor).ok_or(SyncError::LineOutOfRange(anchor))?;
    let context = classify_line(line);

    let mut hits = scoped_find(doc, anchor, url, context);
    if hits.is_empty() && context == LineKind::Plain {
        for variant in url_variants(url) {
            hits = scoped_find(doc, anchor, &variant, context);
            if !hits.is_empty() {
                break;
            }
        }
    }

    match hits.as_slice() {
        [hit] => Ok(*hit),
        [] => Err(SyncError::NoMatch {
            scope: context.scope(),
        }),
        _ => Err(SyncError::Ambiguous {
            scope: context.scope(),
            count: hits.len(),
        }),
    }
}

/// Decoded and encoded spellings of `url` that differ from it.
fn url_variants(url: &str) -> Vec<String> {
    let decoded = percent_decode_str(url).decode_utf8().ok().map(|s| s.into_owned());
    let encoded = Some(utf8_percent_encode(url, URI_KEEP).to_string());
    [decoded, encoded]
        .into_iter()
        .flatten()
        .filter(|variant| variant != url)
        .collect()
}

/// Retitle one link to `<name>.<ext>`.
///
/// Embeds keep everything after the first `|` of their old title (the size
/// hint); plain links get the bare title. Text that is not a link is
/// returned unchanged.
pub fn replace_link_title(link: &str, name: &str, ext: &str) -> String {
    static RE_LINK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(!?\[)([^\]]*)(\]\([^)]+\))").unwrap());

    let Some(caps) = RE_LINK.captures(link) else {
        return link.to_owned();
    };
    let (Some(whole), Some(prefix), Some(inner), Some(suffix)) =
        (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
    else {
        return link.to_owned();
    };
    let (prefix, inner, suffix) = (prefix.as_str(), inner.as_str(), suffix.as_str());
    let rest = &link[whole.end()..];

    let size = match inner.split_once('|') {
        Some((_, size)) if prefix.starts_with('!') => format!("|{size}"),
        _ => String::new(),
    };
    format!("{prefix}{name}.{ext}{size}{suffix}{rest}")
}

/// Retitle the single link for `url` around `anchor`.
pub fn rewrite_title(
    doc: &mut Document,
    anchor: usize,
    url: &str,
    name: &str,
    ext: &str,
) -> Result<LinkHit, SyncError> {
    let hit = locate(doc, anchor, url)?;
    let line = doc.line(hit.line).ok_or(SyncError::LineOutOfRange(hit.line))?;
    let replacement = replace_link_title(&line[hit.start..hit.end], name, ext);
    doc.replace_range(hit.line, hit.start, hit.end, &replacement);
    Ok(hit)
}

/// Remove the single link for `url` around `anchor`.
pub fn delete_link(doc: &mut Document, anchor: usize, url: &str) -> Result<LinkHit, SyncError> {
    let hit = locate(doc, anchor, url)?;
    doc.replace_range(hit.line, hit.start, hit.end, "");
    Ok(hit)
}
