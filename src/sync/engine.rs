//! Whole-document reverse sync.
//!
//! Every embedded gateway link gets the asset's current `<name>.<ext>` as
//! its title. Links are rewritten right to left within a line so earlier
//! offsets stay valid.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use super::Document;
use super::scope::{find_links_in_line, replace_link_title};
use crate::backend::MetadataSource;
use crate::core::{INFO_SUFFIX, media_prefix};
use crate::library::AssetMetadata;

/// Counters of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Gateway media URLs seen in the document.
    pub matched: usize,
    /// Link spans whose text changed.
    pub updated: usize,
    /// Asset ids whose metadata could not be fetched, in discovery order.
    pub failed: Vec<String>,
}

/// What a sync run amounts to, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No gateway links at all.
    NoLinks,
    UpToDate,
    Updated(usize),
}

impl SyncStats {
    pub fn outcome(&self) -> SyncOutcome {
        match (self.matched, self.updated) {
            (0, _) => SyncOutcome::NoLinks,
            (_, 0) => SyncOutcome::UpToDate,
            (_, n) => SyncOutcome::Updated(n),
        }
    }
}

/// A gateway media URL found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MediaRef<'a> {
    url: &'a str,
    id: &'a str,
}

/// Gateway media URLs (`<prefix><id>.info`) on one line.
///
/// Ids stop at `.`, `/`, whitespace and parentheses.
fn media_refs<'a>(line: &'a str, prefix: &str) -> Vec<MediaRef<'a>> {
    let mut refs = Vec::new();
    for (at, _) in line.match_indices(prefix) {
        let id_start = at + prefix.len();
        let rest = &line[id_start..];
        let id_len = rest
            .find(|c: char| matches!(c, '.' | '/' | '(' | ')') || c.is_whitespace())
            .unwrap_or(rest.len());
        if id_len == 0 || !rest[id_len..].starts_with(INFO_SUFFIX) {
            continue;
        }
        refs.push(MediaRef {
            url: &line[at..id_start + id_len + INFO_SUFFIX.len()],
            id: &rest[..id_len],
        });
    }
    refs
}

/// Rewrite link titles in `text` to match current asset names.
///
/// Metadata is fetched once per asset id. A failed fetch is reported and
/// recorded in [`SyncStats::failed`]; links of other assets are still
/// processed.
pub fn synchronize(text: &str, port: u16, source: &dyn MetadataSource) -> (String, SyncStats) {
    let mut stats = SyncStats::default();
    let prefix = media_prefix(port);
    if !text.contains(&prefix) {
        return (text.to_owned(), stats);
    }

    let mut doc = Document::new(text);
    let mut infos: FxHashMap<String, Option<AssetMetadata>> = FxHashMap::default();

    for index in 0..doc.line_count() {
        let Some(original) = doc.line(index) else {
            continue;
        };
        let refs = media_refs(original, &prefix);
        if refs.is_empty() {
            continue;
        }
        stats.matched += refs.len();

        // Keyed by start: overlapping captures of the same span collapse
        let mut spans: BTreeMap<usize, (usize, &str)> = BTreeMap::new();
        for media in &refs {
            for (start, end) in find_links_in_line(media.url, original) {
                spans.insert(start, (end, media.id));
            }
        }

        // A span may swallow a later link through `[^)]*`; rewriting the
        // inner one first would leave the outer span's end stale
        let mut kept: Vec<(usize, usize, &str)> = Vec::with_capacity(spans.len());
        for (&start, &(end, id)) in &spans {
            if kept.last().is_some_and(|&(_, kept_end, _)| start < kept_end) {
                continue;
            }
            kept.push((start, end, id));
        }

        let mut line = original.to_owned();
        let mut changed = false;
        for &(start, end, id) in kept.iter().rev() {
            let info = infos
                .entry(id.to_owned())
                .or_insert_with(|| fetch(source, id, &mut stats.failed));
            let Some(info) = info else {
                continue;
            };

            let current = &line[start..end];
            let renamed = replace_link_title(current, &info.display_name, &info.extension);
            if renamed != current {
                line.replace_range(start..end, &renamed);
                changed = true;
                stats.updated += 1;
            }
        }

        if changed {
            doc.set_line(index, line);
        }
    }

    (doc.text(), stats)
}

fn fetch(source: &dyn MetadataSource, id: &str, failed: &mut Vec<String>) -> Option<AssetMetadata> {
    match source.item_info(id) {
        Ok(info) => Some(info),
        Err(e) => {
            crate::logger::notice_warning(&format!("failed to fetch info for {id}: {e}"));
            failed.push(id.to_owned());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use std::cell::RefCell;

    const URL: &str = "http://localhost:6060/images/ABC123.info";

    /// In-memory metadata keyed by id, counting lookups.
    #[derive(Default)]
    struct FakeSource {
        items: FxHashMap<String, (String, String)>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn with(mut self, id: &str, name: &str, ext: &str) -> Self {
            self.items.insert(id.into(), (name.into(), ext.into()));
            self
        }
    }

    impl MetadataSource for FakeSource {
        fn item_info(&self, id: &str) -> Result<AssetMetadata, BackendError> {
            self.calls.borrow_mut().push(id.to_owned());
            let (name, ext) = self
                .items
                .get(id)
                .ok_or_else(|| BackendError::Rejected("error".into()))?;
            Ok(AssetMetadata {
                id: id.to_owned(),
                display_name: name.clone(),
                extension: ext.clone(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_media_refs() {
        let line = format!("a {URL} b http://localhost:6060/images/X.info/f.png c");
        let refs = media_refs(&line, "http://localhost:6060/images/");
        let ids: Vec<_> = refs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["ABC123", "X"]);
        assert_eq!(refs[0].url, URL);

        assert!(media_refs("http://localhost:6060/images/.info", "http://localhost:6060/images/").is_empty());
        assert!(media_refs("http://localhost:6060/images/ABC", "http://localhost:6060/images/").is_empty());
    }

    #[test]
    fn test_rewrite_scenario() {
        let source = FakeSource::default().with("ABC123", "kitten", "png");
        let (text, stats) = synchronize(&format!("![cat.png|400]({URL})"), 6060, &source);
        assert_eq!(text, format!("![kitten.png|400]({URL})"));
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.outcome(), SyncOutcome::Updated(1));
    }

    #[test]
    fn test_nested_link_span_rewrites_outer_only() {
        let source = FakeSource::default()
            .with("A", "b", "png")
            .with("B", "b", "png");
        let input = "[t](http://localhost:6060/images/A.info [a-very-long-title](http://localhost:6060/images/B.info)";
        let (text, stats) = synchronize(input, 6060, &source);
        assert_eq!(
            text,
            "[b.png](http://localhost:6060/images/A.info [a-very-long-title](http://localhost:6060/images/B.info)"
        );
        assert_eq!(stats.matched, 2);
        assert_eq!(stats.updated, 1);
    }

    #[test]
    fn test_no_op_when_name_unchanged() {
        let source = FakeSource::default().with("ABC123", "cat", "png");
        let input = format!("![cat.png|400]({URL})");
        let (text, stats) = synchronize(&input, 6060, &source);
        assert_eq!(text, input);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.outcome(), SyncOutcome::UpToDate);
    }

    #[test]
    fn test_idempotent() {
        let source = FakeSource::default()
            .with("ABC123", "kitten", "png")
            .with("DEF", "dog", "jpg");
        let input = format!(
            "# Notes\n![a|200]({URL}) and [b](http://localhost:6060/images/DEF.info)\n\n| ![c]({URL}) |\n"
        );
        let (first, stats) = synchronize(&input, 6060, &source);
        assert_eq!(stats.updated, 3);

        let (second, stats) = synchronize(&first, 6060, &source);
        assert_eq!(second, first);
        assert_eq!(stats.updated, 0);
        assert_eq!(
            first,
            format!(
                "# Notes\n![kitten.png|200]({URL}) and [dog.jpg](http://localhost:6060/images/DEF.info)\n\n| ![kitten.png]({URL}) |\n"
            )
        );
    }

    #[test]
    fn test_fast_path_skips_backend() {
        let source = FakeSource::default();
        let input = "no links here\n![x](http://localhost:7070/images/A.info)";
        let (text, stats) = synchronize(input, 6060, &source);
        assert_eq!(text, input);
        assert_eq!(stats.outcome(), SyncOutcome::NoLinks);
        assert!(source.calls.borrow().is_empty());
    }

    #[test]
    fn test_memoizes_per_id_and_rewrites_right_to_left() {
        let source = FakeSource::default().with("ABC123", "longer-name", "png");
        let input = format!("![a]({URL}) ![b|10]({URL}) ![c]({URL})");
        let (text, stats) = synchronize(&input, 6060, &source);
        assert_eq!(
            text,
            format!("![longer-name.png]({URL}) ![longer-name.png|10]({URL}) ![longer-name.png]({URL})")
        );
        assert_eq!(stats.matched, 3);
        assert_eq!(stats.updated, 3);
        assert_eq!(*source.calls.borrow(), vec!["ABC123"]);
    }

    #[test]
    fn test_fetch_failure_skips_only_that_id() {
        let source = FakeSource::default().with("GOOD", "fresh", "png");
        let input = "![old](http://localhost:6060/images/GONE.info)\n\
                     ![old](http://localhost:6060/images/GOOD.info)\n\
                     ![again](http://localhost:6060/images/GONE.info)";
        let (text, stats) = synchronize(input, 6060, &source);
        assert_eq!(
            text,
            "![old](http://localhost:6060/images/GONE.info)\n\
             ![fresh.png](http://localhost:6060/images/GOOD.info)\n\
             ![again](http://localhost:6060/images/GONE.info)"
        );
        assert_eq!(stats.failed, vec!["GONE"]);
        assert_eq!(stats.updated, 1);
        assert_eq!(source.calls.borrow().iter().filter(|id| *id == "GONE").count(), 1);
    }

    #[test]
    fn test_bare_url_counts_as_match_without_edit() {
        let source = FakeSource::default().with("ABC123", "kitten", "png");
        let (text, stats) = synchronize(&format!("raw {URL}"), 6060, &source);
        assert_eq!(text, format!("raw {URL}"));
        assert_eq!(stats.outcome(), SyncOutcome::UpToDate);
        assert!(source.calls.borrow().is_empty());
    }
}
