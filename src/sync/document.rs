//! Line-addressable text buffer.

/// A document split into lines.
///
/// Lines are split on `\n` only, so `\r` stays part of its line and
/// [`Document::text`] reproduces the input byte for byte. Offsets are byte
/// offsets within a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
}

impl Document {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_owned).collect(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Replace a whole line. Out-of-range indices are ignored.
    pub fn set_line(&mut self, index: usize, text: String) {
        if let Some(line) = self.lines.get_mut(index) {
            *line = text;
        }
    }

    /// Replace `start..end` of one line with `text`.
    ///
    /// Returns `false` (and leaves the line untouched) when the line does not
    /// exist or the range is not on character boundaries.
    pub fn replace_range(&mut self, index: usize, start: usize, end: usize, text: &str) -> bool {
        let Some(line) = self.lines.get_mut(index) else {
            return false;
        };
        if start > end || !line.is_char_boundary(start) || !line.is_char_boundary(end) {
            return false;
        }
        line.replace_range(start..end, text);
        true
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}
