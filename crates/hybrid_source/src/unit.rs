//! One registered translation unit.

use crate::span::FileId;
use std::path::PathBuf;

/// The text of one C++ input together with a line index.
pub struct SourceUnit {
    /// Identifier assigned by the database.
    pub id: FileId,
    /// Path on disk, or a synthetic name for in-memory input.
    pub path: PathBuf,
    /// Full text.
    pub text: String,
    line_starts: Vec<u32>,
}

impl SourceUnit {
    /// Builds a unit and indexes its line starts.
    pub fn new(id: FileId, path: PathBuf, text: String) -> Self {
        let mut line_starts = vec![0u32];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| (i + 1) as u32),
        );
        Self {
            id,
            path,
            text,
            line_starts,
        }
    }

    /// Number of lines (an empty file has one).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Maps a byte offset to 1-based `(line, column)`.
    ///
    /// Offsets past the end clamp to the last position.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.text.len() as u32);
        let idx = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        (idx as u32 + 1, offset - self.line_starts[idx] + 1)
    }

    /// Returns the text of a 1-based line without its trailing newline.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(idx)? as usize;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&e| e as usize)
            .unwrap_or(self.text.len());
        Some(self.text[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Returns the text between two byte offsets, clamped to the file.
    pub fn slice(&self, start: u32, end: u32) -> &str {
        let len = self.text.len();
        let start = (start as usize).min(len);
        let end = (end as usize).clamp(start, len);
        self.text.get(start..end).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str) -> SourceUnit {
        SourceUnit::new(FileId::from_raw(0), PathBuf::from("a.cpp"), text.to_string())
    }

    #[test]
    fn line_col_lookup() {
        let u = unit("int a;\nint b;\n\nclass C {};");
        assert_eq!(u.line_col(0), (1, 1));
        assert_eq!(u.line_col(7), (2, 1));
        assert_eq!(u.line_col(11), (2, 5));
        assert_eq!(u.line_col(15), (4, 1));
        assert_eq!(u.line_count(), 4);
    }

    #[test]
    fn offsets_past_end_clamp() {
        let u = unit("ab");
        assert_eq!(u.line_col(100), (1, 3));
        assert_eq!(u.slice(1, 100), "b");
        assert_eq!(u.slice(5, 2), "");
    }

    #[test]
    fn line_text_strips_newline() {
        let u = unit("first\r\nsecond\nthird");
        assert_eq!(u.line_text(1), Some("first"));
        assert_eq!(u.line_text(2), Some("second"));
        assert_eq!(u.line_text(3), Some("third"));
        assert_eq!(u.line_text(0), None);
        assert_eq!(u.line_text(4), None);
    }

    #[test]
    fn empty_unit() {
        let u = unit("");
        assert_eq!(u.line_count(), 1);
        assert_eq!(u.line_col(0), (1, 1));
        assert_eq!(u.line_text(1), Some(""));
    }
}
