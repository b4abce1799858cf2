//! File identifiers and byte ranges.

use serde::{Deserialize, Serialize};

/// Identifies one translation unit registered in a [`SourceDb`](crate::SourceDb).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct FileId(u32);

impl FileId {
    /// Placeholder for spans that do not come from any input file.
    pub const DUMMY: FileId = FileId(u32::MAX);

    /// Wraps a raw index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// A half-open byte range `start..end` inside one translation unit.
///
/// Declarations, diagnostics and FFI signatures carry spans so that output
/// can be traced back to the C++ text it came from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Span {
    /// The translation unit.
    pub file: FileId,
    /// First byte (inclusive).
    pub start: u32,
    /// One past the last byte.
    pub end: u32,
}

impl Default for FileId {
    fn default() -> Self {
        FileId::DUMMY
    }
}

impl Span {
    /// Span used for synthesized items and tests.
    pub const DUMMY: Span = Span {
        file: FileId::DUMMY,
        start: 0,
        end: 0,
    };

    /// Creates a span.
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Returns the smallest span covering both `self` and `other`.
    ///
    /// Spans from different files cannot be combined; `self` is returned
    /// unchanged in that case, and a dummy side yields the other side.
    pub fn to(self, other: Span) -> Span {
        if self.is_dummy() {
            return other;
        }
        if other.is_dummy() || self.file != other.file {
            return self;
        }
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// True for zero-length spans.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if this span does not point into a real file.
    pub fn is_dummy(&self) -> bool {
        self.file == FileId::DUMMY
    }

    /// True if `offset` lies inside the span.
    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_raw() {
        assert_eq!(FileId::from_raw(3).as_raw(), 3);
        assert_ne!(FileId::from_raw(0), FileId::DUMMY);
    }

    #[test]
    fn covering_span() {
        let f = FileId::from_raw(0);
        let a = Span::new(f, 4, 9);
        let b = Span::new(f, 12, 20);
        assert_eq!(a.to(b), Span::new(f, 4, 20));
        assert_eq!(b.to(a), Span::new(f, 4, 20));
    }

    #[test]
    fn dummy_is_absorbed() {
        let a = Span::new(FileId::from_raw(1), 2, 5);
        assert_eq!(Span::DUMMY.to(a), a);
        assert_eq!(a.to(Span::DUMMY), a);
    }

    #[test]
    fn different_files_keep_left() {
        let a = Span::new(FileId::from_raw(0), 0, 3);
        let b = Span::new(FileId::from_raw(1), 10, 30);
        assert_eq!(a.to(b), a);
    }

    #[test]
    fn length_and_contains() {
        let s = Span::new(FileId::from_raw(0), 10, 14);
        assert_eq!(s.len(), 4);
        assert!(!s.is_empty());
        assert!(s.contains(10));
        assert!(!s.contains(14));
        assert!(Span::DUMMY.is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let s = Span::new(FileId::from_raw(2), 1, 8);
        let json = serde_json::to_string(&s).unwrap();
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
