//! Registry of every translation unit seen in one invocation.

use crate::span::{FileId, Span};
use crate::unit::SourceUnit;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// A span resolved to human-readable coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Path of the translation unit.
    pub path: PathBuf,
    /// 1-based line of the span start.
    pub line: u32,
    /// 1-based column of the span start.
    pub column: u32,
    /// 1-based line of the last byte.
    pub end_line: u32,
    /// 1-based column of the last byte.
    pub end_column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

/// Owns the text of all inputs.
///
/// Files are never removed, so a [`FileId`] stays valid for the lifetime of
/// the database.
#[derive(Default)]
pub struct SourceDb {
    units: Vec<SourceUnit>,
}

impl SourceDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a file from disk and registers it.
    pub fn load_file(&mut self, path: &Path) -> Result<FileId, io::Error> {
        let text = std::fs::read_to_string(path)?;
        Ok(self.add_source(path, text))
    }

    /// Registers in-memory text under `name`.
    pub fn add_source(&mut self, name: impl Into<PathBuf>, text: impl Into<String>) -> FileId {
        let id = FileId::from_raw(self.units.len() as u32);
        self.units.push(SourceUnit::new(id, name.into(), text.into()));
        id
    }

    /// Returns the unit for `id`, or `None` for dummy or foreign ids.
    pub fn get(&self, id: FileId) -> Option<&SourceUnit> {
        self.units.get(id.as_raw() as usize)
    }

    /// Returns the text of a unit, or an empty string for unknown ids.
    pub fn text(&self, id: FileId) -> &str {
        self.get(id).map(|u| u.text.as_str()).unwrap_or("")
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Resolves a span to line/column coordinates.
    pub fn locate(&self, span: Span) -> Option<Location> {
        let unit = self.get(span.file)?;
        let (line, column) = unit.line_col(span.start);
        let last = span.end.saturating_sub(1).max(span.start);
        let (end_line, end_column) = unit.line_col(last);
        Some(Location {
            path: unit.path.clone(),
            line,
            column,
            end_line,
            end_column,
        })
    }

    /// Returns the source text covered by a span.
    pub fn snippet(&self, span: Span) -> &str {
        self.get(span.file)
            .map(|u| u.slice(span.start, span.end))
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup() {
        let mut db = SourceDb::new();
        let a = db.add_source("a.cpp", "class A {};");
        let b = db.add_source("b.cpp", "int f();");
        assert_ne!(a, b);
        assert_eq!(db.len(), 2);
        assert_eq!(db.text(b), "int f();");
        assert!(db.get(FileId::DUMMY).is_none());
    }

    #[test]
    fn locate_span() {
        let mut db = SourceDb::new();
        let id = db.add_source("shapes.cpp", "struct P {\n  int x;\n};");
        let loc = db.locate(Span::new(id, 13, 19)).unwrap();
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 3);
        assert_eq!(loc.end_line, 2);
        assert_eq!(loc.end_column, 8);
        assert_eq!(loc.to_string(), "shapes.cpp:2:3");
    }

    #[test]
    fn dummy_span_has_no_location() {
        let db = SourceDb::new();
        assert!(db.locate(Span::DUMMY).is_none());
        assert_eq!(db.snippet(Span::DUMMY), "");
    }

    #[test]
    fn snippet_text() {
        let mut db = SourceDb::new();
        let id = db.add_source("t.cpp", "void run();");
        assert_eq!(db.snippet(Span::new(id, 5, 8)), "run");
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.cpp");
        std::fs::write(&path, "int main() { return 0; }").unwrap();
        let mut db = SourceDb::new();
        let id = db.load_file(&path).unwrap();
        assert_eq!(db.get(id).unwrap().path, path);
        assert!(db.text(id).starts_with("int main"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut db = SourceDb::new();
        let err = db.load_file(Path::new("/definitely/not/here.cpp"));
        assert!(err.is_err());
        assert!(db.is_empty());
    }
}
