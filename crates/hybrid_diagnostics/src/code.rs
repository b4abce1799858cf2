//! Stable diagnostic codes.
//!
//! Codes are grouped by hundreds per producing stage: `0xx` input and setup,
//! `1xx` structural parsing, `2xx` feature analysis, `3xx` code generation,
//! `4xx` FFI binding generation. The constants themselves live next to the
//! code that emits them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Determines the prefix letter of a code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// `E`: the invocation cannot succeed.
    Error,
    /// `W`: output was produced but is degraded.
    Warning,
    /// `C`: stylistic notes about generated code.
    Convention,
}

impl Category {
    /// Returns the prefix letter.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Convention => 'C',
        }
    }
}

/// A category plus a number, displayed as `W101`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// Prefix category.
    pub category: Category,
    /// Number within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }

    /// Parses the display form back into a code (`"W301"`).
    pub fn parse(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        let category = match chars.next()? {
            'E' => Category::Error,
            'W' => Category::Warning,
            'C' => Category::Convention,
            _ => return None,
        };
        let number = chars.as_str().parse().ok()?;
        Some(Self { category, number })
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_to_three_digits() {
        assert_eq!(DiagnosticCode::new(Category::Error, 1).to_string(), "E001");
        assert_eq!(DiagnosticCode::new(Category::Warning, 301).to_string(), "W301");
        assert_eq!(DiagnosticCode::new(Category::Convention, 12).to_string(), "C012");
    }

    #[test]
    fn parse_display_form() {
        let code = DiagnosticCode::parse("W201").unwrap();
        assert_eq!(code, DiagnosticCode::new(Category::Warning, 201));
        assert!(DiagnosticCode::parse("X100").is_none());
        assert!(DiagnosticCode::parse("W").is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(Category::Warning, 101);
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
