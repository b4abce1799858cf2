//! The diagnostic record and its labels.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use hybrid_source::Span;
use serde::{Deserialize, Serialize};

/// Whether a label marks the problem itself or related context.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LabelStyle {
    /// Underlined with `^`.
    Primary,
    /// Underlined with `-`.
    Secondary,
}

/// A message attached to a source range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Annotated range.
    pub span: Span,
    /// Text shown next to the underline.
    pub message: String,
    /// Underline style.
    pub style: LabelStyle,
}

impl Label {
    /// A primary label.
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    /// A secondary label.
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Secondary,
        }
    }
}

/// One reported problem.
///
/// Built with [`Diagnostic::error`] or [`Diagnostic::warning`] and refined
/// with the `with_*` builder methods:
///
/// ```
/// use hybrid_diagnostics::{Category, Diagnostic, DiagnosticCode};
/// use hybrid_source::Span;
///
/// let diag = Diagnostic::warning(
///     DiagnosticCode::new(Category::Warning, 101),
///     "skipped unrecognized declaration",
///     Span::DUMMY,
/// )
/// .with_note("the declaration is omitted from the output");
/// assert_eq!(diag.notes.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Stable code.
    pub code: DiagnosticCode,
    /// One-line summary.
    pub message: String,
    /// Where the problem is.
    pub span: Span,
    /// Additional annotated ranges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    /// `note:` lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// `help:` lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            span,
            labels: Vec::new(),
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// An error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self::with_severity(Severity::Error, code, message, span)
    }

    /// A warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self::with_severity(Severity::Warning, code, message, span)
    }

    /// A note diagnostic.
    pub fn note(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self::with_severity(Severity::Note, code, message, span)
    }

    /// Adds a label.
    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    /// Adds a note line.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help line.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn constructors_set_severity() {
        let code = DiagnosticCode::new(Category::Warning, 301);
        assert_eq!(Diagnostic::error(code, "x", Span::DUMMY).severity, Severity::Error);
        assert_eq!(Diagnostic::warning(code, "x", Span::DUMMY).severity, Severity::Warning);
        assert_eq!(Diagnostic::note(code, "x", Span::DUMMY).severity, Severity::Note);
    }

    #[test]
    fn builder_accumulates() {
        let diag = Diagnostic::warning(
            DiagnosticCode::new(Category::Warning, 302),
            "method `area` defined by two bases",
            Span::DUMMY,
        )
        .with_label(Label::secondary(Span::DUMMY, "also declared here"))
        .with_note("the first base in declaration order wins")
        .with_help("rename one of the methods");
        assert_eq!(diag.labels.len(), 1);
        assert_eq!(diag.labels[0].style, LabelStyle::Secondary);
        assert_eq!(diag.notes, vec!["the first base in declaration order wins"]);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn serde_roundtrip_skips_empty_lists() {
        let diag = Diagnostic::warning(
            DiagnosticCode::new(Category::Warning, 101),
            "skipped",
            Span::DUMMY,
        );
        let json = serde_json::to_string(&diag).unwrap();
        assert!(!json.contains("labels"));
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diag);
    }
}
