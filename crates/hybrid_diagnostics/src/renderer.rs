//! Text and JSON output for diagnostics.

use crate::diagnostic::{Diagnostic, LabelStyle};
use crate::severity::Severity;
use hybrid_source::SourceDb;

/// Formats one diagnostic.
pub trait DiagnosticRenderer {
    /// Renders `diag`, resolving spans through `db`.
    fn render(&self, diag: &Diagnostic, db: &SourceDb) -> String;

    /// Renders a batch, one diagnostic after another.
    fn render_all(&self, diags: &[Diagnostic], db: &SourceDb) -> String {
        diags.iter().map(|d| self.render(d, db)).collect()
    }
}

/// rustc-style terminal output:
///
/// ```text
/// warning[W101]: skipped unrecognized declaration
///   --> input.cpp:3:1
///    |
///  3 | operator int() const;
///    | ^^^^^^^^
///    = note: ...
/// ```
pub struct TerminalRenderer {
    /// Emit ANSI colors.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, ansi: &str) -> String {
        if self.color {
            format!("\x1b[{ansi}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn severity_color(severity: Severity) -> &'static str {
        match severity {
            Severity::Error => "1;31",
            Severity::Warning => "1;33",
            Severity::Note => "1;36",
        }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, db: &SourceDb) -> String {
        let mut out = String::new();
        let head = format!("{}[{}]", diag.severity, diag.code);
        out.push_str(&self.paint(&head, Self::severity_color(diag.severity)));
        out.push_str(&format!(": {}\n", diag.message));

        if let Some(loc) = db.locate(diag.span) {
            let gutter = loc.line.to_string().len();
            let pad = " ".repeat(gutter);
            out.push_str(&format!("{pad}--> {loc}\n"));
            let line_text = db
                .get(diag.span.file)
                .and_then(|u| u.line_text(loc.line))
                .unwrap_or("");
            out.push_str(&format!("{pad} |\n"));
            out.push_str(&format!("{} | {line_text}\n", loc.line));

            let width = if loc.end_line == loc.line {
                (loc.end_column + 1).saturating_sub(loc.column).max(1) as usize
            } else {
                line_text.len().saturating_sub(loc.column as usize - 1).max(1)
            };
            let marker = diag
                .labels
                .iter()
                .find(|l| l.style == LabelStyle::Primary)
                .map(|l| format!(" {}", l.message))
                .unwrap_or_default();
            let underline = self.paint(&"^".repeat(width), Self::severity_color(diag.severity));
            out.push_str(&format!(
                "{pad} | {}{underline}{marker}\n",
                " ".repeat(loc.column as usize - 1)
            ));

            for label in diag.labels.iter().filter(|l| l.style == LabelStyle::Secondary) {
                if let Some(other) = db.locate(label.span) {
                    out.push_str(&format!("{pad} = {other}: {}\n", label.message));
                }
            }
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

/// One JSON object per line, suitable for editors and CI tooling.
///
/// Each object carries the serialized diagnostic plus a resolved `location`
/// string when the span points into a known file.
#[derive(Default)]
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic, db: &SourceDb) -> String {
        let mut value = serde_json::to_value(diag).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert("code".into(), diag.code.to_string().into());
            if let Some(loc) = db.locate(diag.span) {
                obj.insert("location".into(), loc.to_string().into());
            }
        }
        format!("{value}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};
    use crate::diagnostic::Label;
    use hybrid_source::Span;

    fn warning_at(db: &mut SourceDb) -> Diagnostic {
        let id = db.add_source("input.cpp", "class A {\n  operator int() const;\n};\n");
        let span = Span::new(id, 12, 20);
        Diagnostic::warning(
            DiagnosticCode::new(Category::Warning, 101),
            "skipped unrecognized declaration",
            span,
        )
        .with_label(Label::primary(span, "not a field or method"))
        .with_note("the declaration is omitted from the output")
    }

    #[test]
    fn terminal_with_source_line() {
        let mut db = SourceDb::new();
        let diag = warning_at(&mut db);
        let out = TerminalRenderer::new(false).render(&diag, &db);
        assert!(out.starts_with("warning[W101]: skipped unrecognized declaration\n"));
        assert!(out.contains("--> input.cpp:2:3"));
        assert!(out.contains("2 |   operator int() const;"));
        assert!(out.contains("^^^^^^^^ not a field or method"));
        assert!(out.contains("= note: the declaration is omitted from the output"));
    }

    #[test]
    fn terminal_without_location() {
        let db = SourceDb::new();
        let diag = Diagnostic::error(
            DiagnosticCode::new(Category::Error, 2),
            "no generator registered for target `java`",
            Span::DUMMY,
        )
        .with_help("available targets: go, rust");
        let out = TerminalRenderer::new(false).render(&diag, &db);
        assert!(out.contains("error[E002]"));
        assert!(!out.contains("-->"));
        assert!(out.contains("= help: available targets: go, rust"));
    }

    #[test]
    fn terminal_color_wraps_header() {
        let db = SourceDb::new();
        let diag = Diagnostic::warning(
            DiagnosticCode::new(Category::Warning, 301),
            "no lowering",
            Span::DUMMY,
        );
        let out = TerminalRenderer::new(true).render(&diag, &db);
        assert!(out.starts_with("\x1b[1;33mwarning[W301]\x1b[0m"));
    }

    #[test]
    fn json_line_has_code_and_location() {
        let mut db = SourceDb::new();
        let diag = warning_at(&mut db);
        let out = JsonRenderer.render(&diag, &db);
        assert!(out.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["code"], "W101");
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["location"], "input.cpp:2:3");
    }

    #[test]
    fn render_all_concatenates() {
        let mut db = SourceDb::new();
        let diag = warning_at(&mut db);
        let out = JsonRenderer.render_all(&[diag.clone(), diag], &db);
        assert_eq!(out.lines().count(), 2);
    }
}
