//! Indented line writer shared by the generators.

/// Accumulates generated source with block indentation.
pub struct CodeWriter {
    out: String,
    depth: usize,
    unit: &'static str,
}

impl CodeWriter {
    /// Four-space indentation.
    pub fn spaces() -> Self {
        Self::with_unit("    ")
    }

    /// Tab indentation, as `gofmt` writes it.
    pub fn tabs() -> Self {
        Self::with_unit("\t")
    }

    fn with_unit(unit: &'static str) -> Self {
        Self {
            out: String::new(),
            depth: 0,
            unit,
        }
    }

    /// Writes one line at the current depth. Embedded newlines are split
    /// and each piece is indented.
    pub fn line(&mut self, text: impl AsRef<str>) {
        for piece in text.as_ref().split('\n') {
            if piece.is_empty() {
                self.out.push('\n');
                continue;
            }
            for _ in 0..self.depth {
                self.out.push_str(self.unit);
            }
            self.out.push_str(piece);
            self.out.push('\n');
        }
    }

    /// Writes an empty line unless the output already ends with one.
    pub fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    /// Writes `text` and indents what follows.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Dedents and writes `text`.
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// Raises the depth without writing.
    pub fn indent(&mut self) {
        self.depth += 1;
    }

    /// Lowers the depth without writing.
    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// The accumulated text, ending in exactly one newline.
    pub fn finish(self) -> String {
        let mut out = self.out.trim_end().to_string();
        out.push('\n');
        out
    }
}

/// Wraps `text` in parentheses unless it is already a single operand.
pub(crate) fn atom(text: &str) -> String {
    if is_atomic(text) {
        text.to_string()
    } else {
        format!("({text})")
    }
}

fn is_atomic(text: &str) -> bool {
    if text.is_empty() || text.starts_with(['*', '&', '!', '-']) {
        return false;
    }
    let mut depth = 0i32;
    let mut in_str = false;
    let mut prev = ' ';
    for c in text.chars() {
        if in_str {
            if c == '"' && prev != '\\' {
                in_str = false;
            }
            prev = c;
            continue;
        }
        match c {
            '"' => in_str = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if depth == 0 && c.is_whitespace() => return false,
            _ => {}
        }
        prev = c;
    }
    true
}

/// The negation of a rendered condition.
pub(crate) fn negated(cond: &str) -> String {
    if let Some(rest) = cond.strip_prefix('!') {
        if is_atomic(rest) {
            return rest.to_string();
        }
    }
    format!("!{}", atom(cond))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks() {
        let mut w = CodeWriter::spaces();
        w.open("fn f() {");
        w.open("if x {");
        w.line("y();");
        w.close("}");
        w.close("}");
        assert_eq!(w.finish(), "fn f() {\n    if x {\n        y();\n    }\n}\n");
    }

    #[test]
    fn tabs_and_multiline() {
        let mut w = CodeWriter::tabs();
        w.open("func f() {");
        w.line("a()\nb()");
        w.close("}");
        assert_eq!(w.finish(), "func f() {\n\ta()\n\tb()\n}\n");
    }

    #[test]
    fn blank_lines_collapse() {
        let mut w = CodeWriter::spaces();
        w.blank();
        w.line("a");
        w.blank();
        w.blank();
        w.line("b");
        assert_eq!(w.finish(), "a\n\nb\n");
    }

    #[test]
    fn atoms_and_negation() {
        assert_eq!(atom("self.x"), "self.x");
        assert_eq!(atom("foo(a, b)"), "foo(a, b)");
        assert_eq!(atom("a + b"), "(a + b)");
        assert_eq!(atom("*p"), "(*p)");
        assert_eq!(negated("done"), "!done");
        assert_eq!(negated("!done"), "done");
        assert_eq!(negated("a < b"), "!(a < b)");
    }
}
