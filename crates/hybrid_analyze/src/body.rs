//! Token view over a function body.
//!
//! The analyzers never match raw text: bodies are lexed once, so comments,
//! string literals and preprocessor lines cannot produce false hits, and every
//! recorded fragment is sliced back out of the original text by token span.

use hybrid_common::split_top_level;
use hybrid_cpp_parser::lexer::lex;
use hybrid_cpp_parser::{CppToken, Token};
use hybrid_source::FileId;

/// A lexed function body.
pub(crate) struct Body<'a> {
    text: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Body<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut tokens = lex(text, FileId::DUMMY);
        tokens.pop();
        Self { text, tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn kind(&self, i: usize) -> CppToken {
        self.tokens.get(i).map_or(CppToken::Eof, |t| t.kind)
    }

    pub fn text(&self, i: usize) -> &'a str {
        let text: &'a str = self.text;
        match self.tokens.get(i) {
            Some(t) => &text[t.span.start as usize..t.span.end as usize],
            None => "",
        }
    }

    pub fn is_ident(&self, i: usize, name: &str) -> bool {
        self.kind(i) == CppToken::Identifier && self.text(i) == name
    }

    /// Source text of tokens `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let text: &'a str = self.text;
        let end = end.min(self.tokens.len());
        if start >= end {
            return "";
        }
        &text[self.tokens[start].span.start as usize..self.tokens[end - 1].span.end as usize]
    }

    /// Source text strictly between tokens `open` and `close`, trimmed.
    pub fn between(&self, open: usize, close: usize) -> &'a str {
        let text: &'a str = self.text;
        let from = self.tokens.get(open).map_or(text.len(), |t| t.span.end as usize);
        let to = self
            .tokens
            .get(close)
            .map_or(text.len(), |t| t.span.start as usize);
        if to <= from {
            return "";
        }
        text[from..to].trim()
    }

    /// Index of the bracket closing the `(`, `[` or `{` at `open`.
    pub fn closing(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in open..self.tokens.len() {
            match self.kind(i) {
                CppToken::LeftParen | CppToken::LeftBracket | CppToken::LeftBrace => depth += 1,
                CppToken::RightParen | CppToken::RightBracket | CppToken::RightBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Index just past the `>` matching a `<` at `i`; `i` itself otherwise.
    pub fn skip_angles(&self, i: usize) -> usize {
        if self.kind(i) != CppToken::Less {
            return i;
        }
        let mut depth = 0usize;
        let mut j = i;
        while j < self.tokens.len() {
            match self.kind(j) {
                CppToken::Less => depth += 1,
                CppToken::Greater => {
                    depth -= 1;
                    if depth == 0 {
                        return j + 1;
                    }
                }
                CppToken::LeftParen | CppToken::LeftBracket => match self.closing(j) {
                    Some(close) => j = close,
                    None => return i,
                },
                CppToken::Semicolon | CppToken::LeftBrace | CppToken::RightBrace => return i,
                _ => {}
            }
            j += 1;
        }
        i
    }

    /// End of the expression starting at `start`: the first `;` or `,` at
    /// depth zero, or a closing bracket that belongs to an enclosing group.
    pub fn expression_end(&self, start: usize) -> usize {
        let mut depth = 0usize;
        for i in start..self.tokens.len() {
            match self.kind(i) {
                CppToken::LeftParen | CppToken::LeftBracket | CppToken::LeftBrace => depth += 1,
                CppToken::RightParen | CppToken::RightBracket | CppToken::RightBrace => {
                    if depth == 0 {
                        return i;
                    }
                    depth -= 1;
                }
                CppToken::Semicolon | CppToken::Comma if depth == 0 => return i,
                _ => {}
            }
        }
        self.tokens.len()
    }

    /// Index of the `;` ending the statement that starts at `start`.
    pub fn statement_end(&self, start: usize) -> usize {
        let mut depth = 0usize;
        for i in start..self.tokens.len() {
            match self.kind(i) {
                CppToken::LeftParen | CppToken::LeftBracket | CppToken::LeftBrace => depth += 1,
                CppToken::RightParen | CppToken::RightBracket | CppToken::RightBrace => {
                    if depth == 0 {
                        return i;
                    }
                    depth -= 1;
                }
                CppToken::Semicolon if depth == 0 => return i,
                _ => {}
            }
        }
        self.tokens.len()
    }

    /// Index of the `}` closing the block that contains token `i`, or the
    /// body length for the outermost block.
    pub fn block_end(&self, i: usize) -> usize {
        let mut depth = 0usize;
        for j in i..self.tokens.len() {
            match self.kind(j) {
                CppToken::LeftBrace => depth += 1,
                CppToken::RightBrace => {
                    if depth == 0 {
                        return j;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        self.tokens.len()
    }

    /// True if token `i` starts a new statement.
    pub fn at_statement_start(&self, i: usize) -> bool {
        i == 0
            || matches!(
                self.kind(i - 1),
                CppToken::Semicolon | CppToken::LeftBrace | CppToken::RightBrace | CppToken::Colon
            )
            || (self.kind(i - 1) == CppToken::RightParen && self.opens_control_statement(i - 1))
            || self.kind(i - 1) == CppToken::Else
    }

    fn opens_control_statement(&self, close: usize) -> bool {
        (0..close)
            .rev()
            .find(|&open| {
                self.kind(open) == CppToken::LeftParen && self.closing(open) == Some(close)
            })
            .is_some_and(|open| {
                open > 0
                    && matches!(
                        self.kind(open - 1),
                        CppToken::If | CppToken::While | CppToken::For | CppToken::Switch
                    )
            })
    }

    /// Matches a standard library name at `i`: `std::name`, or a bare
    /// `name` in declaration position (followed by `<` or an identifier).
    /// Returns the name and the index just past it.
    pub fn std_name(&self, i: usize, names: &[&str]) -> Option<(&'a str, usize)> {
        if self.is_ident(i, "std") && self.kind(i + 1) == CppToken::ColonColon {
            let name = self.text(i + 2);
            return (self.kind(i + 2) == CppToken::Identifier && names.contains(&name))
                .then_some((name, i + 3));
        }
        if self.kind(i) != CppToken::Identifier || !names.contains(&self.text(i)) {
            return None;
        }
        if i > 0
            && matches!(
                self.kind(i - 1),
                CppToken::Dot | CppToken::Arrow | CppToken::ColonColon
            )
        {
            return None;
        }
        matches!(self.kind(i + 1), CppToken::Less | CppToken::Identifier)
            .then_some((self.text(i), i + 1))
    }

    /// Splits the arguments of the group opened at `open`. Returns the
    /// arguments and the index of the closing bracket.
    pub fn call_args(&self, open: usize) -> Option<(Vec<String>, usize)> {
        if !matches!(self.kind(open), CppToken::LeftParen | CppToken::LeftBrace) {
            return None;
        }
        let close = self.closing(open)?;
        let args = split_top_level(self.between(open, close), ',')
            .into_iter()
            .map(str::to_string)
            .collect();
        Some((args, close))
    }

    /// Matches `receiver.method(` or `receiver->method(` with the receiver
    /// identifier at `i`. Returns the method name and the index of `(`.
    pub fn member_call(&self, i: usize) -> Option<(&'a str, usize)> {
        (self.kind(i) == CppToken::Identifier
            && matches!(self.kind(i + 1), CppToken::Dot | CppToken::Arrow)
            && self.kind(i + 2) == CppToken::Identifier
            && self.kind(i + 3) == CppToken::LeftParen)
            .then(|| (self.text(i + 2), i + 3))
    }

    /// True if the identifier at `i` names a variable or a field of `this`
    /// rather than a member of some other object.
    pub fn is_unqualified_use(&self, i: usize) -> bool {
        if i == 0 {
            return true;
        }
        match self.kind(i - 1) {
            CppToken::Dot | CppToken::ColonColon => false,
            CppToken::Arrow => i >= 2 && self.kind(i - 2) == CppToken::This,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_follow_spans() {
        let body = Body::new("int x = f(1, 2); // trailing\nreturn x;");
        assert_eq!(body.slice(0, 4), "int x = f");
        let open = 4;
        let (args, close) = body.call_args(open).unwrap();
        assert_eq!(args, vec!["1", "2"]);
        assert_eq!(body.kind(close), CppToken::RightParen);
    }

    #[test]
    fn expression_and_statement_ends() {
        let body = Body::new("auto v = g(a, b), w; h(c);");
        assert_eq!(body.text(body.expression_end(3)), ",");
        assert_eq!(body.text(body.statement_end(0)), ";");
        assert_eq!(body.statement_end(0), 11);
    }

    #[test]
    fn block_end_finds_enclosing_brace() {
        let body = Body::new("{ lock(); { inner(); } tail(); } after();");
        let lock = 1;
        let end = body.block_end(lock);
        assert_eq!(body.kind(end), CppToken::RightBrace);
        assert_eq!(body.between(lock + 3, end), "{ inner(); } tail();");
    }

    #[test]
    fn std_names_qualified_and_bare() {
        let body = Body::new("std::mutex m; mutex n; obj.mutex = 1;");
        assert_eq!(body.std_name(0, &["mutex"]), Some(("mutex", 3)));
        assert_eq!(body.std_name(5, &["mutex"]), Some(("mutex", 6)));
        assert_eq!(body.std_name(10, &["mutex"]), None);
    }

    #[test]
    fn member_calls() {
        let body = Body::new("t.join(); p->get_future();");
        assert_eq!(body.member_call(0), Some(("join", 3)));
        assert_eq!(body.member_call(6), Some(("get_future", 9)));
        assert_eq!(body.member_call(1), None);
    }

    #[test]
    fn unqualified_uses() {
        let body = Body::new("count = this->count + other.count;");
        assert!(body.is_unqualified_use(0));
        assert!(body.is_unqualified_use(4));
        assert!(!body.is_unqualified_use(8));
    }
}
