//! Token cursor over a body fragment.

use hybrid_cpp_parser::lexer::lex;
use hybrid_cpp_parser::{CppToken, Token};
use hybrid_source::FileId;

pub(super) struct Cursor<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pub pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut tokens = lex(text, FileId::DUMMY);
        tokens.pop();
        Self {
            text,
            tokens,
            pos: 0,
        }
    }

    pub fn kind_at(&self, i: usize) -> CppToken {
        self.tokens.get(i).map_or(CppToken::Eof, |t| t.kind)
    }

    pub fn peek(&self) -> CppToken {
        self.kind_at(self.pos)
    }

    pub fn peek_n(&self, n: usize) -> CppToken {
        self.kind_at(self.pos + n)
    }

    pub fn text_at(&self, i: usize) -> &'a str {
        let text: &'a str = self.text;
        match self.tokens.get(i) {
            Some(t) => &text[t.span.start as usize..t.span.end as usize],
            None => "",
        }
    }

    pub fn current(&self) -> &'a str {
        self.text_at(self.pos)
    }

    pub fn at(&self, kind: CppToken) -> bool {
        self.peek() == kind
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn bump(&mut self) -> &'a str {
        let text = self.current();
        self.pos += 1;
        text
    }

    pub fn eat(&mut self, kind: CppToken) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, kind: CppToken) -> Option<()> {
        self.eat(kind).then_some(())
    }

    /// True if tokens `i` and `i + 1` touch, as the two halves of `>>` do.
    pub fn adjacent(&self, i: usize) -> bool {
        match (self.tokens.get(i), self.tokens.get(i + 1)) {
            (Some(a), Some(b)) => a.span.end == b.span.start,
            _ => false,
        }
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

    /// Index of the bracket closing the one at `open`.
    pub fn closing(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in open..self.tokens.len() {
            match self.kind_at(i) {
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

    /// Index just past the `>` matching a `<` at `i`, or `None` when the
    /// angle brackets do not close before a statement boundary.
    pub fn skip_angles(&self, i: usize) -> Option<usize> {
        if self.kind_at(i) != CppToken::Less {
            return None;
        }
        let mut depth = 0usize;
        let mut j = i;
        while j < self.tokens.len() {
            match self.kind_at(j) {
                CppToken::Less => depth += 1,
                CppToken::Greater => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(j + 1);
                    }
                }
                CppToken::LeftParen | CppToken::LeftBracket => j = self.closing(j)?,
                CppToken::Semicolon
                | CppToken::LeftBrace
                | CppToken::RightBrace
                | CppToken::AmpAmp
                | CppToken::PipePipe
                | CppToken::RightParen => return None,
                _ => {}
            }
            j += 1;
        }
        None
    }

    /// Index of the `;` ending the statement at `start`, or of the `}`
    /// closing a statement that is itself a block.
    pub fn statement_end(&self, start: usize) -> usize {
        let mut depth = 0usize;
        for i in start..self.tokens.len() {
            match self.kind_at(i) {
                CppToken::LeftParen | CppToken::LeftBracket | CppToken::LeftBrace => depth += 1,
                CppToken::RightParen | CppToken::RightBracket => depth = depth.saturating_sub(1),
                CppToken::RightBrace => {
                    if depth == 0 {
                        return i.saturating_sub(1);
                    }
                    depth -= 1;
                    if depth == 0 && self.kind_at(i + 1) != CppToken::Semicolon {
                        let opener = (start..i).find(|&j| self.closing(j) == Some(i));
                        if opener.is_some_and(|j| {
                            j == start || self.kind_at(j - 1) == CppToken::RightParen
                        }) {
                            return i;
                        }
                    }
                }
                CppToken::Semicolon if depth == 0 => return i,
                _ => {}
            }
        }
        self.tokens.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_is_two_adjacent_greaters() {
        let c = Cursor::new("a >> b; x > > y;");
        assert_eq!(c.kind_at(1), CppToken::Greater);
        assert!(c.adjacent(1));
        assert!(!c.adjacent(6));
    }

    #[test]
    fn angles_close_before_call() {
        let c = Cursor::new("std::vector<std::map<int, int>>(n)");
        assert_eq!(c.skip_angles(3), Some(13));
        assert_eq!(c.kind_at(13), CppToken::LeftParen);
        let lt = Cursor::new("a < b && c > d");
        assert_eq!(lt.skip_angles(1), None);
    }

    #[test]
    fn statement_ends() {
        let c = Cursor::new("f(a, {1, 2}); while (x) { y(); } z;");
        assert_eq!(c.text_at(c.statement_end(0)), ";");
        assert_eq!(c.statement_end(0), 10);
        assert_eq!(c.text_at(c.statement_end(11)), "}");
    }
}
