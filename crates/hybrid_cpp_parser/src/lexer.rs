//! Lexical analyzer for C++ source text.
//!
//! Converts source text into a sequence of [`Token`]s. Line and block
//! comments are dropped here, before any structural matching, and
//! preprocessor lines (a `#` first on its line, with backslash
//! continuations) are skipped whole. The lexer never fails: unterminated
//! literals and comments run to the end of input, and stray bytes become
//! [`CppToken::Unknown`] tokens.

use crate::token::{lookup_keyword, CppToken, Token};
use hybrid_source::{FileId, Span};

/// Lexes the given C++ source text into a vector of tokens.
///
/// The returned vector always ends with a [`CppToken::Eof`] token.
pub fn lex(source: &str, file: FileId) -> Vec<Token> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        file,
        line_start: true,
    };
    lexer.lex_all()
}

/// Lexes `source` and returns the tokens' texts, without the trailing EOF.
///
/// Convenience for analyzers that scan snippets such as function bodies.
pub fn lex_texts(source: &str) -> Vec<(CppToken, &str)> {
    lex(source, FileId::DUMMY)
        .into_iter()
        .filter(|t| t.kind != CppToken::Eof)
        .map(|t| (t.kind, &source[t.span.start as usize..t.span.end as usize]))
        .collect()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    file: FileId,
    line_start: bool,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: CppToken::Eof,
                    span: Span::new(self.file, self.pos as u32, self.pos as u32),
                });
                break;
            }
            self.line_start = false;
            tokens.push(self.next_token());
        }
        tokens
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> u8 {
        let b = self.source[self.pos];
        self.pos += 1;
        b
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn token(&self, kind: CppToken, start: usize) -> Token {
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while !self.at_end() && self.peek().is_ascii_whitespace() {
                if self.advance() == b'\n' {
                    self.line_start = true;
                }
            }
            if self.at_end() {
                return;
            }
            // Line comment
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                while !self.at_end() && self.peek() != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            // Block comment
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                self.pos += 2;
                while !self.at_end() && !(self.peek() == b'*' && self.peek_at(1) == b'/') {
                    self.pos += 1;
                }
                self.pos = (self.pos + 2).min(self.source.len());
                continue;
            }
            // Preprocessor directive, possibly continued with backslashes
            if self.line_start && self.peek() == b'#' {
                while !self.at_end() && self.peek() != b'\n' {
                    if self.peek() == b'\\' && self.peek_at(1) == b'\n' {
                        self.pos += 1;
                    } else if self.peek() == b'\\'
                        && self.peek_at(1) == b'\r'
                        && self.peek_at(2) == b'\n'
                    {
                        self.pos += 2;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.peek();
        if is_ident_start(b) {
            return self.lex_identifier(start);
        }
        if b.is_ascii_digit() || (b == b'.' && self.peek_at(1).is_ascii_digit()) {
            return self.lex_number(start);
        }
        match b {
            b'"' => {
                self.pos += 1;
                self.lex_quoted(start, b'"', CppToken::StringLiteral)
            }
            b'\'' => {
                self.pos += 1;
                self.lex_quoted(start, b'\'', CppToken::CharLiteral)
            }
            _ => self.lex_punct(start),
        }
    }

    fn lex_identifier(&mut self, start: usize) -> Token {
        while !self.at_end() && is_ident_continue(self.peek()) {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        match (text, self.peek()) {
            (b"R" | b"LR" | b"uR" | b"UR" | b"u8R", b'"') => {
                self.pos += 1;
                return self.lex_raw_string(start);
            }
            (b"L" | b"u" | b"U" | b"u8", b'"') => {
                self.pos += 1;
                return self.lex_quoted(start, b'"', CppToken::StringLiteral);
            }
            (b"L" | b"u" | b"U" | b"u8", b'\'') => {
                self.pos += 1;
                return self.lex_quoted(start, b'\'', CppToken::CharLiteral);
            }
            _ => {}
        }
        let kind = std::str::from_utf8(text)
            .ok()
            .and_then(lookup_keyword)
            .unwrap_or(CppToken::Identifier);
        self.token(kind, start)
    }

    fn lex_number(&mut self, start: usize) -> Token {
        let hex = self.peek() == b'0' && matches!(self.peek_at(1), b'x' | b'X');
        let mut float = false;
        while !self.at_end() {
            let c = self.peek();
            let prev = self.source[self.pos.saturating_sub(1)];
            if c == b'.' {
                // `v[0].x` is member access, not a fraction.
                if float || hex || is_ident_start(self.peek_at(1)) {
                    break;
                }
                float = true;
            } else if !hex && matches!(c, b'e' | b'E') {
                float = true;
            } else if matches!(c, b'+' | b'-') && self.pos > start {
                let exponent = if hex {
                    matches!(prev, b'p' | b'P')
                } else {
                    matches!(prev, b'e' | b'E')
                };
                if !exponent {
                    break;
                }
            } else if c == b'\'' {
                if !self.peek_at(1).is_ascii_alphanumeric() {
                    break;
                }
            } else if !is_ident_continue(c) {
                break;
            }
            self.pos += 1;
        }
        let kind = if float {
            CppToken::FloatLiteral
        } else {
            CppToken::IntLiteral
        };
        self.token(kind, start)
    }

    /// Lexes up to the closing `quote`; the opening quote is already consumed.
    fn lex_quoted(&mut self, start: usize, quote: u8, kind: CppToken) -> Token {
        while !self.at_end() {
            match self.advance() {
                b'\\' if !self.at_end() => {
                    self.pos += 1;
                }
                b'\n' => break,
                c if c == quote => break,
                _ => {}
            }
        }
        self.token(kind, start)
    }

    /// Lexes `R"delim( ... )delim"`; the opening quote is already consumed.
    fn lex_raw_string(&mut self, start: usize) -> Token {
        let delim_start = self.pos;
        while !self.at_end() && self.peek() != b'(' && self.peek() != b'\n' {
            self.pos += 1;
        }
        let mut terminator = vec![b')'];
        terminator.extend_from_slice(&self.source[delim_start..self.pos]);
        terminator.push(b'"');
        while !self.at_end() {
            if self.source[self.pos..].starts_with(&terminator) {
                self.pos += terminator.len();
                break;
            }
            self.pos += 1;
        }
        self.token(CppToken::StringLiteral, start)
    }

    fn lex_punct(&mut self, start: usize) -> Token {
        let b = self.advance();
        let next = self.peek();
        let kind = match b {
            b'{' => CppToken::LeftBrace,
            b'}' => CppToken::RightBrace,
            b'(' => CppToken::LeftParen,
            b')' => CppToken::RightParen,
            b'[' => CppToken::LeftBracket,
            b']' => CppToken::RightBracket,
            b';' => CppToken::Semicolon,
            b',' => CppToken::Comma,
            b'?' => CppToken::Question,
            b'~' => CppToken::Tilde,
            b':' if next == b':' => self.take(1, CppToken::ColonColon),
            b':' => CppToken::Colon,
            b'.' if next == b'.' && self.peek_at(1) == b'.' => self.take(2, CppToken::Ellipsis),
            b'.' => CppToken::Dot,
            b'<' if next == b'<' && self.peek_at(1) == b'=' => {
                self.take(2, CppToken::CompoundAssign)
            }
            b'<' if next == b'<' => self.take(1, CppToken::ShiftLeft),
            b'<' if next == b'=' => self.take(1, CppToken::LessEqual),
            b'<' => CppToken::Less,
            b'>' if next == b'>' && self.peek_at(1) == b'=' => {
                self.take(2, CppToken::CompoundAssign)
            }
            b'>' if next == b'=' => self.take(1, CppToken::GreaterEqual),
            b'>' => CppToken::Greater,
            b'-' if next == b'>' => self.take(1, CppToken::Arrow),
            b'-' if next == b'-' => self.take(1, CppToken::MinusMinus),
            b'-' if next == b'=' => self.take(1, CppToken::CompoundAssign),
            b'-' => CppToken::Minus,
            b'+' if next == b'+' => self.take(1, CppToken::PlusPlus),
            b'+' if next == b'=' => self.take(1, CppToken::CompoundAssign),
            b'+' => CppToken::Plus,
            b'&' if next == b'&' => self.take(1, CppToken::AmpAmp),
            b'&' if next == b'=' => self.take(1, CppToken::CompoundAssign),
            b'&' => CppToken::Amp,
            b'|' if next == b'|' => self.take(1, CppToken::PipePipe),
            b'|' if next == b'=' => self.take(1, CppToken::CompoundAssign),
            b'|' => CppToken::Pipe,
            b'=' if next == b'=' => self.take(1, CppToken::EqualEqual),
            b'=' => CppToken::Assign,
            b'!' if next == b'=' => self.take(1, CppToken::BangEqual),
            b'!' => CppToken::Bang,
            b'*' | b'/' | b'%' | b'^' if next == b'=' => self.take(1, CppToken::CompoundAssign),
            b'*' => CppToken::Star,
            b'/' => CppToken::Slash,
            b'%' => CppToken::Percent,
            b'^' => CppToken::Caret,
            b'#' if next == b'#' => self.take(1, CppToken::Hash),
            b'#' => CppToken::Hash,
            _ => {
                // Skip the rest of a multi-byte UTF-8 sequence.
                while !self.at_end() && (self.peek() & 0xC0) == 0x80 {
                    self.pos += 1;
                }
                CppToken::Unknown
            }
        };
        self.token(kind, start)
    }

    fn take(&mut self, extra: usize, kind: CppToken) -> CppToken {
        self.pos += extra;
        kind
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<CppToken> {
        lex(source, FileId::DUMMY).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input() {
        assert_eq!(kinds(""), vec![CppToken::Eof]);
    }

    #[test]
    fn class_head() {
        assert_eq!(
            kinds("class Point { public: int x; };"),
            vec![
                CppToken::Class,
                CppToken::Identifier,
                CppToken::LeftBrace,
                CppToken::Public,
                CppToken::Colon,
                CppToken::Int,
                CppToken::Identifier,
                CppToken::Semicolon,
                CppToken::RightBrace,
                CppToken::Semicolon,
                CppToken::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_dropped() {
        let src = "int /* a { brace */ x; // trailing }\n";
        assert_eq!(
            kinds(src),
            vec![
                CppToken::Int,
                CppToken::Identifier,
                CppToken::Semicolon,
                CppToken::Eof
            ]
        );
    }

    #[test]
    fn preprocessor_lines_skipped() {
        let src = "#include <vector>\n#define MAX(a, b) \\\n  ((a) > (b) ? (a) : (b))\nint y;";
        assert_eq!(
            kinds(src),
            vec![
                CppToken::Int,
                CppToken::Identifier,
                CppToken::Semicolon,
                CppToken::Eof
            ]
        );
    }

    #[test]
    fn hash_mid_line_is_a_token() {
        assert_eq!(kinds("a # b")[1], CppToken::Hash);
    }

    #[test]
    fn nested_template_close_is_two_tokens() {
        let toks = kinds("std::vector<std::vector<int>> v;");
        let greater = toks.iter().filter(|k| **k == CppToken::Greater).count();
        assert_eq!(greater, 2);
        assert!(toks.contains(&CppToken::ColonColon));
    }

    #[test]
    fn literals() {
        let texts = lex_texts(r#"42 0x2Au 1'000 3.14f 1e-9 "a \"b\"" 'c' u8"x" R"(raw "text")""#);
        let kinds: Vec<_> = texts.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                CppToken::IntLiteral,
                CppToken::IntLiteral,
                CppToken::IntLiteral,
                CppToken::FloatLiteral,
                CppToken::FloatLiteral,
                CppToken::StringLiteral,
                CppToken::CharLiteral,
                CppToken::StringLiteral,
                CppToken::StringLiteral,
            ]
        );
        assert_eq!(texts[2].1, "1'000");
        assert_eq!(texts[8].1, r#"R"(raw "text")""#);
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("a->b += c << d && !e"),
            vec![
                CppToken::Identifier,
                CppToken::Arrow,
                CppToken::Identifier,
                CppToken::CompoundAssign,
                CppToken::Identifier,
                CppToken::ShiftLeft,
                CppToken::Identifier,
                CppToken::AmpAmp,
                CppToken::Bang,
                CppToken::Identifier,
                CppToken::Eof,
            ]
        );
    }

    #[test]
    fn spans_cover_text() {
        let src = "co_await fetch();";
        let toks = lex(src, FileId::DUMMY);
        assert_eq!(toks[0].kind, CppToken::CoAwait);
        assert_eq!(toks[0].span.start, 0);
        assert_eq!(toks[0].span.end, 8);
        assert_eq!(&src[toks[1].span.start as usize..toks[1].span.end as usize], "fetch");
    }

    #[test]
    fn unterminated_comment_runs_to_end() {
        assert_eq!(kinds("int x; /* open"), vec![
            CppToken::Int,
            CppToken::Identifier,
            CppToken::Semicolon,
            CppToken::Eof
        ]);
    }
}
