//! Depth-aware splitting of parameter, argument and template lists.
//!
//! A naive `split(',')` breaks as soon as an element contains a nested
//! generic, call or initializer list (`std::map<int, std::vector<int>> m`).
//! Every scanner here tracks parenthesis, bracket, brace and angle-bracket
//! depth and skips string and character literals.
//!
//! Angle brackets are ambiguous in C++. The rules used here:
//! - `<<` and `->` never change depth.
//! - `>>` closes two open angles when two are open, one when one is open,
//!   and is a shift operator otherwise.
//! - A `>` with no open angle is a comparison operator.

/// Tracks nesting while walking a byte string.
#[derive(Default, Clone, Copy, Debug)]
struct Depth {
    group: i32,
    angle: i32,
}

impl Depth {
    fn is_top(&self) -> bool {
        self.group == 0 && self.angle == 0
    }
}

/// Walks `text` and calls `visit(index, depth_is_top)` for every byte that is
/// outside string/char literals. Multi-byte operators are consumed whole and
/// reported at their first byte.
fn walk(text: &str, mut visit: impl FnMut(usize, bool) -> bool) {
    let bytes = text.as_bytes();
    let mut depth = Depth::default();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' => {
                i = skip_literal(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => {
                if !visit(i, depth.is_top()) {
                    return;
                }
                depth.group += 1;
            }
            b')' | b']' | b'}' => {
                depth.group = (depth.group - 1).max(0);
                if !visit(i, depth.is_top()) {
                    return;
                }
            }
            b'<' if bytes.get(i + 1) == Some(&b'<') => {
                if !visit(i, depth.is_top()) {
                    return;
                }
                i += 2;
                continue;
            }
            b'<' if bytes.get(i + 1) == Some(&b'=') => {
                if !visit(i, depth.is_top()) {
                    return;
                }
                i += 2;
                continue;
            }
            b'<' => {
                if !visit(i, depth.is_top()) {
                    return;
                }
                depth.angle += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'>') => {
                if !visit(i, depth.is_top()) {
                    return;
                }
                i += 2;
                continue;
            }
            b'>' if bytes.get(i + 1) == Some(&b'>') => {
                depth.angle = match depth.angle {
                    0 => 0,
                    1 => 0,
                    n => n - 2,
                };
                if !visit(i, depth.is_top()) {
                    return;
                }
                i += 2;
                continue;
            }
            b'>' if bytes.get(i + 1) == Some(&b'=') && depth.angle == 0 => {
                if !visit(i, depth.is_top()) {
                    return;
                }
                i += 2;
                continue;
            }
            b'>' => {
                depth.angle = (depth.angle - 1).max(0);
                if !visit(i, depth.is_top()) {
                    return;
                }
            }
            _ => {
                if !visit(i, depth.is_top()) {
                    return;
                }
            }
        }
        i += 1;
    }
}

/// Returns the index just past the string or character literal starting at `start`.
fn skip_literal(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Splits `text` on `separator` occurrences at nesting depth zero.
///
/// Pieces are trimmed and empty pieces are dropped, so `"int a, "` yields a
/// single element.
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let sep = separator as u8;
    let mut pieces = Vec::new();
    let mut start = 0;
    walk(text, |i, top| {
        if top && text.as_bytes()[i] == sep {
            pieces.push(&text[start..i]);
            start = i + 1;
        }
        true
    });
    pieces.push(&text[start..]);
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Returns the byte index of the first `needle` at nesting depth zero.
///
/// Only single-byte needles that are not themselves brackets are supported.
/// An `=` that belongs to `==`, `!=`, `<=` or `>=` is not reported.
pub fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let bytes = text.as_bytes();
    let target = needle as u8;
    let mut found = None;
    walk(text, |i, top| {
        if top && bytes[i] == target {
            if target == b'=' {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                let compound = matches!(prev, Some(b'=' | b'!' | b'<' | b'>'))
                    || next == Some(b'=');
                if compound {
                    return true;
                }
            }
            found = Some(i);
            return false;
        }
        true
    });
    found
}

/// Returns the index of the bracket that closes the one at `open_index`.
///
/// Works for `()`, `[]`, `{}` and `<>`; literals are skipped.
pub fn find_matching(text: &str, open_index: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let open = *bytes.get(open_index)?;
    let close = match open {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        b'<' => b'>',
        _ => return None,
    };
    let mut depth = 0i32;
    let mut i = open_index;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' || b == b'\'' {
            i = skip_literal(bytes, i);
            continue;
        }
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// If `text` is wrapped in `open`/`close` and the opening bracket's match is
/// the final character, returns the inner text trimmed.
pub fn strip_outer(text: &str, open: char, close: char) -> Option<&str> {
    let trimmed = text.trim();
    if !trimmed.starts_with(open) || !trimmed.ends_with(close) {
        return None;
    }
    let offset = text.len() - text.trim_start().len();
    let end = find_matching(text, offset)?;
    if end == offset + trimmed.len() - 1 {
        Some(trimmed[1..trimmed.len() - 1].trim())
    } else {
        None
    }
}

/// Trims `text` and removes one layer of matching `(`/`)` around it, if any.
pub fn trim_matching(text: &str) -> &str {
    strip_outer(text, '(', ')').unwrap_or_else(|| text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_generic_splits_into_two() {
        let parts = split_top_level("std::map<int, std::vector<int>> m, int x", ',');
        assert_eq!(parts, vec!["std::map<int, std::vector<int>> m", "int x"]);
    }

    #[test]
    fn calls_and_initializer_lists_stay_whole() {
        let parts = split_top_level("f(a, b), {1, 2, 3}, arr[i, j]", ',');
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], "{1, 2, 3}");
    }

    #[test]
    fn string_literals_are_opaque() {
        let parts = split_top_level(r#""a, b", 'c', x"#, ',');
        assert_eq!(parts, vec![r#""a, b""#, "'c'", "x"]);
    }

    #[test]
    fn shift_operator_does_not_close_angles() {
        let parts = split_top_level("a >> 2, b << 1, c", ',');
        assert_eq!(parts, vec!["a >> 2", "b << 1", "c"]);
    }

    #[test]
    fn arrow_is_not_an_angle() {
        let parts = split_top_level("p->x, q->y", ',');
        assert_eq!(parts, vec!["p->x", "q->y"]);
    }

    #[test]
    fn empty_pieces_dropped() {
        assert!(split_top_level("  ", ',').is_empty());
        assert_eq!(split_top_level("int a,", ','), vec!["int a"]);
    }

    #[test]
    fn find_assignment_skips_comparisons() {
        assert_eq!(find_top_level("a == b", '='), None);
        assert_eq!(find_top_level("int x = 5", '='), Some(6));
        assert_eq!(find_top_level("std::vector<int> v = f(a = 1)", '='), Some(19));
    }

    #[test]
    fn matching_brackets() {
        let text = "(a, (b, c)) tail";
        assert_eq!(find_matching(text, 0), Some(10));
        assert_eq!(find_matching(text, 4), Some(9));
        assert_eq!(find_matching("(unterminated", 0), None);
    }

    #[test]
    fn strip_outer_only_when_wrapping() {
        assert_eq!(strip_outer("(a + b)", '(', ')'), Some("a + b"));
        assert_eq!(strip_outer("(a) + (b)", '(', ')'), None);
        assert_eq!(trim_matching("  x  "), "x");
    }
}
