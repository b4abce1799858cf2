//! Identifier case conversion.
//!
//! C++ code mixes `camelCase`, `PascalCase`, `snake_case` and acronyms
//! (`HTTPServer`). The converters split an identifier into words first and
//! then join the words in the requested style, so every style converts to
//! every other.

/// Splits an identifier into lowercase words.
///
/// Word boundaries are underscores, a lowercase-to-uppercase transition, a
/// letter-to-digit transition kept attached (`vec3` stays one word), and the
/// end of an acronym (`HTTPServer` → `http`, `server`).
fn words(ident: &str) -> Vec<String> {
    let chars: Vec<char> = ident.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Converts an identifier to `snake_case`.
///
/// ```
/// assert_eq!(hybrid_common::to_snake_case("getValue"), "get_value");
/// assert_eq!(hybrid_common::to_snake_case("HTTPServer"), "http_server");
/// ```
pub fn to_snake_case(ident: &str) -> String {
    let leading = ident.len() - ident.trim_start_matches('_').len();
    let mut out = "_".repeat(leading);
    out.push_str(&words(ident).join("_"));
    out
}

/// Converts an identifier to `PascalCase`.
pub fn to_pascal_case(ident: &str) -> String {
    words(ident).iter().map(|w| capitalize(w)).collect()
}

/// Converts an identifier to `camelCase`.
pub fn to_camel_case(ident: &str) -> String {
    let mut out = String::new();
    for (i, w) in words(ident).iter().enumerate() {
        if i == 0 {
            out.push_str(w);
        } else {
            out.push_str(&capitalize(w));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_from_camel() {
        assert_eq!(to_snake_case("getValue"), "get_value");
        assert_eq!(to_snake_case("distance"), "distance");
        assert_eq!(to_snake_case("m_count"), "m_count");
    }

    #[test]
    fn snake_from_acronym() {
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("parseURL"), "parse_url");
    }

    #[test]
    fn snake_keeps_leading_underscore() {
        assert_eq!(to_snake_case("_hidden"), "_hidden");
    }

    #[test]
    fn pascal_conversions() {
        assert_eq!(to_pascal_case("distance"), "Distance");
        assert_eq!(to_pascal_case("get_value"), "GetValue");
        assert_eq!(to_pascal_case("isEmpty"), "IsEmpty");
    }

    #[test]
    fn camel_conversions() {
        assert_eq!(to_camel_case("GetValue"), "getValue");
        assert_eq!(to_camel_case("item_count"), "itemCount");
        assert_eq!(to_camel_case("x"), "x");
    }

    #[test]
    fn digits_stay_attached() {
        assert_eq!(to_snake_case("vec3Length"), "vec3_length");
        assert_eq!(to_pascal_case("vec3_length"), "Vec3Length");
    }
}
