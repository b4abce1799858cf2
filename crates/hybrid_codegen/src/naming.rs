//! Identifier spelling for both targets.

use hybrid_common::{to_camel_case, to_pascal_case, to_snake_case};
use hybrid_ir::AccessLevel;

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "yield",
];

const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var",
];

/// A Rust value identifier: `snake_case`, keywords raw-escaped.
pub(crate) fn rust_ident(name: &str) -> String {
    let snake = to_snake_case(name);
    match snake.as_str() {
        "self" | "super" | "crate" => format!("{snake}_"),
        s if RUST_KEYWORDS.contains(&s) => format!("r#{s}"),
        _ => snake,
    }
}

/// A Rust `SCREAMING_SNAKE_CASE` constant name.
pub(crate) fn rust_const(name: &str) -> String {
    to_snake_case(name).to_uppercase()
}

/// A Go local or unexported identifier: `lowerCamel`, keywords suffixed.
pub(crate) fn go_local(name: &str) -> String {
    let camel = to_camel_case(name);
    let camel = if camel.is_empty() { "v".to_string() } else { camel };
    if GO_KEYWORDS.contains(&camel.as_str()) {
        format!("{camel}_")
    } else {
        camel
    }
}

/// A Go member name: exported `PascalCase` for public members.
pub(crate) fn go_member(name: &str, access: AccessLevel) -> String {
    match access {
        AccessLevel::Public => to_pascal_case(name),
        _ => go_local(name),
    }
}

/// Named methods standing in for overloaded operators.
pub(crate) fn operator_method(name: &str) -> Option<&'static str> {
    let rest = name.strip_prefix("operator")?;
    if rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some(match rest.trim() {
        "+" => "add",
        "-" => "sub",
        "*" => "mul",
        "/" => "div",
        "%" => "rem",
        "==" => "equals",
        "!=" => "not_equals",
        "<" => "less_than",
        ">" => "greater_than",
        "<=" => "less_equal",
        ">=" => "greater_equal",
        "[]" => "at",
        "()" => "call",
        "<<" => "shift_left",
        ">>" => "shift_right",
        "=" => "assign",
        "+=" => "add_assign",
        "-=" => "sub_assign",
        "*=" => "mul_assign",
        "/=" => "div_assign",
        "++" => "increment",
        "--" => "decrement",
        "!" => "not",
        "bool" => "to_bool",
        _ => "op",
    })
}

/// The unqualified, unspecialized part of a C++ name.
pub(crate) fn simple_name(name: &str) -> &str {
    let name = name.split('<').next().unwrap_or(name).trim();
    name.rsplit("::").next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_identifiers() {
        assert_eq!(rust_ident("getValue"), "get_value");
        assert_eq!(rust_ident("type"), "r#type");
        assert_eq!(rust_ident("self"), "self_");
        assert_eq!(rust_const("maxSize"), "MAX_SIZE");
    }

    #[test]
    fn go_identifiers() {
        assert_eq!(go_member("distance", AccessLevel::Public), "Distance");
        assert_eq!(go_member("count", AccessLevel::Private), "count");
        assert_eq!(go_local("range"), "range_");
        assert_eq!(go_local("item_count"), "itemCount");
    }

    #[test]
    fn operators_get_method_names() {
        assert_eq!(operator_method("operator+"), Some("add"));
        assert_eq!(operator_method("operator bool"), Some("to_bool"));
        assert_eq!(operator_method("area"), None);
        assert_eq!(operator_method("operational"), None);
        assert_eq!(simple_name("ns::Box<int>"), "Box");
    }
}
