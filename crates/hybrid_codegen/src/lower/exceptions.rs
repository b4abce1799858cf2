//! Standard exception classes and the handlers that catch them.
//!
//! A thrown `std::runtime_error` (or a bare message) travels as a plain
//! error carrying only its text. Any other class travels with its name as
//! a kind, so a `try` with several handlers can pick the right one.

const RUNTIME_ERRORS: &[&str] = &[
    "runtime_error",
    "range_error",
    "overflow_error",
    "underflow_error",
    "system_error",
];

const LOGIC_ERRORS: &[&str] = &[
    "logic_error",
    "invalid_argument",
    "domain_error",
    "length_error",
    "out_of_range",
];

/// Kind assumed for an error that carries no kind of its own.
pub const UNTYPED_KIND: &str = "runtime_error";

fn short(class: &str) -> &str {
    class.rsplit("::").next().unwrap_or(class)
}

/// The kind a `throw` of `class` records, or `None` when the error can
/// travel as a plain message.
pub fn thrown_kind(class: &str) -> Option<&str> {
    match short(class) {
        "runtime_error" | "exception" | "string" => None,
        kind => Some(kind),
    }
}

/// The kinds a handler for `ty` catches, or `None` when it catches every
/// error (`catch (...)` and `catch (std::exception&)`).
pub fn caught_kinds(ty: Option<&str>) -> Option<Vec<String>> {
    let kind = short(ty?);
    let family: &[&str] = match kind {
        "exception" => return None,
        "runtime_error" => RUNTIME_ERRORS,
        "logic_error" => LOGIC_ERRORS,
        _ => &[],
    };
    if family.is_empty() {
        Some(vec![kind.to_string()])
    } else {
        Some(family.iter().map(|k| k.to_string()).collect())
    }
}

/// True if some handler in the list catches only part of the errors, so
/// the handlers need a dispatch on the error kind.
pub fn needs_dispatch<'a>(types: impl IntoIterator<Item = Option<&'a str>>) -> bool {
    types.into_iter().any(|ty| caught_kinds(ty).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_errors_stay_plain() {
        assert_eq!(thrown_kind("std::runtime_error"), None);
        assert_eq!(thrown_kind("std::invalid_argument"), Some("invalid_argument"));
        assert_eq!(thrown_kind("ParseError"), Some("ParseError"));
    }

    #[test]
    fn family_handlers_cover_derived_kinds() {
        let logic = caught_kinds(Some("std::logic_error")).unwrap_or_default();
        assert!(logic.iter().any(|k| k == "out_of_range"));
        let runtime = caught_kinds(Some("std::runtime_error")).unwrap_or_default();
        assert!(runtime.iter().any(|k| k == UNTYPED_KIND));
        assert_eq!(caught_kinds(Some("std::exception")), None);
        assert_eq!(caught_kinds(None), None);
    }

    #[test]
    fn catch_all_handlers_need_no_dispatch() {
        assert!(!needs_dispatch([Some("std::exception"), None]));
        assert!(needs_dispatch([Some("std::invalid_argument"), Some("std::exception")]));
    }
}
