//! Type queries shared by the printers.

use hybrid_common::split_top_level;
use hybrid_ir::{ContainerKind, Ownership, Type, TypeKind};

/// Element type of a container, array or pointer.
pub(crate) fn element_type(ty: &Type) -> Option<Type> {
    match &ty.kind {
        TypeKind::Container { kind, args } => match kind {
            ContainerKind::Map | ContainerKind::UnorderedMap => {
                let key = args.first().cloned()?;
                let value = args.get(1).cloned()?;
                Some(Type::new(
                    format!("std::pair<{}, {}>", key.name, value.name),
                    TypeKind::Container {
                        kind: ContainerKind::Pair,
                        args: vec![key, value],
                    },
                ))
            }
            ContainerKind::String | ContainerKind::StringView => Some(Type::integer("char")),
            _ => args.first().cloned(),
        },
        TypeKind::Array { element, .. } | TypeKind::Pointer { pointee: element, .. } => {
            Some(element.as_ref().clone())
        }
        _ => None,
    }
}

pub(crate) fn is_string_type(ty: &Type) -> bool {
    match &ty.without_reference().kind {
        TypeKind::Container {
            kind: ContainerKind::String | ContainerKind::StringView,
            ..
        } => true,
        TypeKind::Pointer {
            pointee,
            ownership: Ownership::Raw,
        } => pointee.is_const && pointee.name == "char",
        _ => false,
    }
}

pub(crate) fn is_map_type(ty: &Type) -> bool {
    matches!(
        ty.kind,
        TypeKind::Container {
            kind: ContainerKind::Map | ContainerKind::UnorderedMap,
            ..
        }
    )
}

/// The pointed-to type of a pointer, otherwise the type itself.
pub(crate) fn pointee(ty: &Type) -> Type {
    match &ty.kind {
        TypeKind::Pointer { pointee, .. } => pointee.as_ref().clone(),
        _ => ty.clone(),
    }
}

/// Unordered and ordered sets.
pub(crate) fn is_set_type(ty: &Type) -> bool {
    matches!(
        ty.kind,
        TypeKind::Container {
            kind: ContainerKind::Set | ContainerKind::UnorderedSet,
            ..
        }
    )
}

/// `std::vector<std::thread>` and the like.
pub(crate) fn is_thread_collection(ty: &Type) -> bool {
    matches!(&ty.kind, TypeKind::Container { args, .. }
        if args.first().and_then(Type::threading_kind).is_some_and(|k| {
            matches!(k, hybrid_ir::ThreadingKind::Thread | hybrid_ir::ThreadingKind::JThread)
        }))
}

/// `(concept, parameter)` pairs of a `requires` clause of the form
/// `C<T> && D<U>`.
pub(crate) fn requires_constraints(clause: &str) -> Vec<(String, String)> {
    clause
        .split("&&")
        .filter_map(|part| {
            let part = part.trim().trim_start_matches('(').trim_end_matches(')');
            let open = part.find('<')?;
            let close = part.rfind('>')?;
            let concept = part[..open].trim().to_string();
            let param = split_top_level(&part[open + 1..close], ',')
                .first()
                .map(|s| s.trim().to_string())?;
            Some((concept, param))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_elements_are_pairs() {
        let map = hybrid_cpp_parser::resolve_type("std::map<std::string, int>");
        let element = element_type(&map).map(|t| t.name);
        assert_eq!(element.as_deref(), Some("std::pair<std::string, int>"));
        assert!(is_map_type(&map));
        assert!(!is_set_type(&map));
    }

    #[test]
    fn strings_include_const_char_pointers() {
        assert!(is_string_type(&hybrid_cpp_parser::resolve_type("const char*")));
        assert!(is_string_type(&hybrid_cpp_parser::resolve_type("const std::string&")));
        assert!(!is_string_type(&hybrid_cpp_parser::resolve_type("char*")));
    }

    #[test]
    fn thread_vectors() {
        assert!(is_thread_collection(&hybrid_cpp_parser::resolve_type("std::vector<std::thread>")));
        assert!(!is_thread_collection(&hybrid_cpp_parser::resolve_type("std::vector<int>")));
    }

    #[test]
    fn requires_clause_pairs() {
        let pairs = requires_constraints("std::integral<T> && Printable<U>");
        assert_eq!(
            pairs,
            vec![
                ("std::integral".to_string(), "T".to_string()),
                ("Printable".to_string(), "U".to_string()),
            ]
        );
    }
}
