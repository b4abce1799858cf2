//! The language-neutral intermediate representation of a C++ translation unit.
//!
//! The structural parser fills an [`Ir`] with [`ClassDecl`]s, free
//! [`Function`]s, globals and enums. The feature analyzers then attach
//! exception, template, threading and coroutine records to the functions and
//! classes they describe, and exactly one code generator reads the result.
//!
//! Type spelling and the C/Rust/Go token tables live in [`type_map`].

#![warn(missing_docs)]

pub mod decl;
pub mod features;
pub mod ir;
pub mod type_map;
pub mod types;

pub use decl::{
    AccessLevel, AccessSection, BaseClass, ClassDecl, EnumDecl, Function, MemberInit, Parameter,
    Variable,
};
pub use features::*;
pub use ir::Ir;
pub use types::{
    AsyncKind, ContainerKind, Ownership, ThreadingKind, Type, TypeKind, TypeRegistry,
};
