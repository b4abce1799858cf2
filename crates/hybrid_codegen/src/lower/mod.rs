//! Statement-level model of C++ function bodies.
//!
//! Bodies arrive in the IR as raw text. Both printers need the same view of
//! them, so the text is parsed once into a small statement and expression
//! tree ([`ast`]) that each target walks. The parser is tolerant: a
//! statement it cannot read becomes [`Stmt::Unsupported`] holding the
//! original text, and the printers turn that into a marked placeholder.

pub mod ast;
mod cursor;
pub mod exceptions;
mod parse;
pub mod scope;

pub use ast::{BinOp, Case, Decl, Expr, Handler, IncDec, Init, Lambda, Stmt, UnaryOp};
pub use parse::{parse_body, parse_expression};
pub use scope::Locals;
