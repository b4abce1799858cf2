//! Translation-unit text storage and source locations.
//!
//! Every C++ input handed to the transpiler is registered in a [`SourceDb`]
//! and receives a [`FileId`]. The lexer attaches [`Span`]s to its tokens and
//! the parser copies them onto declarations, so diagnostics can point back at
//! the exact `line:column` through [`SourceDb::locate`].

#![warn(missing_docs)]

pub mod source_db;
pub mod span;
pub mod unit;

pub use source_db::{Location, SourceDb};
pub use span::{FileId, Span};
pub use unit::SourceUnit;
