//! Shared foundational helpers used across the hybrid transpiler.
//!
//! This crate provides the internal error type, the depth-aware list splitter
//! shared by the parser and every feature analyzer, and identifier case
//! conversion used by the code generators.

#![warn(missing_docs)]

pub mod naming;
pub mod result;
pub mod split;

pub use naming::{to_camel_case, to_pascal_case, to_snake_case};
pub use result::{HybridResult, InternalError};
pub use split::{find_matching, find_top_level, split_top_level, strip_outer, trim_matching};
