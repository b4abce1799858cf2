//! Loading of the optional `hybrid.toml` configuration file.
//!
//! The file supplies defaults for the `transpile` and `ffi` subcommands.
//! Every value can be overridden on the command line, and a missing file is
//! equivalent to an empty one.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
