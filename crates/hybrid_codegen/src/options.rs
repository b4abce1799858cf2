//! Options that shape generated code without changing its meaning.

use hybrid_config::TranspileConfig;
use serde::{Deserialize, Serialize};

/// How much commentary a generator writes around items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commentary {
    /// File banner, an origin comment and a doc comment per item.
    Verbose,
    /// A doc comment per item naming its C++ origin.
    Doc,
    /// No generated comments.
    Silent,
}

/// Generation options.
///
/// `opt_level` is advisory: it only changes commentary (and, at 3, adds
/// `#[inline]` to one-statement Rust methods). Every level produces the
/// same program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenOptions {
    /// Commentary level, 0 (verbose) to 3 (none).
    pub opt_level: u8,
    /// Emit `// SAFETY:` notes where raw pointers are dereferenced.
    pub safety_comments: bool,
    /// Echo the original C++ text inside untranslated placeholders.
    pub preserve_comments: bool,
    /// Emit a test scaffold alongside the translation.
    pub generate_tests: bool,
    /// Go package name.
    pub package: String,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            opt_level: 1,
            safety_comments: true,
            preserve_comments: true,
            generate_tests: false,
            package: "main".to_string(),
        }
    }
}

impl GenOptions {
    /// Options taken from the `[transpile]` section of `hybrid.toml`.
    pub fn from_config(config: &TranspileConfig) -> Self {
        Self {
            opt_level: config.opt_level.min(3),
            safety_comments: config.safety_checks,
            preserve_comments: config.preserve_comments,
            generate_tests: config.generate_tests,
            ..Self::default()
        }
    }

    /// The commentary level implied by `opt_level`.
    pub fn commentary(&self) -> Commentary {
        match self.opt_level {
            0 => Commentary::Verbose,
            1 => Commentary::Doc,
            _ => Commentary::Silent,
        }
    }

    /// True when one-statement Rust methods get `#[inline]`.
    pub fn inline_small_methods(&self) -> bool {
        self.opt_level >= 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_commentary() {
        let mut opts = GenOptions::default();
        assert_eq!(opts.commentary(), Commentary::Doc);
        opts.opt_level = 0;
        assert_eq!(opts.commentary(), Commentary::Verbose);
        opts.opt_level = 2;
        assert_eq!(opts.commentary(), Commentary::Silent);
        assert!(!opts.inline_small_methods());
        opts.opt_level = 3;
        assert!(opts.inline_small_methods());
    }

    #[test]
    fn from_config_copies_flags() {
        let config = TranspileConfig {
            opt_level: 2,
            safety_checks: false,
            preserve_comments: false,
            generate_tests: true,
            ..TranspileConfig::default()
        };
        let opts = GenOptions::from_config(&config);
        assert_eq!(opts.opt_level, 2);
        assert!(!opts.safety_comments);
        assert!(!opts.preserve_comments);
        assert!(opts.generate_tests);
        assert_eq!(opts.package, "main");
    }
}
