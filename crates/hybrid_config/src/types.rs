//! Configuration types deserialized from `hybrid.toml`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HybridConfig {
    /// Settings for `hybrid transpile`.
    #[serde(default)]
    pub transpile: TranspileConfig,
    /// Settings for `hybrid ffi`.
    #[serde(default)]
    pub ffi: FfiConfig,
}

/// Output language of the translating generators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Rust source (`.rs`).
    #[default]
    Rust,
    /// Go source (`.go`).
    Go,
}

impl Target {
    /// Registry name of the generator for this target.
    pub fn name(self) -> &'static str {
        match self {
            Target::Rust => "rust",
            Target::Go => "go",
        }
    }

    /// File extension of generated files, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Target::Rust => "rs",
            Target::Go => "go",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Target::Rust),
            "go" | "golang" => Ok(Target::Go),
            other => Err(ConfigError::UnknownTarget(other.to_string())),
        }
    }
}

/// Output flavor of the FFI binding generators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FfiTarget {
    /// `extern "C"` wrapper header and implementation.
    #[default]
    CWrapper,
    /// Rust `extern "C"` declarations plus safe wrappers.
    Rust,
    /// Go cgo bindings.
    Go,
}

impl FfiTarget {
    /// Command-line spelling.
    pub fn name(self) -> &'static str {
        match self {
            FfiTarget::CWrapper => "c-wrapper",
            FfiTarget::Rust => "rust",
            FfiTarget::Go => "go",
        }
    }
}

impl fmt::Display for FfiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FfiTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c-wrapper" | "c" | "cwrapper" => Ok(FfiTarget::CWrapper),
            "rust" => Ok(FfiTarget::Rust),
            "go" => Ok(FfiTarget::Go),
            other => Err(ConfigError::UnknownTarget(other.to_string())),
        }
    }
}

/// `[transpile]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranspileConfig {
    /// Default output language.
    pub target: Target,
    /// Commentary level, 0 (verbose) to 3 (none).
    pub opt_level: u8,
    /// Emit `// SAFETY:` notes around raw pointers.
    pub safety_checks: bool,
    /// Echo the original C++ text inside untranslated placeholders.
    pub preserve_comments: bool,
    /// Emit test scaffolding.
    pub generate_tests: bool,
    /// Directory for generated files; next to the input when absent.
    pub output_dir: Option<String>,
}

impl Default for TranspileConfig {
    fn default() -> Self {
        Self {
            target: Target::Rust,
            opt_level: 1,
            safety_checks: true,
            preserve_comments: true,
            generate_tests: false,
            output_dir: None,
        }
    }
}

/// `[ffi]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FfiConfig {
    /// Native library name used in `#[link]` and cgo `LDFLAGS`.
    pub library: String,
    /// Default binding flavor.
    pub target: FfiTarget,
}

impl Default for FfiConfig {
    fn default() -> Self {
        Self {
            library: "native".to_string(),
            target: FfiTarget::CWrapper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parsing() {
        assert_eq!("rust".parse::<Target>().unwrap(), Target::Rust);
        assert_eq!("Go".parse::<Target>().unwrap(), Target::Go);
        assert!(matches!(
            "java".parse::<Target>(),
            Err(ConfigError::UnknownTarget(t)) if t == "java"
        ));
    }

    #[test]
    fn target_extensions() {
        assert_eq!(Target::Rust.extension(), "rs");
        assert_eq!(Target::Go.extension(), "go");
        assert_eq!(Target::Go.to_string(), "go");
    }

    #[test]
    fn ffi_target_parsing() {
        assert_eq!("c-wrapper".parse::<FfiTarget>().unwrap(), FfiTarget::CWrapper);
        assert_eq!("rust".parse::<FfiTarget>().unwrap(), FfiTarget::Rust);
        assert_eq!(FfiTarget::CWrapper.to_string(), "c-wrapper");
        assert!("python".parse::<FfiTarget>().is_err());
    }

    #[test]
    fn defaults() {
        let cfg = HybridConfig::default();
        assert_eq!(cfg.transpile.target, Target::Rust);
        assert_eq!(cfg.transpile.opt_level, 1);
        assert!(cfg.transpile.safety_checks);
        assert!(!cfg.transpile.generate_tests);
        assert_eq!(cfg.ffi.library, "native");
    }
}
