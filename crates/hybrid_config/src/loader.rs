//! Reading and validating `hybrid.toml`.

use crate::error::ConfigError;
use crate::types::HybridConfig;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "hybrid.toml";

/// Loads `<dir>/hybrid.toml`, returning defaults when the file does not exist.
pub fn load_config(dir: &Path) -> Result<HybridConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(HybridConfig::default());
    }
    load_config_file(&path)
}

/// Loads an explicitly named configuration file. A missing file is an error.
pub fn load_config_file(path: &Path) -> Result<HybridConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates configuration text.
pub fn load_config_from_str(content: &str) -> Result<HybridConfig, ConfigError> {
    let config: HybridConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &HybridConfig) -> Result<(), ConfigError> {
    if config.transpile.opt_level > 3 {
        return Err(ConfigError::ValidationError(format!(
            "transpile.opt_level must be between 0 and 3, got {}",
            config.transpile.opt_level
        )));
    }
    let lib = &config.ffi.library;
    if lib.is_empty() || !lib.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::ValidationError(format!(
            "ffi.library must be a non-empty identifier, got '{lib}'"
        )));
    }
    if matches!(config.transpile.output_dir.as_deref(), Some("")) {
        return Err(ConfigError::ValidationError(
            "transpile.output_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FfiTarget, Target};

    #[test]
    fn empty_file_is_default() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg, HybridConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let text = r#"
[transpile]
target = "go"
opt_level = 0
safety_checks = false
preserve_comments = false
generate_tests = true
output_dir = "gen"

[ffi]
library = "calc"
target = "rust"
"#;
        let cfg = load_config_from_str(text).unwrap();
        assert_eq!(cfg.transpile.target, Target::Go);
        assert_eq!(cfg.transpile.opt_level, 0);
        assert!(!cfg.transpile.safety_checks);
        assert!(cfg.transpile.generate_tests);
        assert_eq!(cfg.transpile.output_dir.as_deref(), Some("gen"));
        assert_eq!(cfg.ffi.library, "calc");
        assert_eq!(cfg.ffi.target, FfiTarget::Rust);
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let cfg = load_config_from_str("[transpile]\nopt_level = 2\n").unwrap();
        assert_eq!(cfg.transpile.opt_level, 2);
        assert_eq!(cfg.transpile.target, Target::Rust);
        assert!(cfg.transpile.safety_checks);
    }

    #[test]
    fn opt_level_out_of_range() {
        let err = load_config_from_str("[transpile]\nopt_level = 7\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unknown_target_is_parse_error() {
        let err = load_config_from_str("[transpile]\ntarget = \"java\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn bad_library_name() {
        let err = load_config_from_str("[ffi]\nlibrary = \"my lib\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unknown_key_rejected() {
        let err = load_config_from_str("[transpile]\nfrobnicate = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_file_in_dir_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg, HybridConfig::default());
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[transpile]\ntarget = \"go\"\n",
        )
        .unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.transpile.target, Target::Go);
    }
}
