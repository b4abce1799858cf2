//! Diagnostic severity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is. Variants are ordered least to most severe.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Extra context attached to another problem.
    Note,
    /// Output was produced but some input was skipped or approximated.
    Warning,
    /// The invocation fails.
    Error,
}

impl Severity {
    /// True for [`Severity::Error`].
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn display_and_serde_agree() {
        for sev in [Severity::Note, Severity::Warning, Severity::Error] {
            let json = serde_json::to_string(&sev).unwrap();
            assert_eq!(json, format!("\"{sev}\""));
        }
        assert!(Severity::Error.is_error());
        assert!(!Severity::Warning.is_error());
    }
}
