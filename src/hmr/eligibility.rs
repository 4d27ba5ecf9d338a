//! Path eligibility for hot reload tracking

use regex::Regex;

use crate::error::{Error, Result};

/// Exclude pattern applied when no configuration is given
pub const DEFAULT_EXCLUDE: &str = r"[/\\]node_modules[/\\]";

/// Decides whether a resolved module path participates in hot reload
#[derive(Debug, Clone)]
pub struct Eligibility {
    exclude: Vec<Regex>,
}

impl Eligibility {
    /// Compile the given exclude patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let exclude = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    Error::ConfigError(format!("invalid exclude pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { exclude })
    }

    /// Whether `path` should be tracked
    pub fn is_eligible(&self, path: &str) -> bool {
        !self.exclude.iter().any(|re| re.is_match(path))
    }
}

impl Default for Eligibility {
    fn default() -> Self {
        Self {
            exclude: vec![Regex::new(DEFAULT_EXCLUDE).expect("default exclude pattern is valid")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_vendor_directory() {
        let filter = Eligibility::default();
        assert!(filter.is_eligible("/app/src/main.js"));
        assert!(!filter.is_eligible("/app/node_modules/lodash/index.js"));
    }

    #[test]
    fn test_custom_patterns() {
        let filter = Eligibility::new(&[r"\.generated\.js$", "/vendor/"]).unwrap();
        assert!(!filter.is_eligible("/app/schema.generated.js"));
        assert!(!filter.is_eligible("/app/vendor/x.js"));
        assert!(filter.is_eligible("/app/node_modules/x/index.js"));
    }

    #[test]
    fn test_empty_patterns_accept_everything() {
        let filter = Eligibility::new::<&str>(&[]).unwrap();
        assert!(filter.is_eligible("/anything"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = Eligibility::new(&["("]).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
