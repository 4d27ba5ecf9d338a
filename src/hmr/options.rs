//! Hot reload configuration
//!
//! Options are read from JSON (camelCase keys) and applied with a shallow
//! merge: every top-level key present in the overrides replaces the current
//! value wholesale, absent keys keep theirs.

use serde::{Deserialize, Serialize};

use super::eligibility::{Eligibility, DEFAULT_EXCLUDE};
use crate::error::{Error, Result};

/// Process-wide hot reload options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotOptions {
    /// Suppress change/reload log lines
    pub silent: bool,
    /// Patch exported classes after every eligible module load
    pub patch_exports: bool,
    /// Regex patterns of paths excluded from tracking
    pub exclude: Vec<String>,
}

impl Default for HotOptions {
    fn default() -> Self {
        Self {
            silent: false,
            patch_exports: false,
            exclude: vec![DEFAULT_EXCLUDE.to_string()],
        }
    }
}

impl HotOptions {
    /// Parse options from a JSON document; missing keys take defaults
    pub fn load(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("failed to parse hot reload options: {}", e)))
    }

    /// Shallow-merge a JSON object of overrides into these options
    pub fn merge(&self, overrides: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(overrides) = overrides else {
            return Err(Error::ConfigError(
                "hot reload options must be a JSON object".to_string(),
            ));
        };
        let mut current = serde_json::to_value(self)
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        if let serde_json::Value::Object(map) = &mut current {
            for (key, value) in overrides {
                map.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(current)
            .map_err(|e| Error::ConfigError(format!("invalid hot reload options: {}", e)))
    }

    /// Compile the exclude patterns into an eligibility filter
    pub fn eligibility(&self) -> Result<Eligibility> {
        Eligibility::new(&self.exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = HotOptions::default();
        assert!(!options.silent);
        assert!(!options.patch_exports);
        assert_eq!(options.exclude, vec![DEFAULT_EXCLUDE.to_string()]);
    }

    #[test]
    fn test_load_camel_case_with_defaults() {
        let options = HotOptions::load(r#"{ "patchExports": true }"#).unwrap();
        assert!(options.patch_exports);
        assert!(!options.silent);
        assert_eq!(options.exclude, vec![DEFAULT_EXCLUDE.to_string()]);
    }

    #[test]
    fn test_merge_is_shallow() {
        let base = HotOptions::default();
        let merged = base
            .merge(&json!({ "silent": true, "exclude": ["/generated/"] }))
            .unwrap();
        assert!(merged.silent);
        assert!(!merged.patch_exports);
        // exclude is replaced, not appended to
        assert_eq!(merged.exclude, vec!["/generated/".to_string()]);
    }

    #[test]
    fn test_merge_rejects_non_object() {
        let err = HotOptions::default().merge(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_merge_rejects_wrong_types() {
        let err = HotOptions::default().merge(&json!({ "silent": "yes" })).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_load_invalid_json() {
        assert!(HotOptions::load("{").is_err());
    }
}
