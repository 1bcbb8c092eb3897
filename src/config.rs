use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::inject::FieldPrefix;

pub const CONFIG_FILE: &str = "provenance.toml";

/// Configuration loaded from `provenance.toml` at the analyzed root.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ProvenanceConfig {
    /// Additional path patterns to exclude (beyond .gitignore, `bin/` and `obj/`).
    pub exclude: Option<Vec<String>>,
    pub naming: NamingConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct NamingConfig {
    /// Backing-field convention used when the synthesizer adds a field.
    pub field_prefix: FieldPrefix,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Also report creations inside ordinary instance methods.
    pub include_methods: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_methods: true,
        }
    }
}

impl ProvenanceConfig {
    /// Load configuration from `provenance.toml` in the given root directory.
    ///
    /// Returns the default configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ProvenanceConfig::load(dir.path());
        assert!(config.exclude.is_none());
        assert_eq!(config.naming.field_prefix, FieldPrefix::Auto);
        assert!(config.scan.include_methods);
    }

    #[test]
    fn test_loads_all_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
exclude = ["*.g.cs"]

[naming]
field_prefix = "underscore"

[scan]
include_methods = false
"#,
        )
        .unwrap();
        let config = ProvenanceConfig::load(dir.path());
        assert_eq!(config.exclude, Some(vec!["*.g.cs".to_string()]));
        assert_eq!(config.naming.field_prefix, FieldPrefix::Underscore);
        assert!(!config.scan.include_methods);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(CONFIG_FILE), "exclude = 5").unwrap();
        let config = ProvenanceConfig::load(dir.path());
        assert!(config.exclude.is_none());
    }
}
