use std::path::Path;

use opgraph_types::{ImportToken, DEFAULT_TOKEN_FORMAT};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default marker placed between a conflicting name and the import token.
pub const DEFAULT_CONFLICT_MARKER: &str = "_ImportConflict_";

/// Configuration for an import session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Inserted between a conflicting name and the import token.
    pub conflict_marker: String,
    /// `chrono` format used to mint the per-import token.
    pub token_format: String,
    /// Pre-flight every kind and refuse to mutate when any issue is found.
    pub validate_before_import: bool,
    /// Restore the whole project when any kind fails, not just that kind.
    pub atomic_session: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            conflict_marker: DEFAULT_CONFLICT_MARKER.to_string(),
            token_format: DEFAULT_TOKEN_FORMAT.to_string(),
            validate_before_import: true,
            atomic_session: false,
        }
    }
}

impl ImportConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conflict_marker.is_empty() {
            return Err(ConfigError::Invalid("conflict_marker is empty".into()));
        }
        if self.conflict_marker.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "conflict_marker `{}` contains a path separator",
                self.conflict_marker
            )));
        }
        self.mint_token()?;
        Ok(())
    }

    /// Mint a token for a new import from the current time.
    pub fn mint_token(&self) -> Result<ImportToken, ConfigError> {
        ImportToken::now(&self.token_format)
            .map_err(|e| ConfigError::Invalid(format!("token_format: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ImportConfig::default();
        assert_eq!(config.conflict_marker, "_ImportConflict_");
        assert_eq!(config.token_format, "%Y%m%d%H%M%S%3f");
        assert!(config.validate_before_import);
        assert!(!config.atomic_session);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ImportConfig::from_toml_str("atomic_session = true\n").unwrap();
        assert!(config.atomic_session);
        assert_eq!(config.conflict_marker, DEFAULT_CONFLICT_MARKER);
    }

    #[test]
    fn rejects_bad_marker() {
        assert!(matches!(
            ImportConfig::from_toml_str("conflict_marker = \"\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ImportConfig::from_toml_str("conflict_marker = \"a/b\"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_bad_token_format() {
        assert!(matches!(
            ImportConfig::from_toml_str("token_format = \"%Y/%m\"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unparseable_toml() {
        assert!(matches!(
            ImportConfig::from_toml_str("atomic_session = \"maybe\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.toml");
        std::fs::write(&path, "validate_before_import = false\n").unwrap();
        let config = ImportConfig::load(&path).unwrap();
        assert!(!config.validate_before_import);
        assert!(matches!(
            ImportConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
