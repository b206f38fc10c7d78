//! Configuration module for the delivery tally service.
//!
//! The service is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! type = "sqlite"
//! path = "${DATA_DIR}/parcel-tally.db"
//!
//! [retention]
//! enabled = true
//! retain_months = 6
//! ```

mod database;
mod observability;
mod retention;
mod server;

use std::path::Path;

pub use database::*;
pub use observability::*;
pub use retention::*;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration.
///
/// Every section is optional with sensible defaults, so an empty file is a
/// valid (database-less) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration for persistent storage.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Retention policy for delivery stats and scan records.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Observability configuration (logging, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: AppConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.retention.validate()?;

        if self.retention.enabled && self.database.is_none() {
            return Err(ConfigError::Validation(
                "retention.enabled requires a [database] section".into(),
            ));
        }

        Ok(())
    }

    /// The configuration written by `parcel-tally init`.
    pub fn default_toml() -> &'static str {
        DEFAULT_CONFIG
    }
}

const DEFAULT_CONFIG: &str = r#"# parcel-tally configuration

[server]
host = "0.0.0.0"
port = 8080

[database]
type = "sqlite"
path = "parcel-tally.db"

[retention]
enabled = true
interval_hours = 24
retain_months = 6
batch_size = 100
dry_run = false

[observability.logging]
level = "info"
format = "compact"
"#;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

pub(crate) fn default_true() -> bool {
    true
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables after a `#` on the same line are left alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    static ENV_VAR: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid")
    });

    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in ENV_VAR.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);

            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_str("").unwrap();
        assert!(config.database.is_none());
        assert!(!config.retention.enabled);
        assert_eq!(config.retention.retain_months, 6);
        assert_eq!(config.retention.batch_size, 100);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_default_toml_parses() {
        let config = AppConfig::from_str(AppConfig::default_toml()).unwrap();
        assert!(config.retention.enabled);
        match config.database {
            DatabaseConfig::Sqlite(ref sqlite) => assert_eq!(sqlite.path, "parcel-tally.db"),
            DatabaseConfig::None => panic!("default config should use sqlite"),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = AppConfig::from_str(
            r#"
            [server]
            prot = 9000
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_retention_requires_database() {
        let err = AppConfig::from_str(
            r#"
            [retention]
            enabled = true
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("TEST_TALLY_DB_PATH", Some("/var/lib/tally.db"), || {
            let config = AppConfig::from_str(
                r#"
                [database]
                type = "sqlite"
                path = "${TEST_TALLY_DB_PATH}"
            "#,
            )
            .unwrap();
            match config.database {
                DatabaseConfig::Sqlite(sqlite) => assert_eq!(sqlite.path, "/var/lib/tally.db"),
                DatabaseConfig::None => panic!("expected sqlite"),
            }
        });
    }

    #[test]
    fn test_missing_env_var_is_error() {
        temp_env::with_var_unset("TEST_TALLY_MISSING", || {
            let err = expand_env_vars("path = \"${TEST_TALLY_MISSING}\"").unwrap_err();
            assert!(matches!(err, ConfigError::EnvVarNotFound(ref name) if name == "TEST_TALLY_MISSING"));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("key = \"value\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "key = \"value\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_with_comments() {
        temp_env::with_var("TEST_TALLY_MULTI", Some("value1"), || {
            let input = "key1 = \"${TEST_TALLY_MULTI}\"\n# key2 = \"${NONEXISTENT}\"\nkey3 = 1\n";
            let result = expand_env_vars(input).unwrap();
            assert_eq!(
                result,
                "key1 = \"value1\"\n# key2 = \"${NONEXISTENT}\"\nkey3 = 1\n"
            );
        });
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [retention]
            interval_hours = 6
            retain_months = 3
            "#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.retention.interval_hours, 6);
        assert_eq!(config.retention.retain_months, 3);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
