//! Data retention configuration.
//!
//! Records in the retention-managed collections are purged once they are
//! older than the first day of the month `retain_months` months ago.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//! interval_hours = 24
//! retain_months = 6
//! batch_size = 100
//! dry_run = false
//! collections = ["delivery_stats", "scan_records"]
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::db::Collection;

/// Data retention configuration.
///
/// When enabled, a background worker periodically deletes records older than
/// the retention cutoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Whether the background retention worker runs.
    /// Default: false (must be explicitly enabled). Manual cleanup via the
    /// CLI or the `cleanupData` function works regardless.
    #[serde(default)]
    pub enabled: bool,

    /// How often to run the retention worker (in hours).
    /// Default: 24 (once per day)
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Number of whole calendar months to keep.
    /// Default: 6
    #[serde(default = "default_retain_months")]
    pub retain_months: u32,

    /// Number of deletions issued concurrently per batch.
    /// Default: 100
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// If true, log what would be deleted without actually deleting.
    #[serde(default)]
    pub dry_run: bool,

    /// Collections to purge, in order.
    #[serde(default = "default_collections")]
    pub collections: Vec<Collection>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            retain_months: default_retain_months(),
            batch_size: default_batch_size(),
            dry_run: false,
            collections: default_collections(),
        }
    }
}

fn default_interval_hours() -> u64 {
    24
}

fn default_retain_months() -> u32 {
    6
}

fn default_batch_size() -> usize {
    100
}

fn default_collections() -> Vec<Collection> {
    Collection::ALL.to_vec()
}

impl RetentionConfig {
    /// Get the interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_hours * 3600)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_hours == 0 {
            return Err(ConfigError::Validation(
                "retention.interval_hours must be greater than 0".into(),
            ));
        }
        if self.retain_months == 0 {
            return Err(ConfigError::Validation(
                "retention.retain_months must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation(
                "retention.batch_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetentionConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.interval(), std::time::Duration::from_secs(24 * 3600));
        assert_eq!(config.retain_months, 6);
        assert_eq!(config.batch_size, 100);
        assert_eq!(
            config.collections,
            vec![Collection::DeliveryStats, Collection::ScanRecords]
        );
    }

    #[test]
    fn test_parse_collections_subset() {
        let config: RetentionConfig = toml::from_str(
            r#"
            enabled = true
            collections = ["scan_records"]
        "#,
        )
        .unwrap();
        assert_eq!(config.collections, vec![Collection::ScanRecords]);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = RetentionConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unknown_collection_rejected() {
        let result: Result<RetentionConfig, _> = toml::from_str(r#"collections = ["users"]"#);
        assert!(result.is_err());
    }
}
