/// Engine configuration: catalog client and migration settings
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Base URL for the UT course schedule.
pub const CATALOG_BASE_URL: &str = "https://utdirect.utexas.edu/apps/registrar/course_schedule";

/// Name of the schedule a v1 migration writes into.
pub const MIGRATION_SCHEDULE_NAME: &str = "UTRP v1 Migration";

/// Top-level configuration file layout.
///
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub catalog: CatalogConfig,
    pub migration: MigrationConfig,
}

/// Configuration for the catalog HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// How long fetched pages stay cached
    pub cache_ttl_secs: u64,
    /// Consecutive failures before the circuit breaker opens
    pub breaker_threshold: u32,
    pub breaker_recovery_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: CATALOG_BASE_URL.to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            cache_ttl_secs: 5 * 60,
            breaker_threshold: 5,
            breaker_recovery_secs: 30,
        }
    }
}

impl CatalogConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn breaker_recovery(&self) -> Duration {
        Duration::from_secs(self.breaker_recovery_secs)
    }
}

/// Configuration for migration runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub schedule_name: String,
    /// Upper bound on in-flight catalog fetches
    pub max_concurrency: usize,
    /// Per-link fetch deadline, independent of the HTTP client's own timeout
    pub link_timeout_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            schedule_name: MIGRATION_SCHEDULE_NAME.to_string(),
            max_concurrency: 4,
            link_timeout_secs: 45,
        }
    }
}

impl MigrationConfig {
    pub fn link_timeout(&self) -> Duration {
        Duration::from_secs(self.link_timeout_secs)
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
