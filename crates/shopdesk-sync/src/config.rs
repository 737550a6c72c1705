//! # Sync Configuration
//!
//! Configuration management for the synchronization engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SHOPDESK_SYNC_INTERVAL_SECS=300                                    │
//! │     SHOPDESK_AGGREGATE_COLLECTION=userData                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/shopdesk/sync.toml (Linux)                               │
//! │     ~/Library/Application Support/com.shopdesk.app/sync.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     5 min periodic cycle, 2 min degraded recovery, 60s setup window    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [schedule]
//! periodic_interval_secs = 300
//! degraded_probe_interval_secs = 120
//! channel_reset_delay_secs = 2
//! setup_timeout_secs = 60
//!
//! [retry.init]
//! base_delay_secs = 2
//! cap_delay_secs = 10
//! max_retries = 3
//!
//! [retry.sync]
//! base_delay_secs = 5
//! cap_delay_secs = 30
//! max_retries = 3
//!
//! [remote]
//! aggregate_collection = "userData"
//! legacy_collection = "sharedData"
//! read_legacy_layout = true
//! health_collection = "_health"
//! health_document = "probe"
//!
//! [bootstrap]
//! identity = "frontdesk@shop.test"
//! secret = "change-me"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backoff::{RetryDomain, RetryPolicy};
use crate::error::{SyncError, SyncResult};
use shopdesk_core::validation::validate_credentials;
use shopdesk_core::CachedCredentials;

// =============================================================================
// Schedule Settings
// =============================================================================

/// Timer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Interval between periodic cycles while a session is active (seconds).
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_secs: u64,

    /// Interval between setup attempts while degraded (seconds).
    #[serde(default = "default_degraded_probe_interval")]
    pub degraded_probe_interval_secs: u64,

    /// Delay before re-running a cycle after a channel reset (seconds).
    #[serde(default = "default_channel_reset_delay")]
    pub channel_reset_delay_secs: u64,

    /// How long setup waits for the auth provider to become ready (seconds).
    #[serde(default = "default_setup_timeout")]
    pub setup_timeout_secs: u64,
}

fn default_periodic_interval() -> u64 {
    300
}

fn default_degraded_probe_interval() -> u64 {
    120
}

fn default_channel_reset_delay() -> u64 {
    2
}

fn default_setup_timeout() -> u64 {
    60
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        ScheduleSettings {
            periodic_interval_secs: default_periodic_interval(),
            degraded_probe_interval_secs: default_degraded_probe_interval(),
            channel_reset_delay_secs: default_channel_reset_delay(),
            setup_timeout_secs: default_setup_timeout(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Retry policies for both domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "RetryPolicy::init")]
    pub init: RetryPolicy,

    #[serde(default = "RetryPolicy::sync")]
    pub sync: RetryPolicy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            init: RetryPolicy::init(),
            sync: RetryPolicy::sync(),
        }
    }
}

// =============================================================================
// Remote Layout Settings
// =============================================================================

/// Where documents live in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Collection holding one aggregate document per session.
    #[serde(default = "default_aggregate_collection")]
    pub aggregate_collection: String,

    /// Collection holding the deprecated per-collection documents.
    #[serde(default = "default_legacy_collection")]
    pub legacy_collection: String,

    /// Fall back to the per-collection layout when the aggregate has no
    /// entry for a collection.
    #[serde(default = "default_true")]
    pub read_legacy_layout: bool,

    /// Collection of the document read by the connection probe.
    #[serde(default = "default_health_collection")]
    pub health_collection: String,

    /// Id of the document read by the connection probe.
    #[serde(default = "default_health_document")]
    pub health_document: String,
}

fn default_aggregate_collection() -> String {
    "userData".to_string()
}

fn default_legacy_collection() -> String {
    "sharedData".to_string()
}

fn default_true() -> bool {
    true
}

fn default_health_collection() -> String {
    "_health".to_string()
}

fn default_health_document() -> String {
    "probe".to_string()
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            aggregate_collection: default_aggregate_collection(),
            legacy_collection: default_legacy_collection(),
            read_legacy_layout: true,
            health_collection: default_health_collection(),
            health_document: default_health_document(),
        }
    }
}

// =============================================================================
// Bootstrap Settings
// =============================================================================

/// Fixed fallback identity used by `enable_session_bootstrap`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapSettings {
    #[serde(default)]
    pub identity: Option<String>,

    #[serde(default)]
    pub secret: Option<String>,
}

impl BootstrapSettings {
    /// The configured pair, if both halves are set.
    pub fn credentials(&self) -> Option<CachedCredentials> {
        match (&self.identity, &self.secret) {
            (Some(identity), Some(secret)) => Some(CachedCredentials::new(identity, secret)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for BootstrapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapSettings")
            .field("identity", &self.identity)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .finish()
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Timer settings.
    #[serde(default)]
    pub schedule: ScheduleSettings,

    /// Retry policies.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Remote document layout.
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Fallback identity.
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let schedule = &self.schedule;
        if schedule.periodic_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "periodic_interval_secs must be greater than 0".into(),
            ));
        }
        if schedule.degraded_probe_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "degraded_probe_interval_secs must be greater than 0".into(),
            ));
        }
        if schedule.setup_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "setup_timeout_secs must be greater than 0".into(),
            ));
        }

        for (domain, policy) in [
            (RetryDomain::Init, &self.retry.init),
            (RetryDomain::Sync, &self.retry.sync),
        ] {
            if policy.base_delay_secs == 0 || policy.cap_delay_secs < policy.base_delay_secs {
                return Err(SyncError::InvalidConfig(format!(
                    "retry.{}: need 0 < base_delay_secs <= cap_delay_secs",
                    domain
                )));
            }
        }

        let remote = &self.remote;
        for (field, value) in [
            ("aggregate_collection", &remote.aggregate_collection),
            ("legacy_collection", &remote.legacy_collection),
            ("health_collection", &remote.health_collection),
            ("health_document", &remote.health_document),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(SyncError::InvalidConfig(format!(
                    "remote.{} must be a non-empty path segment, got '{}'",
                    field, value
                )));
            }
        }

        let bootstrap = &self.bootstrap;
        if bootstrap.identity.is_some() != bootstrap.secret.is_some() {
            return Err(SyncError::InvalidConfig(
                "bootstrap identity and secret must be set together".into(),
            ));
        }
        if let Some(credentials) = bootstrap.credentials() {
            validate_credentials(&credentials)?;
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(interval) = std::env::var("SHOPDESK_SYNC_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(secs) => {
                    debug!(secs, "Overriding periodic interval from environment");
                    self.schedule.periodic_interval_secs = secs;
                }
                Err(_) => warn!(value = %interval, "Ignoring invalid SHOPDESK_SYNC_INTERVAL_SECS"),
            }
        }

        if let Ok(timeout) = std::env::var("SHOPDESK_SETUP_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.schedule.setup_timeout_secs = secs;
            }
        }

        if let Ok(collection) = std::env::var("SHOPDESK_AGGREGATE_COLLECTION") {
            debug!(collection = %collection, "Overriding aggregate collection from environment");
            self.remote.aggregate_collection = collection;
        }

        if let Ok(identity) = std::env::var("SHOPDESK_BOOTSTRAP_IDENTITY") {
            self.bootstrap.identity = Some(identity);
        }

        if let Ok(secret) = std::env::var("SHOPDESK_BOOTSTRAP_SECRET") {
            self.bootstrap.secret = Some(secret);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "shopdesk", "app")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.periodic_interval_secs)
    }

    pub fn degraded_probe_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.degraded_probe_interval_secs)
    }

    pub fn channel_reset_delay(&self) -> Duration {
        Duration::from_secs(self.schedule.channel_reset_delay_secs)
    }

    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.schedule.setup_timeout_secs)
    }

    /// Returns the retry policy for a domain.
    pub fn retry_policy(&self, domain: RetryDomain) -> RetryPolicy {
        match domain {
            RetryDomain::Init => self.retry.init,
            RetryDomain::Sync => self.retry.sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.periodic_interval(), Duration::from_secs(300));
        assert_eq!(config.degraded_probe_interval(), Duration::from_secs(120));
        assert_eq!(config.channel_reset_delay(), Duration::from_secs(2));
        assert_eq!(config.setup_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry_policy(RetryDomain::Init), RetryPolicy::init());
        assert_eq!(config.remote.aggregate_collection, "userData");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.schedule.periodic_interval_secs = 0;
        assert!(config.validate().is_err());
        config.schedule.periodic_interval_secs = 300;

        config.retry.sync.cap_delay_secs = 1;
        assert!(config.validate().is_err());
        config.retry.sync = RetryPolicy::sync();

        config.remote.aggregate_collection = "user/data".into();
        assert!(config.validate().is_err());
        config.remote.aggregate_collection = "userData".into();

        config.bootstrap.identity = Some("frontdesk@shop.test".into());
        assert!(config.validate().is_err());

        config.bootstrap.secret = Some("123".into());
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidCredentials(_))
        ));

        config.bootstrap.secret = Some("change-me".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [schedule]
            periodic_interval_secs = 60

            [retry.sync]
            base_delay_secs = 1
            cap_delay_secs = 4
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.schedule.periodic_interval_secs, 60);
        assert_eq!(config.schedule.setup_timeout_secs, 60);
        assert_eq!(config.retry.sync.max_retries, 5);
        assert_eq!(config.retry.init, RetryPolicy::init());
        assert_eq!(config.remote.legacy_collection, "sharedData");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("shopdesk-sync-{}.toml", uuid::Uuid::new_v4()));

        let mut config = SyncConfig::default();
        config.schedule.periodic_interval_secs = 90;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[schedule]"));
        assert!(contents.contains("[retry.init]"));

        let loaded: SyncConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bootstrap_debug_hides_secret() {
        let bootstrap = BootstrapSettings {
            identity: Some("frontdesk@shop.test".into()),
            secret: Some("hunter22".into()),
        };
        let printed = format!("{:?}", bootstrap);
        assert!(!printed.contains("hunter22"));
        assert!(bootstrap.credentials().is_some());
    }
}
