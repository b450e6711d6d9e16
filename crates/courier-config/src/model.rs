// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier dispatch service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Minimum scheduler poll interval. Requests below this are clamped, not
/// rejected, so a typo cannot turn the scheduler into a busy loop.
pub const SCHEDULER_INTERVAL_FLOOR_SECS: u64 = 5;

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Service identity and HTTP settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduled-message runner settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Dispatch engine settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Service identity and HTTP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used as the default email From name.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Address to bind the gateway to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to bind the gateway to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL prepended to relative attachment URLs in Discord
    /// messages. Empty means attachment links are passed through as-is.
    #[serde(default)]
    pub public_base_url: String,

    /// Directory where uploaded attachment files live.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            bind_address: default_bind_address(),
            port: default_port(),
            public_base_url: String::new(),
            uploads_dir: default_uploads_dir(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "courier".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Scheduled-message runner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Enable the recurring poll loop. Run-now stays available when disabled.
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// Poll interval in seconds. Clamped to
    /// [`SCHEDULER_INTERVAL_FLOOR_SECS`].
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum due messages picked up per poll tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl SchedulerConfig {
    /// The configured interval with the floor applied.
    pub fn effective_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs.max(SCHEDULER_INTERVAL_FLOOR_SECS))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

fn default_batch_size() -> u32 {
    10
}

/// Dispatch engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Subject used for emails when neither the log row nor the integration
    /// config provides one.
    #[serde(default = "default_email_subject")]
    pub default_email_subject: String,

    /// Upper bound on concurrent per-recipient delivery attempts within one
    /// channel batch. 1 preserves strict resolution-order delivery; higher
    /// values trade ordering for latency on large recipient sets.
    #[serde(default = "default_delivery_concurrency")]
    pub delivery_concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_email_subject: default_email_subject(),
            delivery_concurrency: default_delivery_concurrency(),
        }
    }
}

fn default_email_subject() -> String {
    "New message".to_string()
}

fn default_delivery_concurrency() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = CourierConfig::default();
        assert_eq!(config.service.name, "courier");
        assert_eq!(config.service.bind_address, "127.0.0.1");
        assert_eq!(config.service.port, 5000);
        assert!(config.storage.wal_mode);
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.interval_secs, 60);
        assert_eq!(config.scheduler.batch_size, 10);
        assert_eq!(config.dispatch.delivery_concurrency, 1);
    }

    #[test]
    fn deny_unknown_fields_rejects_typos() {
        let result = toml::from_str::<CourierConfig>("[service]\nnaem = \"x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn effective_interval_applies_floor() {
        let mut config = SchedulerConfig::default();
        config.interval_secs = 0;
        assert_eq!(
            config.effective_interval(),
            std::time::Duration::from_secs(SCHEDULER_INTERVAL_FLOOR_SECS)
        );
        config.interval_secs = 300;
        assert_eq!(
            config.effective_interval(),
            std::time::Duration::from_secs(300)
        );
    }
}
