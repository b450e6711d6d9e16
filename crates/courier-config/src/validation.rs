// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths and positive batch sizes.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.service.bind_address.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "service.bind_address must not be empty".to_string(),
        });
    } else {
        let addr = config.service.bind_address.trim();
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!(
                    "service.bind_address `{addr}` is not a valid IP address or hostname"
                ),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.scheduler.batch_size == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.batch_size must be at least 1".to_string(),
        });
    }

    if config.dispatch.delivery_concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.delivery_concurrency must be at least 1".to_string(),
        });
    }

    if !config.service.public_base_url.is_empty()
        && !config.service.public_base_url.starts_with("http://")
        && !config.service.public_base_url.starts_with("https://")
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "service.public_base_url `{}` must start with http:// or https://",
                config.service.public_base_url
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
