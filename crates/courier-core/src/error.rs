// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier dispatch service.

use thiserror::Error;

/// The primary error type used across all Courier crates.
///
/// Variants follow the dispatch error taxonomy: caller mistakes
/// ([`Validation`](CourierError::Validation)), lookup failures
/// ([`NotFound`](CourierError::NotFound)), disabled integrations
/// ([`Disabled`](CourierError::Disabled)), integration-level credential
/// problems ([`Config`](CourierError::Config)), per-recipient transport
/// failures ([`Delivery`](CourierError::Delivery)), and infrastructure
/// faults ([`Storage`](CourierError::Storage), [`Internal`](CourierError::Internal)).
#[derive(Debug, Error)]
pub enum CourierError {
    /// Bad input: empty content, no recipients, invalid schedule time.
    /// Surfaced to the caller as a rejected operation, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced entity (integration, scheduled message) does not exist
    /// or is not available to the acting user.
    #[error("not found: {0}")]
    NotFound(String),

    /// The referenced integration exists but is not connected.
    #[error("integration disabled: {0}")]
    Disabled(String),

    /// An integration is missing required credentials or config values.
    /// Raised before any delivery attempt for that integration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure for a single recipient. Callers record this
    /// on the affected log row instead of propagating it.
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Shorthand for a [`Delivery`](CourierError::Delivery) error without a source.
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_human_readable_message() {
        let err = CourierError::Validation("Message content is required.".into());
        assert_eq!(
            err.to_string(),
            "validation error: Message content is required."
        );

        let err = CourierError::Config("Email integration missing credential: smtpHost".into());
        assert!(err.to_string().contains("smtpHost"));
    }

    #[test]
    fn delivery_shorthand_has_no_source() {
        let err = CourierError::delivery("LINE push failed (500): boom");
        match err {
            CourierError::Delivery { message, source } => {
                assert!(message.contains("LINE push failed"));
                assert!(source.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
