// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capturing mock mailer for deterministic email-dispatch tests.
//!
//! `MockMailer` records every outgoing email; addresses registered via
//! `fail_address` produce a delivery error instead, so per-row failure
//! isolation can be exercised without an SMTP server.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_channels::email::{
    EmailCredentials, EmailSettings, Mailer, MailerProvider, OutgoingEmail,
};
use courier_core::CourierError;

/// A mock SMTP transport that captures sends.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl MockMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make sends to this address fail with a transport error.
    pub async fn fail_address(&self, address: &str) {
        self.failing.lock().await.insert(address.to_string());
    }

    /// All captured emails, in send order.
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), CourierError> {
        if self.failing.lock().await.contains(&email.to) {
            return Err(CourierError::delivery(format!(
                "SMTP rejected recipient {}",
                email.to
            )));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

/// A [`MailerProvider`] that always hands out the same [`MockMailer`].
pub struct MockMailerProvider {
    mailer: Arc<MockMailer>,
}

impl MockMailerProvider {
    pub fn new(mailer: Arc<MockMailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl MailerProvider for MockMailerProvider {
    async fn mailer(
        &self,
        _integration_id: &str,
        _credentials: &EmailCredentials,
        _settings: &EmailSettings,
    ) -> Result<Arc<dyn Mailer>, CourierError> {
        Ok(self.mailer.clone() as Arc<dyn Mailer>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_to(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: "Courier <noreply@example.com>".into(),
            to: to.into(),
            subject: "hi".into(),
            text: "body".into(),
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn captures_sends_and_fails_registered_addresses() {
        let mailer = MockMailer::new();
        mailer.fail_address("bad@example.com").await;

        mailer.send(&email_to("good@example.com")).await.unwrap();
        let err = mailer.send(&email_to("bad@example.com")).await.unwrap_err();
        assert!(err.to_string().contains("bad@example.com"));

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "good@example.com");
    }
}
