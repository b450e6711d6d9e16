// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP email delivery via lettre.
//!
//! Transports are cached per (integration, host, port, user) so a batch does
//! not re-authenticate per message. The cache is owned state with explicit
//! invalidation, not a process-wide static.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MessagePart, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::Mutex;

use courier_core::{CourierError, Integration};

/// Credential keys an email integration must provide.
pub const EMAIL_REQUIRED_CREDENTIAL_KEYS: [&str; 4] =
    ["smtpHost", "smtpPort", "smtpUser", "smtpPassword"];

/// Typed SMTP credentials parsed from an integration's opaque credential map.
#[derive(Debug, Clone)]
pub struct EmailCredentials {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
}

impl EmailCredentials {
    /// Validate and extract SMTP credentials. Any missing key is a fatal
    /// configuration error raised before a single row is touched.
    pub fn from_integration(integration: &Integration) -> Result<Self, CourierError> {
        for key in EMAIL_REQUIRED_CREDENTIAL_KEYS {
            let present = match integration.credentials.get(key) {
                Some(serde_json::Value::String(s)) => !s.is_empty(),
                Some(serde_json::Value::Null) | None => false,
                Some(_) => true,
            };
            if !present {
                return Err(CourierError::Config(format!(
                    "Email integration missing credential: {key}"
                )));
            }
        }

        let port = match integration.credentials.get("smtpPort") {
            Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or(587);

        Ok(Self {
            smtp_host: integration.credential("smtpHost").unwrap_or_default().to_string(),
            smtp_port: port,
            smtp_user: integration.credential("smtpUser").unwrap_or_default().to_string(),
            smtp_password: integration
                .credential("smtpPassword")
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Typed email settings parsed from an integration's config map.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub from_email: String,
    pub from_name: Option<String>,
    pub default_subject: Option<String>,
    pub use_tls: Option<bool>,
}

impl EmailSettings {
    pub fn from_integration(integration: &Integration) -> Result<Self, CourierError> {
        let from_email = integration
            .config_value("fromEmail")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                CourierError::Config("Email integration missing From Email (fromEmail).".into())
            })?
            .to_string();

        Ok(Self {
            from_email,
            from_name: integration.config_value("fromName").map(str::to_string),
            default_subject: integration
                .config_value("defaultSubject")
                .map(str::to_string),
            use_tls: integration.config.get("useTLS").and_then(|v| v.as_bool()),
        })
    }

    /// TLS defaults to on for the implicit-TLS port when not configured.
    pub fn effective_tls(&self, port: u16) -> bool {
        self.use_tls.unwrap_or(port == 465)
    }

    /// `Name <addr>` when a from-name is configured, bare address otherwise.
    pub fn from_address(&self, fallback_name: &str) -> String {
        let name = self.from_name.as_deref().unwrap_or(fallback_name);
        if name.is_empty() {
            self.from_email.clone()
        } else {
            format!("{name} <{}>", self.from_email)
        }
    }
}

/// A file attached to an outgoing email, read from disk at send time.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub path: PathBuf,
    pub content_type: Option<String>,
}

/// A fully rendered outgoing email.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<EmailAttachment>,
}

/// One delivery attempt. Implemented by [`SmtpMailer`] in production and by
/// capturing mocks in tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), CourierError>;
}

/// Hands out mailers for an integration; the production implementation is
/// the caching [`MailerCache`].
#[async_trait]
pub trait MailerProvider: Send + Sync {
    async fn mailer(
        &self,
        integration_id: &str,
        credentials: &EmailCredentials,
        settings: &EmailSettings,
    ) -> Result<Arc<dyn Mailer>, CourierError>;
}

/// SMTP mailer over `lettre`'s async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(
        credentials: &EmailCredentials,
        settings: &EmailSettings,
    ) -> Result<Self, CourierError> {
        let builder = if settings.effective_tls(credentials.smtp_port) {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&credentials.smtp_host).map_err(|e| {
                CourierError::Config(format!(
                    "Email integration has invalid SMTP host `{}`: {e}",
                    credentials.smtp_host
                ))
            })?
        } else {
            // Plaintext transport for local relays and test servers.
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&credentials.smtp_host)
        };

        let transport = builder
            .port(credentials.smtp_port)
            .credentials(Credentials::new(
                credentials.smtp_user.clone(),
                credentials.smtp_password.clone(),
            ))
            .build();

        Ok(Self { transport })
    }
}

fn parse_mailbox(value: &str, label: &str) -> Result<Mailbox, CourierError> {
    value
        .parse()
        .map_err(|e| CourierError::delivery(format!("invalid {label} address `{value}`: {e}")))
}

fn content_type_or_default(content_type: Option<&str>) -> ContentType {
    content_type
        .and_then(|v| ContentType::parse(v).ok())
        .or_else(|| ContentType::parse("application/octet-stream").ok())
        .unwrap_or(ContentType::TEXT_PLAIN)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), CourierError> {
        let builder = Message::builder()
            .from(parse_mailbox(&email.from, "from")?)
            .to(parse_mailbox(&email.to, "to")?)
            .subject(email.subject.clone());

        let text_part = SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(email.text.clone());

        let message = if email.attachments.is_empty() {
            builder.singlepart(text_part)
        } else {
            let mut multipart = MultiPart::mixed().singlepart(text_part);
            for file in &email.attachments {
                let bytes = tokio::fs::read(&file.path).await.map_err(|e| {
                    CourierError::delivery(format!(
                        "failed to read attachment {}: {e}",
                        file.path.display()
                    ))
                })?;
                multipart = multipart.singlepart(
                    MessagePart::new(file.filename.clone())
                        .body(bytes, content_type_or_default(file.content_type.as_deref())),
                );
            }
            builder.multipart(multipart)
        }
        .map_err(|e| CourierError::delivery(format!("failed to build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| CourierError::Delivery {
                message: format!("Email delivery failed: {e}"),
                source: Some(Box::new(e)),
            })
    }
}

type CacheKey = (String, String, u16, String);

/// Cache of SMTP transports keyed by (integration id, host, port, user).
///
/// Entries live until [`invalidate`](MailerCache::invalidate) is called for
/// the integration; a changed host, port, or user naturally misses the key.
#[derive(Default)]
pub struct MailerCache {
    inner: Mutex<HashMap<CacheKey, Arc<SmtpMailer>>>,
}

impl MailerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the cached mailer for this integration+endpoint, building and
    /// caching one on first use.
    pub async fn get_or_build(
        &self,
        integration_id: &str,
        credentials: &EmailCredentials,
        settings: &EmailSettings,
    ) -> Result<Arc<SmtpMailer>, CourierError> {
        let key: CacheKey = (
            integration_id.to_string(),
            credentials.smtp_host.clone(),
            credentials.smtp_port,
            credentials.smtp_user.clone(),
        );

        let mut cache = self.inner.lock().await;
        if let Some(mailer) = cache.get(&key) {
            return Ok(mailer.clone());
        }
        let mailer = Arc::new(SmtpMailer::new(credentials, settings)?);
        cache.insert(key, mailer.clone());
        Ok(mailer)
    }

    /// Drop all cached transports for an integration. Call when credentials
    /// are known to have changed (e.g. a password rotation).
    pub async fn invalidate(&self, integration_id: &str) {
        let mut cache = self.inner.lock().await;
        cache.retain(|key, _| key.0 != integration_id);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl MailerProvider for MailerCache {
    async fn mailer(
        &self,
        integration_id: &str,
        credentials: &EmailCredentials,
        settings: &EmailSettings,
    ) -> Result<Arc<dyn Mailer>, CourierError> {
        let mailer = self.get_or_build(integration_id, credentials, settings).await?;
        Ok(mailer as Arc<dyn Mailer>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::now_iso;
    use courier_core::IntegrationKind;

    fn email_integration(credentials: serde_json::Value, config: serde_json::Value) -> Integration {
        Integration {
            id: "i1".into(),
            owner_id: "admin-1".into(),
            kind: IntegrationKind::Email,
            is_connected: true,
            credentials,
            config,
            created_at: now_iso(),
        }
    }

    fn full_credentials() -> serde_json::Value {
        serde_json::json!({
            "smtpHost": "smtp.example.com",
            "smtpPort": "2525",
            "smtpUser": "mailer",
            "smtpPassword": "hunter2"
        })
    }

    #[test]
    fn credentials_require_every_key() {
        for key in EMAIL_REQUIRED_CREDENTIAL_KEYS {
            let mut creds = full_credentials();
            creds.as_object_mut().unwrap().remove(key);
            let err = EmailCredentials::from_integration(&email_integration(
                creds,
                serde_json::json!({}),
            ))
            .unwrap_err();
            assert!(
                err.to_string().contains(key),
                "error should name the missing key {key}: {err}"
            );
        }
    }

    #[test]
    fn credentials_parse_port_from_string_or_number() {
        let creds = EmailCredentials::from_integration(&email_integration(
            full_credentials(),
            serde_json::json!({}),
        ))
        .unwrap();
        assert_eq!(creds.smtp_port, 2525);

        let mut numeric = full_credentials();
        numeric["smtpPort"] = serde_json::json!(465);
        let creds =
            EmailCredentials::from_integration(&email_integration(numeric, serde_json::json!({})))
                .unwrap();
        assert_eq!(creds.smtp_port, 465);

        let mut junk = full_credentials();
        junk["smtpPort"] = serde_json::json!("not-a-port");
        let creds =
            EmailCredentials::from_integration(&email_integration(junk, serde_json::json!({})))
                .unwrap();
        assert_eq!(creds.smtp_port, 587);
    }

    #[test]
    fn settings_require_from_email() {
        let err = EmailSettings::from_integration(&email_integration(
            full_credentials(),
            serde_json::json!({}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("fromEmail"));

        let settings = EmailSettings::from_integration(&email_integration(
            full_credentials(),
            serde_json::json!({ "fromEmail": "noreply@example.com", "fromName": "Courier" }),
        ))
        .unwrap();
        assert_eq!(settings.from_email, "noreply@example.com");
        assert_eq!(
            settings.from_address("fallback"),
            "Courier <noreply@example.com>"
        );
    }

    #[test]
    fn tls_defaults_by_port_unless_configured() {
        let settings = EmailSettings {
            from_email: "noreply@example.com".into(),
            from_name: None,
            default_subject: None,
            use_tls: None,
        };
        assert!(settings.effective_tls(465));
        assert!(!settings.effective_tls(587));

        let forced = EmailSettings {
            use_tls: Some(false),
            ..settings
        };
        assert!(!forced.effective_tls(465));
    }

    #[tokio::test]
    async fn cache_reuses_transport_per_key_and_invalidates_per_integration() {
        let cache = MailerCache::new();
        let creds = EmailCredentials {
            smtp_host: "localhost".into(),
            smtp_port: 2525,
            smtp_user: "mailer".into(),
            smtp_password: "hunter2".into(),
        };
        let settings = EmailSettings {
            from_email: "noreply@example.com".into(),
            from_name: None,
            default_subject: None,
            use_tls: Some(false),
        };

        let a = cache.get_or_build("i1", &creds, &settings).await.unwrap();
        let b = cache.get_or_build("i1", &creds, &settings).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b), "same key should reuse the transport");

        let mut other = creds.clone();
        other.smtp_user = "other".into();
        cache.get_or_build("i2", &other, &settings).await.unwrap();
        assert_eq!(cache.len().await, 2);

        cache.invalidate("i1").await;
        assert_eq!(cache.len().await, 1);

        let c = cache.get_or_build("i1", &creds, &settings).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &c), "invalidated entry is rebuilt");
    }
}
