// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel delivery drivers.
//!
//! Each driver walks the freshly created log rows for its integration and
//! moves every row to a terminal status independently: one recipient's
//! failure never blocks or rolls back the others. The fan-out concurrency
//! bound is explicit (`DeliveryContext::concurrency`); 1 preserves strict
//! resolution-order delivery.

use std::path::PathBuf;

use futures::{stream, TryStreamExt};

use courier_channels::discord::{DiscordCredentials, DiscordWebhook};
use courier_channels::email::{
    EmailAttachment, EmailCredentials, EmailSettings, MailerProvider, OutgoingEmail,
};
use courier_channels::line::{LineClient, LineCredentials};
use courier_core::types::{now_iso, Attachment};
use courier_core::{CourierError, Integration, MessageLog};
use courier_storage::queries::{directory, message_logs};
use courier_storage::Database;

/// Fixed per-row error when an email row has no resolvable address.
pub const NO_EMAIL_ADDRESS: &str = "Recipient has no email address.";
/// Fixed per-row error when a LINE row has no target user id.
pub const NO_LINE_USER_ID: &str = "Recipient missing LINE user ID.";

/// Engine-level settings threaded into the delivery drivers.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    pub service_name: String,
    pub default_email_subject: String,
    pub public_base_url: String,
    pub uploads_dir: PathBuf,
    pub concurrency: usize,
}

/// Per-recipient failure text: the transport message without the taxonomy
/// prefix, so the persisted row reads like the original provider error.
pub(crate) fn delivery_message(err: &CourierError) -> String {
    match err {
        CourierError::Delivery { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn line_message_text(title: Option<&str>, content: &str) -> String {
    match title.filter(|t| !t.is_empty()) {
        Some(title) => format!("{title}\n\n{content}"),
        None => content.to_string(),
    }
}

fn discord_message_text(title: Option<&str>, content: &str) -> String {
    match title.filter(|t| !t.is_empty()) {
        Some(title) => format!("**{title}**\n{content}"),
        None => content.to_string(),
    }
}

fn attachment_notes(attachments: &[Attachment], public_base_url: &str) -> String {
    attachments
        .iter()
        .filter_map(|file| {
            let url = file.url.as_deref().filter(|u| !u.is_empty())?;
            let absolute = if url.starts_with("http") {
                url.to_string()
            } else {
                format!("{public_base_url}{url}")
            };
            let name = file
                .original_name
                .as_deref()
                .filter(|n| !n.is_empty())
                .unwrap_or(if file.filename.is_empty() {
                    "file"
                } else {
                    file.filename.as_str()
                });
            Some(format!("\n📎 {name}: {absolute}"))
        })
        .collect()
}

/// Resolve the destination address for one email row: the stored ad-hoc
/// address, the linked contact, or the recipient user's account email.
async fn email_target_address(
    db: &Database,
    log: &MessageLog,
) -> Result<Option<String>, CourierError> {
    if let Some(address) = &log.recipient_email {
        return Ok(Some(address.clone()));
    }
    if let Some(contact_id) = &log.email_contact_id
        && let Some(contact) = directory::get_email_contact(db, contact_id).await?
    {
        return Ok(Some(contact.email));
    }
    if let Some(user_id) = &log.recipient_user_id
        && let Some(user) = directory::get_user(db, user_id).await?
        && let Some(email) = user.email
    {
        return Ok(Some(email));
    }
    Ok(None)
}

/// Deliver a batch of rows over SMTP.
pub(crate) async fn deliver_email(
    db: &Database,
    provider: &dyn MailerProvider,
    integration: &Integration,
    logs: &[MessageLog],
    content: &str,
    attachments: &[Attachment],
    ctx: &DeliveryContext,
) -> Result<(), CourierError> {
    let credentials = EmailCredentials::from_integration(integration)?;
    let settings = EmailSettings::from_integration(integration)?;
    let mailer = provider
        .mailer(&integration.id, &credentials, &settings)
        .await?;

    let from = settings.from_address(&ctx.service_name);
    let fallback_subject = settings
        .default_subject
        .clone()
        .unwrap_or_else(|| ctx.default_email_subject.clone());
    let email_attachments: Vec<EmailAttachment> = attachments
        .iter()
        .filter(|file| !file.filename.is_empty())
        .map(|file| EmailAttachment {
            filename: file
                .original_name
                .clone()
                .unwrap_or_else(|| file.filename.clone()),
            path: ctx.uploads_dir.join(&file.filename),
            content_type: file.mime_type.clone(),
        })
        .collect();

    stream::iter(logs.iter().map(Ok::<_, CourierError>))
        .try_for_each_concurrent(ctx.concurrency, |log| {
            let mailer = mailer.clone();
            let from = from.clone();
            let fallback_subject = fallback_subject.clone();
            let email_attachments = email_attachments.clone();
            async move {
                let Some(address) = email_target_address(db, log).await? else {
                    message_logs::mark_failed(db, &log.id, NO_EMAIL_ADDRESS).await?;
                    return Ok(());
                };

                let email = OutgoingEmail {
                    from,
                    to: address,
                    subject: log.title.clone().unwrap_or(fallback_subject),
                    text: content.to_string(),
                    attachments: email_attachments,
                };

                match mailer.send(&email).await {
                    Ok(()) => {
                        message_logs::mark_sent(db, &log.id, &now_iso()).await?;
                    }
                    Err(e) => {
                        tracing::warn!(log_id = %log.id, error = %e, "email delivery failed");
                        message_logs::mark_failed(db, &log.id, &delivery_message(&e)).await?;
                    }
                }
                Ok(())
            }
        })
        .await
}

/// Deliver a batch of rows via LINE push.
pub(crate) async fn deliver_line(
    db: &Database,
    line: &LineClient,
    integration: &Integration,
    logs: &[MessageLog],
    content: &str,
    ctx: &DeliveryContext,
) -> Result<(), CourierError> {
    let credentials = LineCredentials::from_integration(integration)?;
    let token = credentials.channel_access_token;

    stream::iter(logs.iter().map(Ok::<_, CourierError>))
        .try_for_each_concurrent(ctx.concurrency, |log| {
            let token = token.clone();
            async move {
                let Some(target) = log.line_recipient_id.as_deref() else {
                    message_logs::mark_failed(db, &log.id, NO_LINE_USER_ID).await?;
                    return Ok(());
                };

                let text = line_message_text(log.title.as_deref(), content);
                match line.push(&token, target, &text).await {
                    Ok(()) => {
                        message_logs::mark_sent(db, &log.id, &now_iso()).await?;
                    }
                    Err(e) => {
                        tracing::warn!(log_id = %log.id, error = %e, "LINE delivery failed");
                        message_logs::mark_failed(db, &log.id, &delivery_message(&e)).await?;
                    }
                }
                Ok(())
            }
        })
        .await
}

/// Deliver a batch of rows to a Discord webhook.
pub(crate) async fn deliver_discord(
    db: &Database,
    webhook: &DiscordWebhook,
    integration: &Integration,
    logs: &[MessageLog],
    content: &str,
    attachments: &[Attachment],
    ctx: &DeliveryContext,
) -> Result<(), CourierError> {
    let credentials = DiscordCredentials::from_integration(integration)?;
    let notes = attachment_notes(attachments, &ctx.public_base_url);

    stream::iter(logs.iter().map(Ok::<_, CourierError>))
        .try_for_each_concurrent(ctx.concurrency, |log| {
            let webhook_url = credentials.webhook_url.clone();
            let notes = notes.clone();
            async move {
                let text = discord_message_text(log.title.as_deref(), content);
                let full = format!("{text}{notes}").trim().to_string();
                match webhook.execute(&webhook_url, &full).await {
                    Ok(()) => {
                        message_logs::mark_sent(db, &log.id, &now_iso()).await?;
                    }
                    Err(e) => {
                        tracing::warn!(log_id = %log.id, error = %e, "discord delivery failed");
                        message_logs::mark_failed(db, &log.id, &delivery_message(&e)).await?;
                    }
                }
                Ok(())
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_text_includes_title_when_present() {
        assert_eq!(
            line_message_text(Some("Maintenance"), "down at noon"),
            "Maintenance\n\ndown at noon"
        );
        assert_eq!(line_message_text(None, "down at noon"), "down at noon");
        assert_eq!(line_message_text(Some(""), "down at noon"), "down at noon");
    }

    #[test]
    fn discord_text_bolds_title() {
        assert_eq!(
            discord_message_text(Some("Release"), "v1.2 is out"),
            "**Release**\nv1.2 is out"
        );
        assert_eq!(discord_message_text(None, "v1.2 is out"), "v1.2 is out");
    }

    #[test]
    fn attachment_notes_prefix_relative_urls() {
        let attachments = vec![
            Attachment {
                filename: "a.png".into(),
                original_name: Some("screenshot.png".into()),
                mime_type: Some("image/png".into()),
                size: Some(10),
                url: Some("/uploads/a.png".into()),
            },
            Attachment {
                filename: "b.pdf".into(),
                original_name: None,
                mime_type: None,
                size: None,
                url: Some("https://cdn.example.com/b.pdf".into()),
            },
            Attachment {
                filename: "no-url.txt".into(),
                original_name: None,
                mime_type: None,
                size: None,
                url: None,
            },
        ];
        let notes = attachment_notes(&attachments, "https://app.example.com");
        assert!(notes.contains("screenshot.png: https://app.example.com/uploads/a.png"));
        assert!(notes.contains("b.pdf: https://cdn.example.com/b.pdf"));
        assert!(!notes.contains("no-url.txt"));
    }

    #[test]
    fn delivery_message_strips_taxonomy_prefix() {
        let err = CourierError::delivery("LINE push failed (500): boom");
        assert_eq!(delivery_message(&err), "LINE push failed (500): boom");

        let other = CourierError::Validation("nope".into());
        assert_eq!(delivery_message(&other), "validation error: nope");
    }
}
