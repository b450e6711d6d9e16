// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message dispatch engine.
//!
//! `send` is the single fan-out path: it validates input and integration
//! capability up front, creates one log row per resolved recipient
//! atomically, then hands the batch to the matching delivery driver. A
//! misconfigured integration is rejected before any row exists; after row
//! creation, failures are per-row and terminal.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use courier_audit::ActivityRecorder;
use courier_channels::discord::{DiscordCredentials, DiscordWebhook};
use courier_channels::email::{EmailCredentials, EmailSettings, MailerProvider};
use courier_channels::line::{LineClient, LineCredentials};
use courier_core::types::{new_id, now_iso, ActivityKind, Attachment, NewActivity};
use courier_core::{
    CourierError, DeliveryTarget, Integration, IntegrationKind, MessageChannel, MessageDirection,
    MessageLog, MessageSource, MessageStatus,
};
use courier_storage::queries::{directory, integrations, message_logs};
use courier_storage::Database;

use crate::delivery::{self, DeliveryContext};
use crate::resolver::{self, SendRecipients};

/// Parameters of a manual or scheduled-origin send.
#[derive(Debug, Clone)]
pub struct SendMessageParams {
    pub actor_id: String,
    pub recipients: SendRecipients,
    /// Create exactly one BROADCAST row when no targets resolve -- the
    /// "post to a channel with no explicit recipients" path.
    pub allow_broadcast: bool,
    pub title: Option<String>,
    pub content: String,
    pub source: MessageSource,
    pub integration_id: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl SendMessageParams {
    /// A plain manual send from `actor_id` with the given content.
    pub fn manual(actor_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            recipients: SendRecipients::default(),
            allow_broadcast: false,
            title: None,
            content: content.into(),
            source: MessageSource::Manual,
            integration_id: None,
            attachments: Vec::new(),
        }
    }
}

/// Aggregate result of a send: per-recipient outcomes live on the log rows.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub total_recipients: usize,
    pub user_ids: Vec<String>,
    pub group_ids: Vec<String>,
    pub integration_id: Option<String>,
}

/// Engine construction settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub service_name: String,
    pub default_email_subject: String,
    pub public_base_url: String,
    pub uploads_dir: PathBuf,
    pub delivery_concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            service_name: "courier".into(),
            default_email_subject: "New message".into(),
            public_base_url: String::new(),
            uploads_dir: PathBuf::from("uploads"),
            delivery_concurrency: 1,
        }
    }
}

/// The dispatch engine. Cheap to clone behind `Arc`s.
pub struct Dispatcher {
    db: Arc<Database>,
    audit: ActivityRecorder,
    mailers: Arc<dyn MailerProvider>,
    line: LineClient,
    discord: DiscordWebhook,
    ctx: DeliveryContext,
}

impl Dispatcher {
    pub fn new(
        db: Arc<Database>,
        audit: ActivityRecorder,
        mailers: Arc<dyn MailerProvider>,
        line: LineClient,
        discord: DiscordWebhook,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            db,
            audit,
            mailers,
            line,
            discord,
            ctx: DeliveryContext {
                service_name: config.service_name,
                default_email_subject: config.default_email_subject,
                public_base_url: config.public_base_url,
                uploads_dir: config.uploads_dir,
                concurrency: config.delivery_concurrency.max(1),
            },
        }
    }

    /// Fan one logical message out to every resolved recipient.
    pub async fn send(&self, params: SendMessageParams) -> Result<DispatchSummary, CourierError> {
        if params.content.trim().is_empty() {
            return Err(CourierError::Validation(
                "Message content is required.".into(),
            ));
        }

        let integration = match &params.integration_id {
            Some(id) => {
                let integration = integrations::get(&self.db, id)
                    .await?
                    .filter(|i| i.owner_id == params.actor_id)
                    .ok_or_else(|| {
                        CourierError::NotFound("Integration not found or not available.".into())
                    })?;
                if !integration.is_connected {
                    return Err(CourierError::Disabled(
                        "Integration is currently disabled.".into(),
                    ));
                }
                // Validate channel credentials before any row is created, so
                // a misconfigured integration cannot strand PENDING rows.
                validate_integration(&integration)?;
                Some(integration)
            }
            None => None,
        };

        let targets = resolver::resolve(&self.db, &params.recipients).await?;

        let line_user_map = match &integration {
            Some(integration) if integration.kind == IntegrationKind::Line => {
                let user_ids: Vec<String> = targets
                    .iter()
                    .filter_map(|t| match t {
                        DeliveryTarget::DirectUser { user_id }
                        | DeliveryTarget::GroupMember { user_id, .. } => Some(user_id.clone()),
                        _ => None,
                    })
                    .collect();
                directory::line_user_ids(&self.db, &resolver::unique(&user_ids)).await?
            }
            _ => Default::default(),
        };

        let now = now_iso();
        let requires_delivery = integration
            .as_ref()
            .is_some_and(|i| i.kind.requires_delivery());
        let initial_status = if requires_delivery {
            MessageStatus::Pending
        } else {
            MessageStatus::Sent
        };
        let initial_sent_at = (initial_status == MessageStatus::Sent).then(|| now.clone());

        let base = MessageLog {
            id: String::new(),
            sender_id: Some(params.actor_id.clone()),
            recipient_user_id: None,
            recipient_group_id: None,
            recipient_email: None,
            email_contact_id: None,
            line_recipient_id: None,
            line_contact_id: None,
            direction: MessageDirection::Outbound,
            channel: MessageChannel::Direct,
            source: params.source,
            title: params.title.clone(),
            content: params.content.clone(),
            integration_id: params.integration_id.clone(),
            scheduled_message_id: None,
            status: initial_status,
            error: None,
            sent_at: initial_sent_at,
            created_at: now.clone(),
        };

        let mut logs: Vec<MessageLog> = Vec::with_capacity(targets.len());
        for target in &targets {
            let mut log = base.clone();
            log.id = new_id();
            match target {
                DeliveryTarget::DirectUser { user_id } => {
                    log.recipient_user_id = Some(user_id.clone());
                    log.line_recipient_id = line_user_map.get(user_id).cloned();
                }
                DeliveryTarget::GroupMember { user_id, group_id } => {
                    log.recipient_user_id = Some(user_id.clone());
                    log.recipient_group_id = Some(group_id.clone());
                    log.channel = MessageChannel::Group;
                    log.line_recipient_id = line_user_map.get(user_id).cloned();
                }
                DeliveryTarget::Email {
                    address,
                    contact_id,
                } => {
                    log.recipient_email = Some(address.clone());
                    log.email_contact_id = contact_id.clone();
                }
                DeliveryTarget::Line {
                    line_user_id,
                    contact_id,
                } => {
                    log.line_recipient_id = Some(line_user_id.clone());
                    log.line_contact_id = contact_id.clone();
                }
                DeliveryTarget::Broadcast => unreachable!("resolver never emits Broadcast"),
            }
            logs.push(log);
        }

        if logs.is_empty() && params.allow_broadcast {
            let mut log = base.clone();
            log.id = new_id();
            log.channel = MessageChannel::Broadcast;
            log.status = MessageStatus::Pending;
            log.sent_at = None;
            logs.push(log);
        }

        if logs.is_empty() {
            return Err(CourierError::Validation(
                "At least one recipient is required.".into(),
            ));
        }

        message_logs::insert_logs(&self.db, logs.clone()).await?;
        if !params.attachments.is_empty() {
            message_logs::attach_to_logs(
                &self.db,
                logs.iter().map(|l| l.id.clone()).collect(),
                params.attachments.clone(),
            )
            .await?;
        }

        tracing::info!(
            recipients = logs.len(),
            integration = params.integration_id.as_deref().unwrap_or("none"),
            source = %params.source,
            "dispatching message"
        );

        let group_ids = resolver::unique(&params.recipients.group_ids);
        self.audit
            .record(NewActivity {
                kind: ActivityKind::MessageSend,
                actor_id: Some(params.actor_id.clone()),
                entity_id: None,
                entity_type: Some("MANUAL_MESSAGE".into()),
                metadata: Some(serde_json::json!({
                    "contentPreview": preview(&params.content),
                    "users": logs.iter().filter_map(|l| l.recipient_user_id.clone()).collect::<Vec<_>>(),
                    "groups": group_ids,
                    "integrationId": params.integration_id,
                    "emails": logs.iter().filter_map(|l| l.recipient_email.clone()).collect::<Vec<_>>(),
                    "lineRecipients": logs.iter().filter_map(|l| l.line_recipient_id.clone()).collect::<Vec<_>>(),
                })),
            })
            .await;

        if let Some(integration) = &integration {
            match integration.kind {
                IntegrationKind::Email => {
                    delivery::deliver_email(
                        &self.db,
                        self.mailers.as_ref(),
                        integration,
                        &logs,
                        &params.content,
                        &params.attachments,
                        &self.ctx,
                    )
                    .await?;
                }
                IntegrationKind::Line => {
                    delivery::deliver_line(
                        &self.db,
                        &self.line,
                        integration,
                        &logs,
                        &params.content,
                        &self.ctx,
                    )
                    .await?;
                }
                IntegrationKind::Discord => {
                    delivery::deliver_discord(
                        &self.db,
                        &self.discord,
                        integration,
                        &logs,
                        &params.content,
                        &params.attachments,
                        &self.ctx,
                    )
                    .await?;
                }
                IntegrationKind::Facebook => {} // placeholder: no delivery step
            }
        }

        Ok(DispatchSummary {
            total_recipients: logs.len(),
            user_ids: logs
                .iter()
                .filter_map(|l| l.recipient_user_id.clone())
                .collect(),
            group_ids: resolver::unique(&params.recipients.group_ids),
            integration_id: params.integration_id,
        })
    }

    /// Record an externally received message as an INBOUND row.
    pub async fn log_inbound(
        &self,
        user_id: &str,
        content: &str,
    ) -> Result<MessageLog, CourierError> {
        if content.trim().is_empty() {
            return Err(CourierError::Validation(
                "Message content is required.".into(),
            ));
        }

        let now = now_iso();
        let log = MessageLog {
            id: new_id(),
            sender_id: Some(user_id.to_string()),
            recipient_user_id: None,
            recipient_group_id: None,
            recipient_email: None,
            email_contact_id: None,
            line_recipient_id: None,
            line_contact_id: None,
            direction: MessageDirection::Inbound,
            channel: MessageChannel::Direct,
            source: MessageSource::Manual,
            title: None,
            content: content.to_string(),
            integration_id: None,
            scheduled_message_id: None,
            status: MessageStatus::Sent,
            error: None,
            sent_at: Some(now.clone()),
            created_at: now,
        };
        message_logs::insert_log(&self.db, &log).await?;

        self.audit
            .record(NewActivity {
                kind: ActivityKind::MessageReceive,
                actor_id: Some(user_id.to_string()),
                entity_id: Some(log.id.clone()),
                entity_type: Some("MESSAGE_LOG".into()),
                metadata: None,
            })
            .await;

        Ok(log)
    }

    /// The storage handle this engine writes through.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

/// Typed credential validation per integration kind (runs before any row is
/// created).
fn validate_integration(integration: &Integration) -> Result<(), CourierError> {
    match integration.kind {
        IntegrationKind::Email => {
            EmailCredentials::from_integration(integration)?;
            EmailSettings::from_integration(integration)?;
        }
        IntegrationKind::Line => {
            LineCredentials::from_integration(integration)?;
        }
        IntegrationKind::Discord => {
            DiscordCredentials::from_integration(integration)?;
        }
        IntegrationKind::Facebook => {}
    }
    Ok(())
}

fn preview(content: &str) -> String {
    content.chars().take(120).collect()
}
