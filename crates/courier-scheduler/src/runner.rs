// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scheduled-message runner.
//!
//! A single recurring loop polls for due messages and drives each through
//! PROCESSING to a terminal status. The on-demand trigger and the timer both
//! call [`Scheduler::process_due`]; there is no separate code path. Stopping
//! the runner prevents new ticks but does not abort an in-flight tick.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use courier_audit::ActivityRecorder;
use courier_core::types::{new_id, now_iso, NewActivity};
use courier_core::{
    ActivityKind, CourierError, MessageChannel, MessageDirection, MessageLog, MessageSource,
    MessageStatus, ScheduledMessage,
};
use courier_dispatch::resolver;
use courier_storage::queries::{message_logs, schedules};
use courier_storage::Database;

/// Polls for due scheduled messages and delivers them as direct log rows.
pub struct Scheduler {
    db: Arc<Database>,
    audit: ActivityRecorder,
    batch_size: i64,
}

impl Scheduler {
    pub fn new(db: Arc<Database>, audit: ActivityRecorder, batch_size: u32) -> Self {
        Self {
            db,
            audit,
            batch_size: i64::from(batch_size.max(1)),
        }
    }

    /// One poll pass: pick up to `batch_size` due messages (earliest due
    /// first) and process them sequentially. Per-message failures are
    /// recorded on that message; the rest of the batch still runs.
    pub async fn process_due(&self) -> Result<u32, CourierError> {
        let now = now_iso();
        let due = schedules::list_due(&self.db, &now, self.batch_size).await?;
        if due.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = due.len(), "processing due scheduled messages");
        let mut processed = 0u32;

        for message in due {
            match self.deliver(&message, &now).await {
                Ok(delivered) => {
                    schedules::mark_sent(&self.db, &message.id, &now_iso()).await?;
                    tracing::info!(
                        schedule_id = %message.id,
                        recipients = delivered,
                        "scheduled message delivered"
                    );
                }
                Err(e) => {
                    tracing::error!(schedule_id = %message.id, error = %e, "scheduled message failed");
                    schedules::mark_failed(&self.db, &message.id, &now_iso(), &error_text(&e))
                        .await?;
                    self.audit
                        .record(NewActivity {
                            kind: ActivityKind::MessageFail,
                            actor_id: Some(message.admin_id.clone()),
                            entity_id: Some(message.id.clone()),
                            entity_type: Some("SCHEDULED_MESSAGE".into()),
                            metadata: Some(serde_json::json!({ "error": error_text(&e) })),
                        })
                        .await;
                }
            }
            processed += 1;
        }

        Ok(processed)
    }

    /// Deliver one scheduled message: stamp PROCESSING, expand recipients,
    /// create one SENT log row per target. Scheduled delivery is always
    /// direct-to-user logging; no channel adapter is involved.
    async fn deliver(
        &self,
        message: &ScheduledMessage,
        now: &str,
    ) -> Result<usize, CourierError> {
        schedules::mark_processing(&self.db, &message.id, now).await?;

        let recipients = schedules::recipients(&self.db, &message.id).await?;
        let targets = resolver::resolve_scheduled(&self.db, &recipients).await?;
        if targets.is_empty() {
            return Err(CourierError::Validation(
                "Scheduled message has no valid recipients.".into(),
            ));
        }

        let delivered_at = now_iso();
        let logs: Vec<MessageLog> = targets
            .iter()
            .map(|target| MessageLog {
                id: new_id(),
                sender_id: Some(message.admin_id.clone()),
                recipient_user_id: Some(target.user_id.clone()),
                recipient_group_id: target.group_id.clone(),
                recipient_email: None,
                email_contact_id: None,
                line_recipient_id: None,
                line_contact_id: None,
                direction: MessageDirection::Outbound,
                channel: if target.group_id.is_some() {
                    MessageChannel::Group
                } else {
                    MessageChannel::Direct
                },
                source: MessageSource::Scheduled,
                title: message.title.clone(),
                content: message.content.clone(),
                integration_id: None,
                scheduled_message_id: Some(message.id.clone()),
                status: MessageStatus::Sent,
                error: None,
                sent_at: Some(delivered_at.clone()),
                created_at: delivered_at.clone(),
            })
            .collect();

        message_logs::insert_logs(&self.db, logs).await?;

        self.audit
            .record(NewActivity {
                kind: ActivityKind::MessageSend,
                actor_id: Some(message.admin_id.clone()),
                entity_id: Some(message.id.clone()),
                entity_type: Some("SCHEDULED_MESSAGE".into()),
                metadata: Some(serde_json::json!({
                    "deliveredAt": delivered_at,
                    "recipients": targets.iter().map(|t| t.user_id.clone()).collect::<Vec<_>>(),
                    "groups": targets.iter().filter_map(|t| t.group_id.clone()).collect::<Vec<_>>(),
                })),
            })
            .await;

        Ok(targets.len())
    }

    /// Run the recurring poll loop until the token is cancelled.
    pub async fn run(&self, interval: std::time::Duration, cancel: CancellationToken) {
        tracing::info!(interval_secs = interval.as_secs(), "scheduler started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    match self.process_due().await {
                        Ok(n) if n > 0 => tracing::info!(processed = n, "scheduler tick"),
                        Err(e) => tracing::error!(error = %e, "scheduler tick failed"),
                        _ => {}
                    }
                }
            }
        }
        tracing::info!("scheduler stopped");
    }
}

/// The message persisted on a FAILED schedule, without the error-taxonomy
/// prefix so operator-facing text matches what the operation reported.
fn error_text(err: &CourierError) -> String {
    match err {
        CourierError::Validation(m)
        | CourierError::NotFound(m)
        | CourierError::Disabled(m)
        | CourierError::Config(m)
        | CourierError::Internal(m) => m.clone(),
        CourierError::Delivery { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
