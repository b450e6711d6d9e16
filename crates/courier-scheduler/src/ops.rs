// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled-message operations: create, cancel, reschedule.
//!
//! State machine: PENDING -> PROCESSING -> {SENT, FAILED}; CANCELLED via
//! explicit cancel; reschedule returns any non-terminal message to PENDING.

use courier_audit::ActivityRecorder;
use courier_core::types::{format_iso, new_id, now_iso, NewActivity, ScheduleRecipient};
use courier_core::{ActivityKind, CourierError, ScheduleStatus, ScheduledMessage};
use courier_dispatch::resolver::unique;
use courier_storage::queries::schedules;
use courier_storage::Database;

/// Parameters for creating a scheduled send intent.
#[derive(Debug, Clone)]
pub struct CreateScheduleParams {
    pub admin_id: String,
    pub title: Option<String>,
    pub content: String,
    pub schedule_at: String,
    pub user_ids: Vec<String>,
    pub group_ids: Vec<String>,
}

/// Create a scheduled message with a strictly future schedule time and at
/// least one recipient.
pub async fn create_scheduled_message(
    db: &Database,
    audit: &ActivityRecorder,
    params: CreateScheduleParams,
) -> Result<(ScheduledMessage, Vec<ScheduleRecipient>), CourierError> {
    if params.content.trim().is_empty() {
        return Err(CourierError::Validation(
            "Message content is required.".into(),
        ));
    }
    if params.schedule_at.trim().is_empty() {
        return Err(CourierError::Validation("Schedule time is required.".into()));
    }
    let schedule_date = courier_core::types::parse_iso(&params.schedule_at)
        .map_err(|_| CourierError::Validation("Invalid schedule time.".into()))?;
    if schedule_date <= chrono::Utc::now() {
        return Err(CourierError::Validation(
            "Schedule time must be in the future.".into(),
        ));
    }

    let direct_user_ids = unique(&params.user_ids);
    let group_ids = unique(&params.group_ids);
    if direct_user_ids.is_empty() && group_ids.is_empty() {
        return Err(CourierError::Validation(
            "At least one recipient is required.".into(),
        ));
    }

    let message = ScheduledMessage {
        id: new_id(),
        admin_id: params.admin_id.clone(),
        title: params.title,
        content: params.content,
        schedule_at: format_iso(schedule_date),
        status: ScheduleStatus::Pending,
        last_processed_at: None,
        error: None,
        created_at: now_iso(),
    };

    let recipients: Vec<ScheduleRecipient> = direct_user_ids
        .iter()
        .map(|user_id| ScheduleRecipient::User {
            user_id: user_id.clone(),
        })
        .chain(group_ids.iter().map(|group_id| ScheduleRecipient::Group {
            group_id: group_id.clone(),
        }))
        .collect();

    schedules::create(db, message.clone(), recipients.clone()).await?;

    audit
        .record(NewActivity {
            kind: ActivityKind::MessageSend,
            actor_id: Some(params.admin_id),
            entity_id: Some(message.id.clone()),
            entity_type: Some("SCHEDULED_MESSAGE".into()),
            metadata: Some(serde_json::json!({
                "scheduleAt": message.schedule_at,
                "userRecipients": direct_user_ids,
                "groupRecipients": group_ids,
            })),
        })
        .await;

    Ok((message, recipients))
}

/// Cancel a scheduled message.
///
/// Idempotent on CANCELLED; SENT messages cannot be cancelled.
pub async fn cancel_scheduled_message(
    db: &Database,
    audit: &ActivityRecorder,
    id: &str,
    admin_id: &str,
) -> Result<ScheduledMessage, CourierError> {
    let message = schedules::get(db, id)
        .await?
        .ok_or_else(|| CourierError::NotFound("Scheduled message not found.".into()))?;

    if message.status == ScheduleStatus::Cancelled {
        return Ok(message);
    }
    if message.status == ScheduleStatus::Sent {
        return Err(CourierError::Validation(
            "Cannot cancel an already sent message.".into(),
        ));
    }

    schedules::cancel(db, id, &now_iso()).await?;

    audit
        .record(NewActivity {
            kind: ActivityKind::MessageFail,
            actor_id: Some(admin_id.to_string()),
            entity_id: Some(id.to_string()),
            entity_type: Some("SCHEDULED_MESSAGE".into()),
            metadata: Some(serde_json::json!({ "action": "CANCEL" })),
        })
        .await;

    schedules::get(db, id)
        .await?
        .ok_or_else(|| CourierError::Internal("scheduled message vanished during cancel".into()))
}

/// Point a non-terminal scheduled message at a new time, resetting it to
/// PENDING and clearing processing bookkeeping.
pub async fn reschedule_scheduled_message(
    db: &Database,
    id: &str,
    admin_id: &str,
    schedule_at: &str,
) -> Result<ScheduledMessage, CourierError> {
    let schedule_date = courier_core::types::parse_iso(schedule_at)
        .map_err(|_| CourierError::Validation("Invalid schedule time.".into()))?;

    let message = schedules::get(db, id)
        .await?
        .filter(|m| m.admin_id == admin_id)
        .ok_or_else(|| CourierError::NotFound("Scheduled message not found.".into()))?;

    if message.status.is_terminal() {
        return Err(CourierError::Validation(
            "Cannot reschedule sent or cancelled message.".into(),
        ));
    }

    schedules::reschedule(db, id, &format_iso(schedule_date)).await?;
    schedules::get(db, id).await?.ok_or_else(|| {
        CourierError::Internal("scheduled message vanished during reschedule".into())
    })
}
