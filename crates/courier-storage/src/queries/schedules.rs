// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled message CRUD and state transitions.
//!
//! The due query deliberately includes PROCESSING rows: a tick that crashed
//! mid-run leaves a visible PROCESSING row which the next poll picks up
//! again. FAILED rows are excluded -- retry is an operator action.

use rusqlite::params;

use courier_core::types::{new_id, truncate_error};
use courier_core::{CourierError, ScheduleStatus};

use crate::database::{map_tr_err, Database};
use crate::models::{ScheduleRecipient, ScheduledMessage};
use crate::queries::parse_column;

const SCHEDULE_COLUMNS: &str =
    "id, admin_id, title, content, schedule_at, status, last_processed_at, error, created_at";

fn schedule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledMessage> {
    Ok(ScheduledMessage {
        id: row.get(0)?,
        admin_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        schedule_at: row.get(4)?,
        status: parse_column(5, row.get::<_, String>(5)?)?,
        last_processed_at: row.get(6)?,
        error: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn recipient_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRecipient> {
    let kind: String = row.get(0)?;
    let user_id: Option<String> = row.get(1)?;
    let group_id: Option<String> = row.get(2)?;
    match kind.as_str() {
        "USER" => Ok(ScheduleRecipient::User {
            user_id: user_id.unwrap_or_default(),
        }),
        "GROUP" => Ok(ScheduleRecipient::Group {
            group_id: group_id.unwrap_or_default(),
        }),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown recipient_type `{other}`").into(),
        )),
    }
}

/// Insert a scheduled message together with its recipient set, atomically.
pub async fn create(
    db: &Database,
    message: ScheduledMessage,
    recipients: Vec<ScheduleRecipient>,
) -> Result<(), CourierError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO scheduled_messages
                     (id, admin_id, title, content, schedule_at, status,
                      last_processed_at, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    message.id,
                    message.admin_id,
                    message.title,
                    message.content,
                    message.schedule_at,
                    message.status.to_string(),
                    message.last_processed_at,
                    message.error,
                    message.created_at,
                ],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO scheduled_recipients
                         (id, scheduled_message_id, recipient_type, user_id, group_id)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for recipient in &recipients {
                    let (kind, user_id, group_id) = match recipient {
                        ScheduleRecipient::User { user_id } => {
                            ("USER", Some(user_id.as_str()), None)
                        }
                        ScheduleRecipient::Group { group_id } => {
                            ("GROUP", None, Some(group_id.as_str()))
                        }
                    };
                    stmt.execute(params![new_id(), message.id, kind, user_id, group_id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a scheduled message by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<ScheduledMessage>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM scheduled_messages WHERE id = ?1"
            ))?;
            let mut rows = stmt.query_map(params![id], schedule_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Recipient set of a scheduled message, in insertion order.
pub async fn recipients(db: &Database, id: &str) -> Result<Vec<ScheduleRecipient>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT recipient_type, user_id, group_id FROM scheduled_recipients
                 WHERE scheduled_message_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![id], recipient_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Scheduled messages owned by an admin, newest schedule first.
pub async fn list(
    db: &Database,
    admin_id: &str,
    status: Option<ScheduleStatus>,
    limit: i64,
) -> Result<Vec<ScheduledMessage>, CourierError> {
    let admin_id = admin_id.to_string();
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut out = Vec::new();
            match status {
                Some(status) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SCHEDULE_COLUMNS} FROM scheduled_messages
                         WHERE admin_id = ?1 AND status = ?2
                         ORDER BY schedule_at DESC LIMIT ?3"
                    ))?;
                    let rows =
                        stmt.query_map(params![admin_id, status, limit], schedule_from_row)?;
                    for row in rows {
                        out.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SCHEDULE_COLUMNS} FROM scheduled_messages
                         WHERE admin_id = ?1 ORDER BY schedule_at DESC LIMIT ?2"
                    ))?;
                    let rows = stmt.query_map(params![admin_id, limit], schedule_from_row)?;
                    for row in rows {
                        out.push(row?);
                    }
                }
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Due messages: PENDING or PROCESSING with `schedule_at <= now`, earliest
/// due first, bounded by `limit`.
pub async fn list_due(
    db: &Database,
    now: &str,
    limit: i64,
) -> Result<Vec<ScheduledMessage>, CourierError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM scheduled_messages
                 WHERE status IN ('PENDING', 'PROCESSING') AND schedule_at <= ?1
                 ORDER BY schedule_at ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![now, limit], schedule_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Stamp a message PROCESSING with `last_processed_at = now`.
pub async fn mark_processing(db: &Database, id: &str, now: &str) -> Result<(), CourierError> {
    update_status(db, id, ScheduleStatus::Processing, now, None).await
}

/// Terminal success: SENT, error cleared.
pub async fn mark_sent(db: &Database, id: &str, now: &str) -> Result<(), CourierError> {
    update_status(db, id, ScheduleStatus::Sent, now, None).await
}

/// Terminal failure with truncated error text.
pub async fn mark_failed(
    db: &Database,
    id: &str,
    now: &str,
    error: &str,
) -> Result<(), CourierError> {
    update_status(db, id, ScheduleStatus::Failed, now, Some(truncate_error(error))).await
}

/// CANCELLED with `last_processed_at = now`.
pub async fn cancel(db: &Database, id: &str, now: &str) -> Result<(), CourierError> {
    update_status(db, id, ScheduleStatus::Cancelled, now, None).await
}

async fn update_status(
    db: &Database,
    id: &str,
    status: ScheduleStatus,
    now: &str,
    error: Option<String>,
) -> Result<(), CourierError> {
    let id = id.to_string();
    let status = status.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scheduled_messages
                 SET status = ?2, last_processed_at = ?3, error = ?4
                 WHERE id = ?1",
                params![id, status, now, error],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Point a non-terminal message at a new schedule time: status back to
/// PENDING, bookkeeping cleared. State-machine guards live in the caller.
pub async fn reschedule(db: &Database, id: &str, schedule_at: &str) -> Result<(), CourierError> {
    let id = id.to_string();
    let schedule_at = schedule_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scheduled_messages
                 SET schedule_at = ?2, status = 'PENDING',
                     last_processed_at = NULL, error = NULL
                 WHERE id = ?1",
                params![id, schedule_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::now_iso;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("schedules.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_schedule(id: &str, schedule_at: &str, status: ScheduleStatus) -> ScheduledMessage {
        ScheduledMessage {
            id: id.to_string(),
            admin_id: "admin-1".into(),
            title: Some("reminder".into()),
            content: "standup in 5".into(),
            schedule_at: schedule_at.to_string(),
            status,
            last_processed_at: None,
            error: None,
            created_at: now_iso(),
        }
    }

    #[tokio::test]
    async fn create_persists_message_and_recipients() {
        let (db, _dir) = setup_db().await;
        let msg = make_schedule("s1", "2030-01-01T09:00:00.000Z", ScheduleStatus::Pending);
        let recips = vec![
            ScheduleRecipient::User {
                user_id: "u1".into(),
            },
            ScheduleRecipient::Group {
                group_id: "g1".into(),
            },
        ];
        create(&db, msg, recips.clone()).await.unwrap();

        let loaded = get(&db, "s1").await.unwrap().unwrap();
        assert_eq!(loaded.status, ScheduleStatus::Pending);
        assert_eq!(loaded.schedule_at, "2030-01-01T09:00:00.000Z");

        let loaded_recips = recipients(&db, "s1").await.unwrap();
        assert_eq!(loaded_recips, recips);
    }

    #[tokio::test]
    async fn list_due_selects_only_due_and_retryable_states() {
        let (db, _dir) = setup_db().await;
        let past = "2020-01-01T00:00:00.000Z";
        let future = "2099-01-01T00:00:00.000Z";

        create(&db, make_schedule("due-pending", past, ScheduleStatus::Pending), vec![])
            .await
            .unwrap();
        create(
            &db,
            make_schedule("due-processing", past, ScheduleStatus::Processing),
            vec![],
        )
        .await
        .unwrap();
        create(&db, make_schedule("due-sent", past, ScheduleStatus::Sent), vec![])
            .await
            .unwrap();
        create(
            &db,
            make_schedule("due-cancelled", past, ScheduleStatus::Cancelled),
            vec![],
        )
        .await
        .unwrap();
        create(&db, make_schedule("due-failed", past, ScheduleStatus::Failed), vec![])
            .await
            .unwrap();
        create(
            &db,
            make_schedule("not-due", future, ScheduleStatus::Pending),
            vec![],
        )
        .await
        .unwrap();

        let due = list_due(&db, &now_iso(), 10).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|m| m.id.as_str()).collect();
        assert!(ids.contains(&"due-pending"));
        assert!(ids.contains(&"due-processing"));
        assert!(!ids.contains(&"due-sent"));
        assert!(!ids.contains(&"due-cancelled"));
        assert!(!ids.contains(&"due-failed"));
        assert!(!ids.contains(&"not-due"));
    }

    #[tokio::test]
    async fn list_due_orders_earliest_first_and_honors_limit() {
        let (db, _dir) = setup_db().await;
        create(
            &db,
            make_schedule("later", "2020-06-01T00:00:00.000Z", ScheduleStatus::Pending),
            vec![],
        )
        .await
        .unwrap();
        create(
            &db,
            make_schedule("earlier", "2020-01-01T00:00:00.000Z", ScheduleStatus::Pending),
            vec![],
        )
        .await
        .unwrap();

        let due = list_due(&db, &now_iso(), 1).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "earlier");
    }

    #[tokio::test]
    async fn status_transitions_update_bookkeeping() {
        let (db, _dir) = setup_db().await;
        create(
            &db,
            make_schedule("s1", "2020-01-01T00:00:00.000Z", ScheduleStatus::Pending),
            vec![],
        )
        .await
        .unwrap();

        let now = now_iso();
        mark_processing(&db, "s1", &now).await.unwrap();
        let processing = get(&db, "s1").await.unwrap().unwrap();
        assert_eq!(processing.status, ScheduleStatus::Processing);
        assert_eq!(processing.last_processed_at.as_deref(), Some(now.as_str()));

        mark_failed(&db, "s1", &now_iso(), &"e".repeat(900))
            .await
            .unwrap();
        let failed = get(&db, "s1").await.unwrap().unwrap();
        assert_eq!(failed.status, ScheduleStatus::Failed);
        assert_eq!(failed.error.unwrap().len(), 500);

        // Reschedule resets status, bookkeeping, and error together.
        reschedule(&db, "s1", "2030-01-01T00:00:00.000Z").await.unwrap();
        let pending = get(&db, "s1").await.unwrap().unwrap();
        assert_eq!(pending.status, ScheduleStatus::Pending);
        assert!(pending.last_processed_at.is_none());
        assert!(pending.error.is_none());
        assert_eq!(pending.schedule_at, "2030-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn list_filters_by_owner_and_status() {
        let (db, _dir) = setup_db().await;
        let mut other = make_schedule("other", "2030-01-01T00:00:00.000Z", ScheduleStatus::Pending);
        other.admin_id = "admin-2".into();
        create(&db, other, vec![]).await.unwrap();
        create(
            &db,
            make_schedule("mine", "2030-01-01T00:00:00.000Z", ScheduleStatus::Pending),
            vec![],
        )
        .await
        .unwrap();
        create(
            &db,
            make_schedule("mine-sent", "2030-02-01T00:00:00.000Z", ScheduleStatus::Sent),
            vec![],
        )
        .await
        .unwrap();

        let all = list(&db, "admin-1", None, 50).await.unwrap();
        assert_eq!(all.len(), 2);

        let sent = list(&db, "admin-1", Some(ScheduleStatus::Sent), 50)
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, "mine-sent");
    }
}
