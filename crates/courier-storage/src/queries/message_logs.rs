// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log CRUD operations.
//!
//! Log rows are created exclusively by the dispatch engine and never deleted
//! here. Status transitions are conditional writes guarded on PENDING, so
//! SENT and FAILED stay terminal no matter how often a driver retries.

use rusqlite::params;

use courier_core::types::truncate_error;
use courier_core::{CourierError, MessageStatus};

use crate::database::{map_tr_err, Database};
use crate::models::{Attachment, MessageLog};
use crate::queries::parse_column;

const LOG_COLUMNS: &str = "id, sender_id, recipient_user_id, recipient_group_id, \
     recipient_email, email_contact_id, line_recipient_id, line_contact_id, \
     direction, channel, source, title, content, integration_id, \
     scheduled_message_id, status, error, sent_at, created_at";

fn log_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageLog> {
    Ok(MessageLog {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_user_id: row.get(2)?,
        recipient_group_id: row.get(3)?,
        recipient_email: row.get(4)?,
        email_contact_id: row.get(5)?,
        line_recipient_id: row.get(6)?,
        line_contact_id: row.get(7)?,
        direction: parse_column(8, row.get::<_, String>(8)?)?,
        channel: parse_column(9, row.get::<_, String>(9)?)?,
        source: parse_column(10, row.get::<_, String>(10)?)?,
        title: row.get(11)?,
        content: row.get(12)?,
        integration_id: row.get(13)?,
        scheduled_message_id: row.get(14)?,
        status: parse_column(15, row.get::<_, String>(15)?)?,
        error: row.get(16)?,
        sent_at: row.get(17)?,
        created_at: row.get(18)?,
    })
}

fn insert_one(conn: &rusqlite::Connection, log: &MessageLog) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO message_logs (id, sender_id, recipient_user_id, recipient_group_id,
             recipient_email, email_contact_id, line_recipient_id, line_contact_id,
             direction, channel, source, title, content, integration_id,
             scheduled_message_id, status, error, sent_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
             ?15, ?16, ?17, ?18, ?19)",
        params![
            log.id,
            log.sender_id,
            log.recipient_user_id,
            log.recipient_group_id,
            log.recipient_email,
            log.email_contact_id,
            log.line_recipient_id,
            log.line_contact_id,
            log.direction.to_string(),
            log.channel.to_string(),
            log.source.to_string(),
            log.title,
            log.content,
            log.integration_id,
            log.scheduled_message_id,
            log.status.to_string(),
            log.error,
            log.sent_at,
            log.created_at,
        ],
    )?;
    Ok(())
}

/// Insert a single log row.
pub async fn insert_log(db: &Database, log: &MessageLog) -> Result<(), CourierError> {
    let log = log.clone();
    db.connection()
        .call(move |conn| {
            insert_one(conn, &log)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a batch of log rows atomically: either every row of the fan-out
/// exists, or none do.
pub async fn insert_logs(db: &Database, logs: Vec<MessageLog>) -> Result<(), CourierError> {
    if logs.is_empty() {
        return Ok(());
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            for log in &logs {
                insert_one(&tx, log)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fan attachment metadata out to every log row of a send.
pub async fn attach_to_logs(
    db: &Database,
    log_ids: Vec<String>,
    attachments: Vec<Attachment>,
) -> Result<(), CourierError> {
    if log_ids.is_empty() || attachments.is_empty() {
        return Ok(());
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO message_attachments
                         (id, message_id, filename, original_name, mime_type, size, url)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for log_id in &log_ids {
                    for file in &attachments {
                        stmt.execute(params![
                            courier_core::types::new_id(),
                            log_id,
                            file.filename,
                            file.original_name,
                            file.mime_type,
                            file.size,
                            file.url,
                        ])?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Move a PENDING row to SENT. Terminal rows are left untouched.
pub async fn mark_sent(db: &Database, id: &str, sent_at: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    let sent_at = sent_at.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE message_logs SET status = 'SENT', sent_at = ?2, error = NULL
                 WHERE id = ?1 AND status = 'PENDING'",
                params![id, sent_at],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Move a PENDING row to FAILED with truncated error text.
pub async fn mark_failed(db: &Database, id: &str, error: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    let error = truncate_error(error);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE message_logs SET status = 'FAILED', error = ?2
                 WHERE id = ?1 AND status = 'PENDING'",
                params![id, error],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a single log row.
pub async fn get_log(db: &Database, id: &str) -> Result<Option<MessageLog>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM message_logs WHERE id = ?1"
            ))?;
            let mut rows = stmt.query_map(params![id], log_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent log rows, newest first.
pub async fn list_recent(db: &Database, limit: i64) -> Result<Vec<MessageLog>, CourierError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM message_logs
                 ORDER BY created_at DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], log_from_row)?;
            let mut logs = Vec::new();
            for row in rows {
                logs.push(row?);
            }
            Ok(logs)
        })
        .await
        .map_err(map_tr_err)
}

/// Log rows produced by one scheduled message.
pub async fn list_for_schedule(
    db: &Database,
    scheduled_message_id: &str,
) -> Result<Vec<MessageLog>, CourierError> {
    let schedule_id = scheduled_message_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM message_logs
                 WHERE scheduled_message_id = ?1 ORDER BY created_at"
            ))?;
            let rows = stmt.query_map(params![schedule_id], log_from_row)?;
            let mut logs = Vec::new();
            for row in rows {
                logs.push(row?);
            }
            Ok(logs)
        })
        .await
        .map_err(map_tr_err)
}

/// Count rows in a given status.
pub async fn count_by_status(db: &Database, status: MessageStatus) -> Result<i64, CourierError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM message_logs WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::{now_iso, new_id};
    use courier_core::{MessageChannel, MessageDirection, MessageSource};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("logs.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_log(status: MessageStatus) -> MessageLog {
        MessageLog {
            id: new_id(),
            sender_id: Some("admin-1".into()),
            recipient_user_id: Some("u1".into()),
            recipient_group_id: None,
            recipient_email: None,
            email_contact_id: None,
            line_recipient_id: None,
            line_contact_id: None,
            direction: MessageDirection::Outbound,
            channel: MessageChannel::Direct,
            source: MessageSource::Manual,
            title: None,
            content: "hello".into(),
            integration_id: None,
            scheduled_message_id: None,
            status,
            error: None,
            sent_at: None,
            created_at: now_iso(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trips_enums() {
        let (db, _dir) = setup_db().await;
        let log = make_log(MessageStatus::Pending);
        insert_log(&db, &log).await.unwrap();

        let loaded = get_log(&db, &log.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, MessageStatus::Pending);
        assert_eq!(loaded.direction, MessageDirection::Outbound);
        assert_eq!(loaded.channel, MessageChannel::Direct);
        assert_eq!(loaded.source, MessageSource::Manual);
        assert_eq!(loaded.content, "hello");
    }

    #[tokio::test]
    async fn insert_logs_is_atomic() {
        let (db, _dir) = setup_db().await;
        let first = make_log(MessageStatus::Sent);
        let mut duplicate = make_log(MessageStatus::Sent);
        duplicate.id = first.id.clone(); // second row violates the primary key

        let result = insert_logs(&db, vec![first.clone(), duplicate]).await;
        assert!(result.is_err());

        // The transaction rolled back: not even the first row exists.
        assert!(get_log(&db, &first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_sent_only_touches_pending_rows() {
        let (db, _dir) = setup_db().await;
        let log = make_log(MessageStatus::Pending);
        insert_log(&db, &log).await.unwrap();

        assert!(mark_sent(&db, &log.id, &now_iso()).await.unwrap());
        let sent = get_log(&db, &log.id).await.unwrap().unwrap();
        assert_eq!(sent.status, MessageStatus::Sent);
        assert!(sent.sent_at.is_some());

        // SENT is terminal: neither transition applies again.
        assert!(!mark_sent(&db, &log.id, &now_iso()).await.unwrap());
        assert!(!mark_failed(&db, &log.id, "late failure").await.unwrap());
        let unchanged = get_log(&db, &log.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, MessageStatus::Sent);
        assert!(unchanged.error.is_none());
    }

    #[tokio::test]
    async fn mark_failed_truncates_error_text() {
        let (db, _dir) = setup_db().await;
        let log = make_log(MessageStatus::Pending);
        insert_log(&db, &log).await.unwrap();

        let long_error = "x".repeat(2000);
        assert!(mark_failed(&db, &log.id, &long_error).await.unwrap());
        let failed = get_log(&db, &log.id).await.unwrap().unwrap();
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(failed.error.unwrap().len(), 500);
    }

    #[tokio::test]
    async fn attachments_fan_out_per_log_row() {
        let (db, _dir) = setup_db().await;
        let a = make_log(MessageStatus::Sent);
        let b = make_log(MessageStatus::Sent);
        insert_logs(&db, vec![a.clone(), b.clone()]).await.unwrap();

        let file = Attachment {
            filename: "report.pdf".into(),
            original_name: Some("Q3 report.pdf".into()),
            mime_type: Some("application/pdf".into()),
            size: Some(1024),
            url: Some("/uploads/report.pdf".into()),
        };
        attach_to_logs(&db, vec![a.id.clone(), b.id.clone()], vec![file])
            .await
            .unwrap();

        let count: i64 = db
            .connection()
            .call(|conn| {
                let n =
                    conn.query_row("SELECT COUNT(*) FROM message_attachments", [], |r| r.get(0))?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn count_by_status_counts() {
        let (db, _dir) = setup_db().await;
        insert_log(&db, &make_log(MessageStatus::Sent)).await.unwrap();
        insert_log(&db, &make_log(MessageStatus::Sent)).await.unwrap();
        insert_log(&db, &make_log(MessageStatus::Failed))
            .await
            .unwrap();

        assert_eq!(count_by_status(&db, MessageStatus::Sent).await.unwrap(), 2);
        assert_eq!(
            count_by_status(&db, MessageStatus::Failed).await.unwrap(),
            1
        );
        assert_eq!(
            count_by_status(&db, MessageStatus::Pending).await.unwrap(),
            0
        );
    }
}
