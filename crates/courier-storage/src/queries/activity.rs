// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Activity log inserts and reads.

use rusqlite::params;

use courier_core::CourierError;

use crate::database::{map_tr_err, Database};
use crate::models::{ActivityEntry, NewActivity};
use crate::queries::{parse_column, parse_json};

/// Insert an activity entry.
///
/// This is the fallible primitive; the never-fails contract lives in
/// `courier-audit`, which wraps it.
pub async fn insert(db: &Database, entry: NewActivity, now: &str) -> Result<(), CourierError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO activity_log
                     (id, kind, actor_id, entity_id, entity_type, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    courier_core::types::new_id(),
                    entry.kind.to_string(),
                    entry.actor_id,
                    entry.entity_id,
                    entry.entity_type,
                    entry.metadata.map(|m| m.to_string()),
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent activity entries, newest first.
pub async fn list_recent(db: &Database, limit: i64) -> Result<Vec<ActivityEntry>, CourierError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, actor_id, entity_id, entity_type, metadata, created_at
                 FROM activity_log ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(ActivityEntry {
                    id: row.get(0)?,
                    kind: parse_column(1, row.get::<_, String>(1)?)?,
                    actor_id: row.get(2)?,
                    entity_id: row.get(3)?,
                    entity_type: row.get(4)?,
                    metadata: match row.get::<_, Option<String>>(5)? {
                        Some(raw) => Some(parse_json(5, raw)?),
                        None => None,
                    },
                    created_at: row.get(6)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::now_iso;
    use courier_core::ActivityKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn insert_and_list_round_trips_metadata() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("activity.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        insert(
            &db,
            NewActivity {
                kind: ActivityKind::MessageSend,
                actor_id: Some("admin-1".into()),
                entity_id: Some("log-1".into()),
                entity_type: Some("MANUAL_MESSAGE".into()),
                metadata: Some(serde_json::json!({ "contentPreview": "hi" })),
            },
            &now_iso(),
        )
        .await
        .unwrap();

        insert(
            &db,
            NewActivity {
                kind: ActivityKind::MessageFail,
                actor_id: None,
                entity_id: None,
                entity_type: None,
                metadata: None,
            },
            &now_iso(),
        )
        .await
        .unwrap();

        let entries = list_recent(&db, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, ActivityKind::MessageFail);
        assert_eq!(entries[1].kind, ActivityKind::MessageSend);
        assert_eq!(
            entries[1].metadata.as_ref().unwrap()["contentPreview"],
            "hi"
        );
    }
}
