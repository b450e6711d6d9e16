// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort activity recording.
//!
//! Every dispatch and schedule action leaves an activity entry, but an
//! audit-trail gap is always preferable to a blocked delivery: `record`
//! swallows storage failures after logging them.

use std::sync::Arc;

use courier_core::types::{now_iso, NewActivity};
use courier_storage::{queries, Database};

/// Records activity entries against storage without ever failing the caller.
#[derive(Clone)]
pub struct ActivityRecorder {
    db: Arc<Database>,
}

impl ActivityRecorder {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Persist an activity entry. Errors are logged and swallowed.
    pub async fn record(&self, entry: NewActivity) {
        let kind = entry.kind;
        if let Err(e) = queries::activity::insert(&self.db, entry, &now_iso()).await {
            tracing::warn!(error = %e, kind = %kind, "activity record failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ActivityKind;
    use tempfile::tempdir;

    fn entry(kind: ActivityKind) -> NewActivity {
        NewActivity {
            kind,
            actor_id: Some("admin-1".into()),
            entity_id: None,
            entity_type: Some("MANUAL_MESSAGE".into()),
            metadata: Some(serde_json::json!({ "users": ["u1"] })),
        }
    }

    #[tokio::test]
    async fn record_persists_entry() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        let db = Arc::new(Database::open(db_path.to_str().unwrap()).await.unwrap());
        let recorder = ActivityRecorder::new(db.clone());

        recorder.record(entry(ActivityKind::MessageSend)).await;

        let entries = queries::activity::list_recent(&db, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ActivityKind::MessageSend);
    }

    #[tokio::test]
    async fn record_swallows_storage_failure() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("audit-broken.db");
        let db = Arc::new(Database::open(db_path.to_str().unwrap()).await.unwrap());

        // Sabotage the table so the insert fails.
        db.connection()
            .call(|conn| {
                conn.execute_batch("DROP TABLE activity_log;")?;
                Ok(())
            })
            .await
            .unwrap();

        let recorder = ActivityRecorder::new(db);
        // Must not panic or propagate.
        recorder.record(entry(ActivityKind::MessageFail)).await;
    }
}
