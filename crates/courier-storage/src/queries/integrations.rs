// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read access to integration records.
//!
//! Integration CRUD is owned by an external collaborator; dispatch only
//! consumes these rows as capability descriptors.

use rusqlite::params;

use courier_core::CourierError;

use crate::database::{map_tr_err, Database};
use crate::models::Integration;
use crate::queries::{parse_column, parse_json};

fn integration_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Integration> {
    Ok(Integration {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        kind: parse_column(2, row.get::<_, String>(2)?)?,
        is_connected: row.get(3)?,
        credentials: parse_json(4, row.get::<_, String>(4)?)?,
        config: parse_json(5, row.get::<_, String>(5)?)?,
        created_at: row.get(6)?,
    })
}

/// Fetch an integration by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Integration>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, kind, is_connected, credentials, config, created_at
                 FROM integrations WHERE id = ?1",
            )?;
            let mut rows = stmt.query_map(params![id], integration_from_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::IntegrationKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn get_parses_kind_and_json_maps() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("integrations.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        db.connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO integrations (id, owner_id, kind, is_connected, credentials, config, created_at)
                     VALUES ('i1', 'admin-1', 'LINE', 1,
                             '{\"channelAccessToken\":\"tok\"}', '{}',
                             '2026-01-01T00:00:00.000Z')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let integration = get(&db, "i1").await.unwrap().unwrap();
        assert_eq!(integration.kind, IntegrationKind::Line);
        assert!(integration.is_connected);
        assert_eq!(integration.credential("channelAccessToken"), Some("tok"));

        assert!(get(&db, "missing").await.unwrap().is_none());
    }
}
