// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-directory database harness and directory seeding helpers.
//!
//! Users, groups, contacts, and integrations are owned by external
//! collaborators in production; tests seed them directly.

use std::sync::Arc;

use rusqlite::params;

use courier_core::IntegrationKind;
use courier_storage::Database;

/// A migrated SQLite database in a temp directory that lives as long as the
/// harness value.
pub struct TestDb {
    pub db: Arc<Database>,
    _dir: tempfile::TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("courier-test.db");
        let db = Database::open(db_path.to_str().expect("utf-8 temp path"))
            .await
            .expect("open test database");
        Self {
            db: Arc::new(db),
            _dir: dir,
        }
    }
}

/// Seed a user row.
pub async fn insert_user(
    db: &Database,
    id: &str,
    username: &str,
    email: Option<&str>,
    line_user_id: Option<&str>,
) {
    let (id, username) = (id.to_string(), username.to_string());
    let email = email.map(str::to_string);
    let line_user_id = line_user_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, line_user_id) VALUES (?1, ?2, ?3, ?4)",
                params![id, username, email, line_user_id],
            )?;
            Ok(())
        })
        .await
        .expect("insert user");
}

/// Seed a group with the given members (members must already exist).
pub async fn insert_group(db: &Database, id: &str, name: &str, member_ids: &[&str]) {
    let (id, name) = (id.to_string(), name.to_string());
    let members: Vec<String> = member_ids.iter().map(|m| m.to_string()).collect();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO user_groups (id, name) VALUES (?1, ?2)",
                params![id, name],
            )?;
            for member in &members {
                conn.execute(
                    "INSERT INTO group_members (group_id, user_id) VALUES (?1, ?2)",
                    params![id, member],
                )?;
            }
            Ok(())
        })
        .await
        .expect("insert group");
}

/// Seed an email contact.
pub async fn insert_email_contact(db: &Database, id: &str, owner_id: &str, email: &str) {
    let (id, owner_id, email) = (id.to_string(), owner_id.to_string(), email.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO email_contacts (id, owner_id, email) VALUES (?1, ?2, ?3)",
                params![id, owner_id, email],
            )?;
            Ok(())
        })
        .await
        .expect("insert email contact");
}

/// Seed an integration with opaque credential/config maps.
pub async fn insert_integration(
    db: &Database,
    id: &str,
    owner_id: &str,
    kind: IntegrationKind,
    is_connected: bool,
    credentials: serde_json::Value,
    config: serde_json::Value,
) {
    let (id, owner_id, kind) = (id.to_string(), owner_id.to_string(), kind.to_string());
    let (credentials, config) = (credentials.to_string(), config.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO integrations
                     (id, owner_id, kind, is_connected, credentials, config, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                params![id, owner_id, kind, is_connected, credentials, config],
            )?;
            Ok(())
        })
        .await
        .expect("insert integration");
}
