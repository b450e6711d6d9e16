// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read access to the user/group/contact directory, plus the LINE-contact
//! upsert fed by webhook events.
//!
//! Users, groups, and contacts are owned by external collaborators; the
//! resolver only consumes their membership and address data.

use std::collections::HashMap;

use rusqlite::params;

use courier_core::CourierError;

use crate::database::{map_tr_err, Database};
use crate::models::{EmailContact, LineContact, User};

/// Fetch a user by id.
pub async fn get_user(db: &Database, id: &str) -> Result<Option<User>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, name, email, line_user_id FROM users WHERE id = ?1",
            )?;
            let mut rows = stmt.query_map(params![id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    name: row.get(2)?,
                    email: row.get(3)?,
                    line_user_id: row.get(4)?,
                })
            })?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Current membership of each given group, keyed by group id.
///
/// Unknown group ids simply do not appear in the map; resolving them is
/// silently an empty expansion, not an error.
pub async fn group_members(
    db: &Database,
    group_ids: &[String],
) -> Result<HashMap<String, Vec<String>>, CourierError> {
    if group_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let group_ids = group_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut map: HashMap<String, Vec<String>> = HashMap::new();
            let mut stmt = conn.prepare(
                "SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY rowid",
            )?;
            for group_id in &group_ids {
                let rows = stmt.query_map(params![group_id], |row| row.get::<_, String>(0))?;
                let mut members = Vec::new();
                for row in rows {
                    members.push(row?);
                }
                if !members.is_empty() {
                    map.insert(group_id.clone(), members);
                }
            }
            Ok(map)
        })
        .await
        .map_err(map_tr_err)
}

/// LINE user ids for the given platform users, keyed by user id.
/// Users without a linked LINE account are absent.
pub async fn line_user_ids(
    db: &Database,
    user_ids: &[String],
) -> Result<HashMap<String, String>, CourierError> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let user_ids = user_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut map = HashMap::new();
            let mut stmt =
                conn.prepare("SELECT line_user_id FROM users WHERE id = ?1")?;
            for user_id in &user_ids {
                let line_id: Option<Option<String>> = stmt
                    .query_map(params![user_id], |row| row.get(0))?
                    .next()
                    .transpose()?;
                if let Some(Some(line_id)) = line_id {
                    map.insert(user_id.clone(), line_id);
                }
            }
            Ok(map)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch an email contact by id.
pub async fn get_email_contact(
    db: &Database,
    id: &str,
) -> Result<Option<EmailContact>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id, owner_id, name, email FROM email_contacts WHERE id = ?1")?;
            let mut rows = stmt.query_map(params![id], |row| {
                Ok(EmailContact {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    email: row.get(3)?,
                })
            })?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Profile fields applied on LINE-contact upsert.
#[derive(Debug, Clone, Default)]
pub struct LineProfileUpdate {
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    pub language: Option<String>,
    pub status_message: Option<String>,
}

/// Insert or refresh a LINE contact keyed by (integration, LINE user id).
///
/// Profile fields only overwrite existing values when the new value is
/// present; `last_event_at` always advances.
pub async fn upsert_line_contact(
    db: &Database,
    owner_id: &str,
    integration_id: &str,
    line_user_id: &str,
    profile: LineProfileUpdate,
    now: &str,
) -> Result<(), CourierError> {
    let owner_id = owner_id.to_string();
    let integration_id = integration_id.to_string();
    let line_user_id = line_user_id.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO line_contacts
                     (id, owner_id, integration_id, line_user_id, display_name,
                      picture_url, language, status_message, last_event_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                 ON CONFLICT (integration_id, line_user_id) DO UPDATE SET
                     display_name = COALESCE(excluded.display_name, display_name),
                     picture_url = COALESCE(excluded.picture_url, picture_url),
                     language = COALESCE(excluded.language, language),
                     status_message = COALESCE(excluded.status_message, status_message),
                     last_event_at = excluded.last_event_at",
                params![
                    courier_core::types::new_id(),
                    owner_id,
                    integration_id,
                    line_user_id,
                    profile.display_name,
                    profile.picture_url,
                    profile.language,
                    profile.status_message,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a LINE contact by (integration, LINE user id).
pub async fn get_line_contact(
    db: &Database,
    integration_id: &str,
    line_user_id: &str,
) -> Result<Option<LineContact>, CourierError> {
    let integration_id = integration_id.to_string();
    let line_user_id = line_user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, integration_id, line_user_id, display_name,
                        picture_url, language, status_message, last_event_at
                 FROM line_contacts WHERE integration_id = ?1 AND line_user_id = ?2",
            )?;
            let mut rows = stmt.query_map(params![integration_id, line_user_id], |row| {
                Ok(LineContact {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    integration_id: row.get(2)?,
                    line_user_id: row.get(3)?,
                    display_name: row.get(4)?,
                    picture_url: row.get(5)?,
                    language: row.get(6)?,
                    status_message: row.get(7)?,
                    last_event_at: row.get(8)?,
                })
            })?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}
