// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Courier workspace.
//!
//! Enum wire values are SCREAMING_SNAKE_CASE strings, both in the database
//! and in API payloads.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Maximum length of error text persisted on a log row or scheduled message.
pub const MAX_ERROR_LEN: usize = 500;

/// Truncate error text to [`MAX_ERROR_LEN`] characters (multibyte-safe).
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_LEN).collect()
}

/// Generate a new v4 UUID string identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC time as an ISO-8601 string (`2026-01-01T00:00:00.000Z`).
///
/// All timestamps are stored in this format; it sorts lexicographically,
/// which the due-message query relies on.
pub fn now_iso() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Parse an ISO-8601/RFC 3339 timestamp into a UTC datetime.
pub fn parse_iso(value: &str) -> Result<chrono::DateTime<chrono::Utc>, crate::CourierError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| crate::CourierError::Validation(format!("invalid timestamp `{value}`: {e}")))
}

/// Format a UTC datetime in the storage timestamp format.
pub fn format_iso(value: chrono::DateTime<chrono::Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// The kind of messaging integration an admin has connected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationKind {
    Email,
    Line,
    Discord,
    Facebook,
}

impl IntegrationKind {
    /// Whether sends through this integration require an out-of-process
    /// delivery step. Such rows are created PENDING and moved to a terminal
    /// status by the matching delivery driver.
    pub fn requires_delivery(self) -> bool {
        matches!(self, Self::Email | Self::Line | Self::Discord)
    }
}

/// Delivery state of a single message log row.
///
/// PENDING transitions at most once, to SENT or FAILED; both are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// Channel attribution of a log row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageChannel {
    Direct,
    Group,
    Broadcast,
}

/// Direction of a log row relative to this service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// How a send was initiated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageSource {
    Manual,
    Scheduled,
}

/// Lifecycle state of a scheduled message.
///
/// PENDING -> PROCESSING -> {SENT, FAILED}; CANCELLED is reachable from any
/// non-terminal state; SENT and CANCELLED are terminal and reject reschedule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Cancelled,
}

impl ScheduleStatus {
    /// Terminal for rescheduling purposes: SENT and CANCELLED reject it.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Cancelled)
    }
}

/// Kind of an activity-log entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    MessageSend,
    MessageReceive,
    MessageFail,
}

/// A concrete delivery target produced by recipient resolution.
///
/// Exactly one recipient identity per variant; a group id is context
/// metadata on a member target, never a target itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
    /// A directly addressed platform user.
    DirectUser { user_id: String },
    /// A platform user reached through group membership. The same user in
    /// two groups yields two targets with distinct group attribution.
    GroupMember { user_id: String, group_id: String },
    /// An ad-hoc email address (normalized lowercase), optionally linked to
    /// a contact-book entry.
    Email {
        address: String,
        contact_id: Option<String>,
    },
    /// A LINE user id, optionally linked to a contact-book entry.
    Line {
        line_user_id: String,
        contact_id: Option<String>,
    },
    /// The Discord-only fallback when no explicit recipients resolved:
    /// exactly one broadcast row with no recipient identity.
    Broadcast,
}

/// One row per (logical send, resolved recipient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: String,
    pub sender_id: Option<String>,
    pub recipient_user_id: Option<String>,
    pub recipient_group_id: Option<String>,
    pub recipient_email: Option<String>,
    pub email_contact_id: Option<String>,
    pub line_recipient_id: Option<String>,
    pub line_contact_id: Option<String>,
    pub direction: MessageDirection,
    pub channel: MessageChannel,
    pub source: MessageSource,
    pub title: Option<String>,
    pub content: String,
    pub integration_id: Option<String>,
    pub scheduled_message_id: Option<String>,
    pub status: MessageStatus,
    pub error: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
}

/// Attachment metadata fanned out to each log row of a send.
///
/// Files themselves are uploaded by an external collaborator; only the
/// stored filename, public URL, and MIME metadata flow through dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A scheduled send intent owned by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: String,
    pub admin_id: String,
    pub title: Option<String>,
    pub content: String,
    pub schedule_at: String,
    pub status: ScheduleStatus,
    pub last_processed_at: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

/// A recipient of a scheduled message: either a direct user or a group
/// whose membership is expanded at delivery time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "recipient_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleRecipient {
    User { user_id: String },
    Group { group_id: String },
}

/// A connected messaging integration, consumed read-only by dispatch.
///
/// `credentials` and `config` are opaque JSON maps; each channel validates
/// only the fields it needs through its own typed parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub owner_id: String,
    pub kind: IntegrationKind,
    pub is_connected: bool,
    pub credentials: serde_json::Value,
    pub config: serde_json::Value,
    pub created_at: String,
}

impl Integration {
    /// Look up a string credential by key.
    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials.get(key).and_then(|v| v.as_str())
    }

    /// Look up a string config value by key.
    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

/// A platform user from the directory (external collaborator data).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub line_user_id: Option<String>,
}

/// An email contact-book entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailContact {
    pub id: String,
    pub owner_id: String,
    pub name: Option<String>,
    pub email: String,
}

/// A LINE contact-book entry, upserted from webhook events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineContact {
    pub id: String,
    pub owner_id: String,
    pub integration_id: String,
    pub line_user_id: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    pub language: Option<String>,
    pub status_message: Option<String>,
    pub last_event_at: Option<String>,
}

/// A new activity-log entry. Recording is best-effort and never blocks
/// the flow that produced it.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub actor_id: Option<String>,
    pub entity_id: Option<String>,
    pub entity_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A persisted activity-log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub kind: ActivityKind,
    pub actor_id: Option<String>,
    pub entity_id: Option<String>,
    pub entity_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enum_wire_values_round_trip() {
        for status in [
            ScheduleStatus::Pending,
            ScheduleStatus::Processing,
            ScheduleStatus::Sent,
            ScheduleStatus::Failed,
            ScheduleStatus::Cancelled,
        ] {
            let s = status.to_string();
            assert_eq!(s, s.to_uppercase());
            assert_eq!(ScheduleStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(IntegrationKind::Email.to_string(), "EMAIL");
        assert_eq!(MessageStatus::Pending.to_string(), "PENDING");
        assert_eq!(MessageChannel::Broadcast.to_string(), "BROADCAST");
        assert_eq!(MessageSource::Scheduled.to_string(), "SCHEDULED");
        assert_eq!(ActivityKind::MessageSend.to_string(), "MESSAGE_SEND");
    }

    #[test]
    fn requires_delivery_only_for_async_channels() {
        assert!(IntegrationKind::Email.requires_delivery());
        assert!(IntegrationKind::Line.requires_delivery());
        assert!(IntegrationKind::Discord.requires_delivery());
        assert!(!IntegrationKind::Facebook.requires_delivery());
    }

    #[test]
    fn truncate_error_is_multibyte_safe() {
        let long = "é".repeat(600);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_LEN);

        let short = "transport unreachable";
        assert_eq!(truncate_error(short), short);
    }

    #[test]
    fn now_iso_parses_back() {
        let now = now_iso();
        assert!(now.ends_with('Z'));
        assert!(parse_iso(&now).is_ok());
        assert!(parse_iso("2026-01-01T00:00:00Z").is_ok());
        assert!(parse_iso("not-a-time").is_err());
    }

    #[test]
    fn schedule_recipient_serializes_tagged() {
        let user = ScheduleRecipient::User {
            user_id: "u1".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"recipient_type\":\"USER\""));
        assert!(json.contains("\"user_id\":\"u1\""));

        let group: ScheduleRecipient =
            serde_json::from_str(r#"{"recipient_type":"GROUP","group_id":"g1"}"#).unwrap();
        assert_eq!(
            group,
            ScheduleRecipient::Group {
                group_id: "g1".into()
            }
        );
    }

    #[test]
    fn integration_credential_lookup() {
        let integration = Integration {
            id: "i1".into(),
            owner_id: "admin".into(),
            kind: IntegrationKind::Line,
            is_connected: true,
            credentials: serde_json::json!({ "channelAccessToken": "tok" }),
            config: serde_json::json!({}),
            created_at: now_iso(),
        };
        assert_eq!(integration.credential("channelAccessToken"), Some("tok"));
        assert_eq!(integration.credential("webhookUrl"), None);
        assert_eq!(integration.config_value("fromEmail"), None);
    }
}
