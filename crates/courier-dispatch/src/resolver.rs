// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient resolution: expands a send request into a flat, deduplicated
//! list of delivery targets.
//!
//! Unknown user or group ids expand to nothing rather than erroring; callers
//! that need strict feedback must pre-validate existence.

use std::collections::HashSet;

use courier_core::types::ScheduleRecipient;
use courier_core::{CourierError, DeliveryTarget};
use courier_storage::{queries::directory, Database};

/// An ad-hoc email recipient as submitted by the caller.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct EmailRecipientInput {
    pub email: String,
    #[serde(default)]
    pub contact_id: Option<String>,
}

/// An ad-hoc LINE recipient as submitted by the caller.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LineRecipientInput {
    pub line_user_id: String,
    #[serde(default)]
    pub contact_id: Option<String>,
}

/// The recipient sets of a send request. Each set is order-irrelevant;
/// duplicates are removed by identity during resolution.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SendRecipients {
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub email_recipients: Vec<EmailRecipientInput>,
    #[serde(default)]
    pub line_recipients: Vec<LineRecipientInput>,
}

/// Order-preserving dedup that also drops empty values.
pub fn unique(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}

/// Resolve a manual send request into concrete delivery targets.
///
/// A user reachable both directly and via a group (or via two groups) yields
/// one target per path: channel attribution differs, and each path gets its
/// own log row. Email addresses are normalized to lowercase and deduplicated
/// first-wins; LINE recipients are deduplicated by user id.
pub async fn resolve(
    db: &Database,
    recipients: &SendRecipients,
) -> Result<Vec<DeliveryTarget>, CourierError> {
    let direct_user_ids = unique(&recipients.user_ids);
    let group_ids = unique(&recipients.group_ids);
    let member_map = directory::group_members(db, &group_ids).await?;

    let mut targets = Vec::new();

    for user_id in direct_user_ids {
        targets.push(DeliveryTarget::DirectUser { user_id });
    }

    for group_id in &group_ids {
        let Some(members) = member_map.get(group_id) else {
            continue;
        };
        for user_id in members {
            targets.push(DeliveryTarget::GroupMember {
                user_id: user_id.clone(),
                group_id: group_id.clone(),
            });
        }
    }

    let mut seen_emails = HashSet::new();
    for recipient in &recipients.email_recipients {
        let address = recipient.email.trim().to_lowercase();
        if address.is_empty() || !seen_emails.insert(address.clone()) {
            continue;
        }
        targets.push(DeliveryTarget::Email {
            address,
            contact_id: recipient.contact_id.clone(),
        });
    }

    let mut seen_line_ids = HashSet::new();
    for recipient in &recipients.line_recipients {
        let line_user_id = recipient.line_user_id.trim().to_string();
        if line_user_id.is_empty() || !seen_line_ids.insert(line_user_id.clone()) {
            continue;
        }
        targets.push(DeliveryTarget::Line {
            line_user_id,
            contact_id: recipient.contact_id.clone(),
        });
    }

    Ok(targets)
}

/// A resolved scheduled-delivery target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTarget {
    pub user_id: String,
    pub group_id: Option<String>,
}

/// Expand a scheduled message's recipient set.
///
/// Unlike manual sends, scheduled expansion deduplicates by user id across
/// the whole message: direct entries win over group paths, and the first
/// group containing a user claims the attribution.
pub async fn resolve_scheduled(
    db: &Database,
    recipients: &[ScheduleRecipient],
) -> Result<Vec<ScheduledTarget>, CourierError> {
    let mut direct = Vec::new();
    let mut groups = Vec::new();
    for recipient in recipients {
        match recipient {
            ScheduleRecipient::User { user_id } if !user_id.is_empty() => {
                direct.push(user_id.clone())
            }
            ScheduleRecipient::Group { group_id } if !group_id.is_empty() => {
                groups.push(group_id.clone())
            }
            _ => {}
        }
    }

    let group_ids = unique(&groups);
    let member_map = directory::group_members(db, &group_ids).await?;

    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for user_id in unique(&direct) {
        if seen.insert(user_id.clone()) {
            targets.push(ScheduledTarget {
                user_id,
                group_id: None,
            });
        }
    }

    for group_id in &group_ids {
        let Some(members) = member_map.get(group_id) else {
            continue;
        };
        for user_id in members {
            if seen.insert(user_id.clone()) {
                targets.push(ScheduledTarget {
                    user_id: user_id.clone(),
                    group_id: Some(group_id.clone()),
                });
            }
        }
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_test_utils::{insert_group, insert_user, TestDb};

    async fn seeded() -> TestDb {
        let harness = TestDb::new().await;
        let db = &harness.db;
        insert_user(db, "u1", "alice", Some("alice@example.com"), None).await;
        insert_user(db, "u2", "bob", None, None).await;
        insert_user(db, "u3", "carol", None, None).await;
        insert_group(db, "g1", "ops", &["u1", "u2"]).await;
        insert_group(db, "g2", "dev", &["u1", "u3"]).await;
        harness
    }

    #[tokio::test]
    async fn manual_resolution_keeps_per_group_attribution() {
        let harness = seeded().await;
        let recipients = SendRecipients {
            user_ids: vec!["u1".into(), "u1".into()],
            group_ids: vec!["g1".into(), "g2".into()],
            ..Default::default()
        };

        let targets = resolve(&harness.db, &recipients).await.unwrap();

        // u1 appears three times: direct, via g1, via g2.
        let u1_paths = targets
            .iter()
            .filter(|t| {
                matches!(t,
                    DeliveryTarget::DirectUser { user_id }
                    | DeliveryTarget::GroupMember { user_id, .. } if user_id == "u1")
            })
            .count();
        assert_eq!(u1_paths, 3);
        assert_eq!(targets.len(), 5); // u1 direct, g1:{u1,u2}, g2:{u1,u3}
    }

    #[tokio::test]
    async fn unknown_groups_expand_to_nothing() {
        let harness = seeded().await;
        let recipients = SendRecipients {
            group_ids: vec!["missing".into()],
            ..Default::default()
        };
        let targets = resolve(&harness.db, &recipients).await.unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn email_recipients_normalize_and_dedupe() {
        let harness = seeded().await;
        let recipients = SendRecipients {
            email_recipients: vec![
                EmailRecipientInput {
                    email: "A@x.com".into(),
                    contact_id: Some("c1".into()),
                },
                EmailRecipientInput {
                    email: "a@x.com".into(),
                    contact_id: Some("c2".into()),
                },
                EmailRecipientInput {
                    email: "  ".into(),
                    contact_id: None,
                },
            ],
            ..Default::default()
        };

        let targets = resolve(&harness.db, &recipients).await.unwrap();
        assert_eq!(
            targets,
            vec![DeliveryTarget::Email {
                address: "a@x.com".into(),
                contact_id: Some("c1".into()), // first occurrence wins
            }]
        );
    }

    #[tokio::test]
    async fn line_recipients_dedupe_by_id() {
        let harness = seeded().await;
        let recipients = SendRecipients {
            line_recipients: vec![
                LineRecipientInput {
                    line_user_id: "Uaaa".into(),
                    contact_id: None,
                },
                LineRecipientInput {
                    line_user_id: "Uaaa".into(),
                    contact_id: Some("lc1".into()),
                },
            ],
            ..Default::default()
        };
        let targets = resolve(&harness.db, &recipients).await.unwrap();
        assert_eq!(targets.len(), 1);
    }

    #[tokio::test]
    async fn scheduled_resolution_dedupes_across_whole_message() {
        let harness = seeded().await;
        let recipients = vec![
            ScheduleRecipient::User {
                user_id: "u1".into(),
            },
            ScheduleRecipient::Group {
                group_id: "g1".into(),
            },
            ScheduleRecipient::Group {
                group_id: "g2".into(),
            },
        ];

        let targets = resolve_scheduled(&harness.db, &recipients).await.unwrap();

        // u1 once (direct wins), u2 via g1, u3 via g2.
        assert_eq!(targets.len(), 3);
        assert_eq!(
            targets[0],
            ScheduledTarget {
                user_id: "u1".into(),
                group_id: None
            }
        );
        assert!(targets.contains(&ScheduledTarget {
            user_id: "u2".into(),
            group_id: Some("g1".into())
        }));
        assert!(targets.contains(&ScheduledTarget {
            user_id: "u3".into(),
            group_id: Some("g2".into())
        }));
    }
}
