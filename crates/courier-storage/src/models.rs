// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `courier-core::types` for use across
//! crate boundaries. This module re-exports them for convenience within the
//! storage crate.

pub use courier_core::types::{
    ActivityEntry, Attachment, EmailContact, Integration, LineContact, MessageLog, NewActivity,
    ScheduleRecipient, ScheduledMessage, User,
};
