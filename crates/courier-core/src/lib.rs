// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier dispatch service.
//!
//! Defines the error taxonomy and the domain types shared by the storage,
//! dispatch, scheduler, and gateway crates.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    ActivityKind, DeliveryTarget, Integration, IntegrationKind, MessageChannel, MessageDirection,
    MessageLog, MessageSource, MessageStatus, ScheduleRecipient, ScheduleStatus, ScheduledMessage,
};
