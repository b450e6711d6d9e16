// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient resolution and the message dispatch engine.
//!
//! A send request flows through the resolver (flat, deduplicated delivery
//! targets), the engine (validation, atomic per-recipient log-row creation),
//! and the per-channel delivery drivers (independent terminal status per
//! row). The scheduler crate drives the same storage through its own
//! direct-to-user path.

pub mod delivery;
pub mod engine;
pub mod resolver;

pub use delivery::DeliveryContext;
pub use engine::{DispatchSummary, Dispatcher, DispatcherConfig, SendMessageParams};
pub use resolver::{EmailRecipientInput, LineRecipientInput, SendRecipients};
