// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled-message subsystem: operations and the polling runner.

pub mod ops;
pub mod runner;

pub use ops::{
    cancel_scheduled_message, create_scheduled_message, reschedule_scheduled_message,
    CreateScheduleParams,
};
pub use runner::Scheduler;
