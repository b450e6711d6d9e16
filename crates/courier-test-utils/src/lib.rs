// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.

pub mod harness;
pub mod mock_mailer;

pub use harness::{
    insert_email_contact, insert_group, insert_integration, insert_user, TestDb,
};
pub use mock_mailer::{MockMailer, MockMailerProvider};
