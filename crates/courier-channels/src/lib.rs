// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-level delivery clients for the Courier dispatch service.
//!
//! One module per channel: SMTP email via lettre, LINE push via the
//! Messaging API, and Discord webhooks. Each channel owns a typed
//! credential/config parser that validates an integration's opaque maps
//! before any delivery is attempted.

pub mod discord;
pub mod email;
pub mod line;

pub use discord::{DiscordCredentials, DiscordWebhook, DISCORD_MAX_CONTENT_LEN};
pub use email::{
    EmailAttachment, EmailCredentials, EmailSettings, Mailer, MailerCache, MailerProvider,
    OutgoingEmail, SmtpMailer,
};
pub use line::{LineClient, LineCredentials, LineProfile};
