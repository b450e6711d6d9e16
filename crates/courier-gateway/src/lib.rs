// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Courier dispatch service.
//!
//! Exposes manual dispatch, inbound logging, schedule management, the
//! on-demand scheduler trigger, and the LINE webhook.

pub mod handlers;
pub mod server;

pub use server::{router, start_server, GatewayState};
