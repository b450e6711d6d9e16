// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state. Authentication and role
//! guards are external collaborators; handlers trust the acting user id in
//! the request payload.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use courier_audit::ActivityRecorder;
use courier_channels::line::LineClient;
use courier_core::CourierError;
use courier_dispatch::Dispatcher;
use courier_scheduler::Scheduler;
use courier_storage::Database;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub db: Arc<Database>,
    pub dispatcher: Arc<Dispatcher>,
    pub scheduler: Arc<Scheduler>,
    pub audit: ActivityRecorder,
    /// Used by the LINE webhook for best-effort profile lookups.
    pub line: LineClient,
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/api/messages/send", post(handlers::post_send_message))
        .route("/api/messages/inbound", post(handlers::post_inbound_message))
        .route("/api/messages", get(handlers::get_messages))
        .route("/api/schedules", post(handlers::post_schedule))
        .route("/api/schedules", get(handlers::get_schedules))
        .route("/api/schedules/run-now", post(handlers::post_run_now))
        .route("/api/schedules/{id}/cancel", post(handlers::post_cancel_schedule))
        .route(
            "/api/schedules/{id}/reschedule",
            post(handlers::post_reschedule),
        )
        .route(
            "/webhooks/line/{integration_id}",
            post(handlers::post_line_webhook),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve the gateway.
pub async fn start_server(
    bind_address: &str,
    port: u16,
    state: GatewayState,
) -> Result<(), CourierError> {
    let addr = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| CourierError::Internal(format!("gateway server error: {e}")))
}
