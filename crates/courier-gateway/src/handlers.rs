// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use courier_channels::line::{verify_signature, LineCredentials};
use courier_core::types::{now_iso, Attachment, ScheduleRecipient};
use courier_core::{CourierError, MessageLog, ScheduleStatus, ScheduledMessage};
use courier_dispatch::{DispatchSummary, SendMessageParams, SendRecipients};
use courier_scheduler::CreateScheduleParams;
use courier_storage::queries::{directory, integrations, message_logs, schedules};

use crate::server::GatewayState;

const MAX_LIST_LIMIT: i64 = 200;
const DEFAULT_LIST_LIMIT: i64 = 50;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a core error onto an HTTP response.
fn error_response(err: CourierError) -> Response {
    let status = match &err {
        CourierError::Validation(_) | CourierError::Config(_) | CourierError::Disabled(_) => {
            StatusCode::BAD_REQUEST
        }
        CourierError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => {
            tracing::error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Request body for POST /api/messages/send.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub actor_id: String,
    #[serde(flatten)]
    pub recipients: SendRecipients,
    #[serde(default)]
    pub allow_broadcast: bool,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub integration_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// POST /api/messages/send
pub async fn post_send_message(
    State(state): State<GatewayState>,
    Json(body): Json<SendMessageRequest>,
) -> Response {
    let params = SendMessageParams {
        recipients: body.recipients,
        allow_broadcast: body.allow_broadcast,
        title: body.title,
        integration_id: body.integration_id,
        attachments: body.attachments,
        ..SendMessageParams::manual(body.actor_id, body.content)
    };

    match state.dispatcher.send(params).await {
        Ok(summary) => (StatusCode::CREATED, Json(SendMessageResponse { result: summary }))
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Response body for POST /api/messages/send.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub result: DispatchSummary,
}

/// Request body for POST /api/messages/inbound.
#[derive(Debug, Deserialize)]
pub struct InboundMessageRequest {
    pub user_id: String,
    pub content: String,
}

/// POST /api/messages/inbound
pub async fn post_inbound_message(
    State(state): State<GatewayState>,
    Json(body): Json<InboundMessageRequest>,
) -> Response {
    match state.dispatcher.log_inbound(&body.user_id, &body.content).await {
        Ok(log) => (StatusCode::CREATED, Json(MessageLogResponse { message: log }))
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Response wrapper for a single log row.
#[derive(Debug, Serialize)]
pub struct MessageLogResponse {
    pub message: MessageLog,
}

/// Query parameters for listing endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub admin_id: Option<String>,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
}

/// GET /api/messages
pub async fn get_messages(
    State(state): State<GatewayState>,
    Query(query): Query<ListQuery>,
) -> Response {
    match message_logs::list_recent(&state.db, clamp_limit(query.limit)).await {
        Ok(messages) => Json(MessageListResponse { messages }).into_response(),
        Err(e) => error_response(e),
    }
}

/// Response body for GET /api/messages.
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageLog>,
}

/// Request body for POST /api/schedules.
#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub admin_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    pub schedule_at: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
}

/// Response wrapper for a scheduled message with its recipient set.
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub scheduled_message: ScheduledMessage,
    pub recipients: Vec<ScheduleRecipient>,
}

/// POST /api/schedules
pub async fn post_schedule(
    State(state): State<GatewayState>,
    Json(body): Json<CreateScheduleRequest>,
) -> Response {
    let params = CreateScheduleParams {
        admin_id: body.admin_id,
        title: body.title,
        content: body.content,
        schedule_at: body.schedule_at,
        user_ids: body.user_ids,
        group_ids: body.group_ids,
    };

    match courier_scheduler::create_scheduled_message(&state.db, &state.audit, params).await {
        Ok((scheduled_message, recipients)) => (
            StatusCode::CREATED,
            Json(ScheduleResponse {
                scheduled_message,
                recipients,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/schedules
pub async fn get_schedules(
    State(state): State<GatewayState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let Some(admin_id) = query.admin_id else {
        return error_response(CourierError::Validation("admin_id is required.".into()));
    };
    match schedules::list(&state.db, &admin_id, query.status, clamp_limit(query.limit)).await {
        Ok(messages) => Json(ScheduleListResponse { messages }).into_response(),
        Err(e) => error_response(e),
    }
}

/// Response body for GET /api/schedules.
#[derive(Debug, Serialize)]
pub struct ScheduleListResponse {
    pub messages: Vec<ScheduledMessage>,
}

/// Request body for cancel/reschedule operations.
#[derive(Debug, Deserialize)]
pub struct ScheduleActionRequest {
    pub admin_id: String,
    #[serde(default)]
    pub schedule_at: Option<String>,
}

/// POST /api/schedules/{id}/cancel
pub async fn post_cancel_schedule(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ScheduleActionRequest>,
) -> Response {
    match courier_scheduler::cancel_scheduled_message(&state.db, &state.audit, &id, &body.admin_id)
        .await
    {
        Ok(scheduled_message) => schedule_response(&state, scheduled_message).await,
        Err(e) => error_response(e),
    }
}

async fn schedule_response(state: &GatewayState, scheduled_message: ScheduledMessage) -> Response {
    match schedules::recipients(&state.db, &scheduled_message.id).await {
        Ok(recipients) => Json(ScheduleResponse {
            scheduled_message,
            recipients,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/schedules/{id}/reschedule
pub async fn post_reschedule(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ScheduleActionRequest>,
) -> Response {
    let Some(schedule_at) = body.schedule_at else {
        return error_response(CourierError::Validation("schedule_at is required.".into()));
    };
    match courier_scheduler::reschedule_scheduled_message(
        &state.db,
        &id,
        &body.admin_id,
        &schedule_at,
    )
    .await
    {
        Ok(scheduled_message) => schedule_response(&state, scheduled_message).await,
        Err(e) => error_response(e),
    }
}

/// POST /api/schedules/run-now
///
/// On-demand poll over the identical due-query path the timer uses.
pub async fn post_run_now(State(state): State<GatewayState>) -> Response {
    match state.scheduler.process_due().await {
        Ok(processed) => Json(serde_json::json!({
            "message": "Scheduler run completed.",
            "processed": processed,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    match state.db.health_check().await {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /webhooks/line/{integration_id}
///
/// Verifies the `x-line-signature` HMAC before touching the payload, then
/// best-effort upserts a LINE contact per event source user.
pub async fn post_line_webhook(
    State(state): State<GatewayState>,
    Path(integration_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let integration = match integrations::get(&state.db, &integration_id).await {
        Ok(Some(integration)) if integration.kind == courier_core::IntegrationKind::Line => {
            integration
        }
        Ok(_) => {
            return error_response(CourierError::NotFound("Integration not found.".into()));
        }
        Err(e) => return error_response(e),
    };

    let credentials = match LineCredentials::from_integration(&integration) {
        Ok(credentials) => credentials,
        Err(_) => {
            return error_response(CourierError::Config(
                "LINE integration missing credentials.".into(),
            ));
        }
    };
    let Some(channel_secret) = credentials.channel_secret.as_deref() else {
        return error_response(CourierError::Config(
            "LINE integration missing credentials.".into(),
        ));
    };

    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_signature(channel_secret, &body, signature) {
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Invalid signature.".into(),
            }),
        )
            .into_response();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => serde_json::json!({}),
    };
    let events = payload
        .get("events")
        .and_then(|e| e.as_array())
        .cloned()
        .unwrap_or_default();

    for event in &events {
        for line_user_id in extract_user_ids(event) {
            // Profile fetch is best-effort; an id-only upsert still records
            // the contact.
            let profile = state
                .line
                .profile(&credentials.channel_access_token, &line_user_id)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "LINE profile fetch failed");
                    Default::default()
                });

            let update = directory::LineProfileUpdate {
                display_name: profile.display_name,
                picture_url: profile.picture_url,
                language: profile.language,
                status_message: profile.status_message,
            };
            if let Err(e) = directory::upsert_line_contact(
                &state.db,
                &integration.owner_id,
                &integration.id,
                &line_user_id,
                update,
                &now_iso(),
            )
            .await
            {
                tracing::error!(error = %e, line_user_id, "LINE contact upsert failed");
            }
        }
    }

    Json(serde_json::json!({ "received": events.len() })).into_response()
}

/// User ids referenced by a webhook event: the source user plus any newly
/// joined members.
fn extract_user_ids(event: &serde_json::Value) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(user_id) = event
        .get("source")
        .and_then(|s| s.get("userId"))
        .and_then(|v| v.as_str())
    {
        ids.push(user_id.to_string());
    }
    if let Some(members) = event
        .get("joined")
        .and_then(|j| j.get("members"))
        .and_then(|m| m.as_array())
    {
        for member in members {
            if let Some(user_id) = member.get("userId").and_then(|v| v.as_str()) {
                if !ids.iter().any(|existing| existing == user_id) {
                    ids.push(user_id.to_string());
                }
            }
        }
    }
    ids
}
