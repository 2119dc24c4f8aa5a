// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers.
//!
//! Every mutation goes through the store first and then through the
//! [`Dispatcher`](mensager_bus::Dispatcher), which owns the event scopes.

use std::collections::BTreeSet;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use mensager_core::{
    ConversationId, ConversationStatus, HealthStatus, InboxId, MensagerError, MessageId,
    MessageType, NewContact, NewMessage, SenderType,
};
use mensager_ingest::IngestOutcome;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::server::GatewayState;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub subscribers: usize,
    pub dropped_events: u64,
    pub storage: String,
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> Response {
    let (status, storage) = match state.store.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => {
            (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {reason}"))
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {e}")),
    };
    let body = HealthResponse {
        status: if status == StatusCode::OK { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        subscribers: state.hub.subscriber_count(),
        dropped_events: state.hub.dropped_total(),
        storage,
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    pub inbox_id: i64,
}

/// POST /webhooks/evolution?inbox_id=N
///
/// Acknowledges ingested, duplicate and ignored deliveries alike. Only a
/// malformed payload, an unknown inbox or a storage failure is an error.
pub async fn evolution_webhook(
    State(state): State<GatewayState>,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let outcome = state
        .pipeline
        .handle_webhook(InboxId(query.inbox_id), &body)
        .await
        .inspect_err(|e| warn!(inbox_id = query.inbox_id, error = %e, "webhook rejected"))?;

    let result = match outcome {
        IngestOutcome::Ingested { .. } => "ingested",
        IngestOutcome::Duplicate { .. } => "duplicate",
        IngestOutcome::Ignored(_) => "ignored",
    };
    Ok(Json(json!({ "status": "ok", "result": result })))
}

#[derive(Debug, Deserialize)]
pub struct CreateInboxRequest {
    pub name: String,
}

/// POST /api/v1/inboxes
pub async fn create_inbox(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Json(req): Json<CreateInboxRequest>,
) -> ApiResult<Response> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(MensagerError::normalization("inbox name must not be empty").into());
    }
    let inbox = state.store.create_inbox(auth.account_id, name).await?;
    info!(inbox_id = %inbox.id, account_id = %auth.account_id, "inbox created");
    Ok((StatusCode::CREATED, Json(inbox)).into_response())
}

/// DELETE /api/v1/inboxes/{id}/conversations
pub async fn clear_inbox(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let inbox_id = InboxId(id);
    state
        .store
        .get_inbox(auth.account_id, inbox_id)
        .await?
        .ok_or_else(|| MensagerError::not_found("inbox", inbox_id))?;

    let count = state.store.clear_inbox(auth.account_id, inbox_id).await?;
    state.dispatcher.inbox_cleared(inbox_id, count, auth.account_id);
    info!(%inbox_id, count, "inbox cleared");
    Ok(Json(json!({ "inbox_id": inbox_id, "count": count })))
}

/// GET /api/v1/conversations
pub async fn list_conversations(
    State(state): State<GatewayState>,
    auth: AuthContext,
) -> ApiResult<Response> {
    let conversations = state.store.list_conversations(auth.account_id).await?;
    Ok(Json(conversations).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub inbox_id: i64,
    pub phone_number: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// POST /api/v1/conversations
///
/// Find-or-create by contact phone. Only a newly created conversation
/// publishes `conversation.new`.
pub async fn create_conversation(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Json(req): Json<CreateConversationRequest>,
) -> ApiResult<Response> {
    let account_id = auth.account_id;
    let phone = req.phone_number.trim();
    if phone.is_empty() {
        return Err(MensagerError::normalization("phone_number must not be empty").into());
    }
    let inbox_id = InboxId(req.inbox_id);
    state
        .store
        .get_inbox(account_id, inbox_id)
        .await?
        .ok_or_else(|| MensagerError::not_found("inbox", inbox_id))?;

    let contact = match state.store.find_contact_by_phone(account_id, phone).await? {
        Some(contact) => contact,
        None => {
            state
                .store
                .create_contact(NewContact {
                    account_id,
                    name: req.name.clone().unwrap_or_else(|| phone.to_string()),
                    phone_number: phone.to_string(),
                    identifier: format!("{phone}@s.whatsapp.net"),
                })
                .await?
        }
    };

    if let Some(existing) = state
        .store
        .find_latest_conversation(account_id, inbox_id, contact.id)
        .await?
    {
        return Ok(Json(existing).into_response());
    }

    let conversation = state
        .store
        .create_conversation(account_id, inbox_id, contact.id)
        .await?;
    state.dispatcher.conversation_new(&conversation);
    Ok((StatusCode::CREATED, Json(conversation)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct UpdateConversationRequest {
    pub status: ConversationStatus,
}

/// PATCH /api/v1/conversations/{id}
pub async fn update_conversation(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<UpdateConversationRequest>,
) -> ApiResult<Response> {
    let conversation = state
        .store
        .update_conversation_status(auth.account_id, ConversationId(id), req.status)
        .await?;
    state.dispatcher.conversation_updated(&conversation);
    Ok(Json(conversation).into_response())
}

/// DELETE /api/v1/conversations/{id}
pub async fn delete_conversation(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let id = ConversationId(id);
    state.store.delete_conversation(auth.account_id, id).await?;
    state.dispatcher.conversation_deleted(id, auth.account_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/conversations/{id}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let id = ConversationId(id);
    state
        .store
        .get_conversation(auth.account_id, id)
        .await?
        .ok_or_else(|| MensagerError::not_found("conversation", id))?;
    let messages = state.store.list_messages(auth.account_id, id).await?;
    Ok(Json(messages).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub private: bool,
}

/// POST /api/v1/conversations/{id}/messages
///
/// Records an agent reply. Delivery to the gateway happens elsewhere; its
/// echo comes back as a `SendMessage` webhook and is ignored.
pub async fn send_message(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Response> {
    let id = ConversationId(id);
    let conversation = state
        .store
        .get_conversation(auth.account_id, id)
        .await?
        .ok_or_else(|| MensagerError::not_found("conversation", id))?;

    let mut new_message = NewMessage::text(
        auth.account_id,
        conversation.inbox_id,
        conversation.id,
        MessageType::Outgoing,
        SenderType::User,
        req.content,
    );
    new_message.private = req.private;
    new_message.sender_id = auth.user_id.parse().ok();
    new_message.timestamp = Some(Utc::now());

    let message = state.store.insert_message(new_message).await?;
    let conversation = state
        .store
        .record_activity(conversation.id, Utc::now(), false)
        .await?;

    state.dispatcher.message_new(&message);
    state.dispatcher.conversation_updated(&conversation);
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

/// POST /api/v1/conversations/{id}/read
pub async fn mark_conversation_read(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let conversation = state
        .store
        .mark_conversation_read(auth.account_id, ConversationId(id))
        .await?;
    state.dispatcher.conversation_updated(&conversation);
    Ok(Json(conversation).into_response())
}

#[derive(Debug, Deserialize)]
pub struct MarkMessagesReadRequest {
    pub message_ids: Vec<i64>,
}

/// POST /api/v1/messages/read
///
/// Publishes `message.updated` per message and `conversation.updated` once
/// per affected conversation.
pub async fn mark_messages_read(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Json(req): Json<MarkMessagesReadRequest>,
) -> ApiResult<Response> {
    let ids: Vec<MessageId> = req.message_ids.into_iter().map(MessageId).collect();
    let messages = state.store.mark_messages_read(auth.account_id, &ids).await?;

    let mut affected = BTreeSet::new();
    for message in &messages {
        state.dispatcher.message_updated(message);
        affected.insert(message.conversation_id());
    }
    for conversation_id in affected {
        if let Some(conversation) = state
            .store
            .get_conversation(auth.account_id, conversation_id)
            .await?
        {
            state.dispatcher.conversation_updated(&conversation);
        }
    }

    Ok(Json(json!({ "updated": messages.len() })).into_response())
}

