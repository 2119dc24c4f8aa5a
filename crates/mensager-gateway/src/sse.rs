// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `GET /api/v1/realtime`: one [`StreamingSession`] per connection, framed
//! as Server-Sent Events.
//!
//! Each frame is a single `data:` line carrying `{"type", "payload"}`.
//! The session owns heartbeats; when the client goes away axum drops the
//! body stream, the frame channel closes and the session unregisters.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use mensager_bus::StreamingSession;
use mensager_core::ConversationId;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::auth::AuthContext;
use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub conversation_id: Option<i64>,
}

pub async fn realtime(
    State(state): State<GatewayState>,
    auth: AuthContext,
    Query(query): Query<RealtimeQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<String>(state.session.outbox_capacity.max(1));
    let mut session = StreamingSession::new(
        state.hub.clone(),
        auth.account_id,
        query.conversation_id.map(ConversationId),
        state.session,
        state.shutdown.child_token(),
    );
    debug!(
        subscriber = %session.id(),
        account_id = %auth.account_id,
        conversation_id = ?query.conversation_id,
        "realtime stream opened"
    );

    tokio::spawn(async move {
        session.run(tx).await;
    });

    Sse::new(ReceiverStream::new(rx).map(|frame| Ok(Event::default().data(frame))))
}
