// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One client stream, end to end.
//!
//! A session registers a subscriber, announces itself with a
//! `connection.established` frame, then multiplexes three sources until one
//! of them ends it: cancellation, the subscriber's outbox, and a heartbeat
//! timer. Frames go to an `mpsc::Sender<String>` sink that the transport
//! drains; a failed write means the client is gone.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mensager_core::{AccountId, ConversationId};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::event::{Event, EventKind, Scope};
use crate::hub::{Hub, Outbox, Subscriber, SubscriberId};

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub outbox_capacity: usize,
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 10,
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Closed,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The cancellation token fired (server shutdown or handler teardown).
    Cancelled,
    /// Writing to the sink failed: the client disconnected.
    ClientGone,
    /// The hub closed the outbox underneath the session.
    Unregistered,
}

/// Unregisters on drop, covering every exit path including panics and
/// the future being dropped mid-await.
struct Registration {
    hub: Arc<Hub>,
    id: SubscriberId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.unregister(&self.id);
    }
}

pub struct StreamingSession {
    hub: Arc<Hub>,
    config: SessionConfig,
    cancel: CancellationToken,
    state: SessionState,
    pending: Option<(Subscriber, Outbox)>,
    id: SubscriberId,
}

impl StreamingSession {
    pub fn new(
        hub: Arc<Hub>,
        account_id: AccountId,
        conversation_id: Option<ConversationId>,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (subscriber, outbox) =
            Subscriber::new(account_id, conversation_id, config.outbox_capacity);
        let id = subscriber.id().clone();
        Self {
            hub,
            config,
            cancel,
            state: SessionState::Connecting,
            pending: Some((subscriber, outbox)),
            id,
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drives the session until it closes. Calling it again after it has
    /// closed returns immediately.
    pub async fn run(&mut self, sink: mpsc::Sender<String>) -> CloseReason {
        let Some((subscriber, mut outbox)) = self.pending.take() else {
            return CloseReason::Unregistered;
        };

        self.hub.register(subscriber);
        let _registration = Registration {
            hub: Arc::clone(&self.hub),
            id: self.id.clone(),
        };

        let reason = self.stream(&sink, &mut outbox).await;
        self.state = SessionState::Closed;
        debug!(subscriber = %self.id, ?reason, "streaming session closed");
        reason
    }

    async fn stream(&mut self, sink: &mpsc::Sender<String>, outbox: &mut Outbox) -> CloseReason {
        let established = json!({
            "client_id": self.id.as_str(),
            "timestamp": Utc::now(),
        });
        if let Err(reason) = self
            .write(sink, EventKind::ConnectionEstablished, &established)
            .await
        {
            return reason;
        }
        self.state = SessionState::Streaming;

        let period = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return CloseReason::Cancelled,
                _ = sink.closed() => return CloseReason::ClientGone,
                next = outbox.recv() => match next {
                    Some(event) => {
                        if let Err(reason) = self.forward(sink, &event).await {
                            return reason;
                        }
                    }
                    None => return CloseReason::Unregistered,
                },
                _ = heartbeat.tick() => {
                    let beat = json!({ "timestamp": Utc::now() });
                    if let Err(reason) = self.write(sink, EventKind::Heartbeat, &beat).await {
                        return reason;
                    }
                }
            }
        }
    }

    async fn write(
        &self,
        sink: &mpsc::Sender<String>,
        kind: EventKind,
        payload: &serde_json::Value,
    ) -> Result<(), CloseReason> {
        match Event::new(kind, Scope::All, payload) {
            Ok(event) => self.forward(sink, &event).await,
            Err(e) => {
                warn!(subscriber = %self.id, error = %e, "failed to build session frame");
                Ok(())
            }
        }
    }

    /// A full sink blocks the send; cancellation still wins while it waits.
    async fn forward(
        &self,
        sink: &mpsc::Sender<String>,
        event: &Event,
    ) -> Result<(), CloseReason> {
        let frame = match event.to_wire() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(subscriber = %self.id, error = %e, "skipping unencodable event");
                return Ok(());
            }
        };
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(CloseReason::Cancelled),
            sent = sink.send(frame) => sent.map_err(|_| CloseReason::ClientGone),
        }
    }
}
