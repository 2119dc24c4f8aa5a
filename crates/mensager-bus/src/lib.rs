// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime fan-out for Mensager.
//!
//! Producers describe a mutation to the [`Dispatcher`], which turns it into
//! scoped [`Event`]s and hands them to an [`EventPublisher`] (normally the
//! [`Hub`]). The hub pushes each event into the bounded outbox of every
//! matching subscriber without ever blocking; a [`StreamingSession`] drains
//! one outbox into one client connection.

pub mod dispatch;
pub mod event;
pub mod hub;
pub mod session;

pub use dispatch::Dispatcher;
pub use event::{Event, EventKind, Scope};
pub use hub::{DeliveryReport, EventPublisher, Hub, Outbox, Subscriber, SubscriberId};
pub use session::{CloseReason, SessionConfig, SessionState, StreamingSession};
