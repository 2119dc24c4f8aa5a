// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event publisher that records what it forwards.

use std::sync::{Arc, Mutex};

use mensager_bus::{DeliveryReport, Event, EventKind, EventPublisher, Hub, Scope};

/// Wraps a [`Hub`] so tests can assert on every published event while live
/// subscribers still receive them.
pub struct RecordingPublisher {
    hub: Arc<Hub>,
    events: Mutex<Vec<Event>>,
}

impl RecordingPublisher {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            hub,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Every event published so far, in order.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// `(kind, scope)` pairs, which is what most assertions care about.
    pub fn published(&self) -> Vec<(EventKind, Scope)> {
        self.events()
            .iter()
            .map(|e| (e.kind(), e.scope()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: Event) -> DeliveryReport {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        self.hub.publish(event)
    }
}
