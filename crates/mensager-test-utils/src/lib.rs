// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Mensager integration tests.
//!
//! Provides a temp-SQLite harness and mock collaborators so end-to-end
//! tests run without a gateway or network.
//!
//! # Components
//!
//! - [`TestHarness`] - store, hub, pipeline, and router wired together
//! - [`RecordingPublisher`] - forwards to the hub and keeps a copy of every event
//! - [`MockMediaRehoster`] - media collaborator that succeeds or fails on demand

pub mod harness;
pub mod mock_media;
pub mod recording;

pub use harness::{TestHarness, webhook_message};
pub use mock_media::MockMediaRehoster;
pub use recording::RecordingPublisher;
