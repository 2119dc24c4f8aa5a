// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns canonical inbound messages into stored rows and realtime events,
//! exactly once per external id.

pub mod pipeline;
mod resolve;

pub use pipeline::{IngestOutcome, IngestionPipeline};
