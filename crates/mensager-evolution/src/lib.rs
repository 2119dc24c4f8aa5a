// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evolution API integration for Mensager.
//!
//! Parses gateway webhooks into [`CanonicalInboundMessage`] values and
//! re-hosts the media they reference.

pub mod media;
pub mod normalize;
pub mod payload;

pub use media::HttpMediaRehoster;
pub use normalize::{
    CanonicalInboundMessage, ChatIdentity, IgnoreReason, MediaDescriptor, Normalized, normalize,
    normalize_envelope,
};
pub use payload::{MediaFields, MessageBody, WebhookEnvelope};
