// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits. All extend [`PluginAdapter`] and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod media;
pub mod store;

pub use adapter::PluginAdapter;
pub use media::{MediaRehoster, RehostedMedia};
pub use store::InboxStore;
