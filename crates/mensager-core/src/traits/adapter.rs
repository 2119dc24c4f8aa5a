// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by every external collaborator.

use async_trait::async_trait;

use crate::error::MensagerError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for Mensager collaborators (store, media service).
///
/// Provides identity, lifecycle, and health check capabilities so the
/// server can report on and shut down whatever backend it was handed.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of collaborator.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, MensagerError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), MensagerError>;
}
