// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::MensagerError;
use crate::traits::adapter::PluginAdapter;

/// Where a remote attachment ended up after re-hosting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehostedMedia {
    pub url: String,
    pub mime_type: String,
}

/// Fetches remote media and stores it somewhere the console can reach.
#[async_trait]
pub trait MediaRehoster: PluginAdapter {
    /// Downloads `remote_url` and stores it under a name derived from
    /// `file_stem`.
    async fn rehost(
        &self,
        remote_url: &str,
        file_stem: &str,
    ) -> Result<RehostedMedia, MensagerError>;
}
