// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock media rehoster for deterministic testing.

use std::sync::Mutex;

use async_trait::async_trait;
use mensager_core::{
    AdapterType, HealthStatus, MediaRehoster, MensagerError, PluginAdapter, RehostedMedia,
};

/// Re-hosts to `http://media.test/<stem>` without touching the network, or
/// fails every call when built with [`MockMediaRehoster::failing`].
pub struct MockMediaRehoster {
    fail: bool,
    mime_type: String,
    calls: Mutex<Vec<String>>,
}

impl MockMediaRehoster {
    pub fn new(mime_type: &str) -> Self {
        Self {
            fail: false,
            mime_type: mime_type.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("application/octet-stream")
        }
    }

    /// Remote URLs requested so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl PluginAdapter for MockMediaRehoster {
    fn name(&self) -> &str {
        "mock-media"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Media
    }

    async fn health_check(&self) -> Result<HealthStatus, MensagerError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MensagerError> {
        Ok(())
    }
}

#[async_trait]
impl MediaRehoster for MockMediaRehoster {
    async fn rehost(
        &self,
        remote_url: &str,
        file_stem: &str,
    ) -> Result<RehostedMedia, MensagerError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(remote_url.to_string());
        if self.fail {
            return Err(MensagerError::Media {
                message: format!("mock download of {remote_url} failed"),
                source: None,
            });
        }
        Ok(RehostedMedia {
            url: format!("http://media.test/{file_stem}"),
            mime_type: self.mime_type.clone(),
        })
    }
}
