// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downloads gateway media and re-hosts it on local disk.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use mensager_config::model::MediaConfig;
use mensager_core::{
    AdapterType, HealthStatus, MediaRehoster, MensagerError, PluginAdapter, RehostedMedia,
};
use tracing::debug;

const FALLBACK_MIME: &str = "application/octet-stream";

/// [`MediaRehoster`] that fetches over HTTP and writes under
/// `media.storage_path`, served back at `media.base_url`.
pub struct HttpMediaRehoster {
    client: reqwest::Client,
    storage_path: PathBuf,
    base_url: String,
    max_bytes: u64,
}

impl HttpMediaRehoster {
    pub fn new(config: &MediaConfig) -> Result<Self, MensagerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| MensagerError::Media {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            storage_path: PathBuf::from(&config.storage_path),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_bytes: config.max_download_bytes,
        })
    }

    async fn download(&self, remote_url: &str) -> Result<(Vec<u8>, Option<String>), MensagerError> {
        let mut response = self
            .client
            .get(remote_url)
            .send()
            .await
            .map_err(|e| MensagerError::Media {
                message: format!("download failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MensagerError::Media {
                message: format!("download returned {status}"),
                source: None,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());

        let too_large = |size: u64| MensagerError::Media {
            message: format!("media of {size} bytes exceeds the {} byte limit", self.max_bytes),
            source: None,
        };
        if let Some(declared) = response.content_length()
            && declared > self.max_bytes
        {
            return Err(too_large(declared));
        }

        // Content-Length may be absent or wrong, so the limit is also
        // enforced while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| MensagerError::Media {
            message: format!("failed to read media body: {e}"),
            source: Some(Box::new(e)),
        })? {
            let received = (body.len() + chunk.len()) as u64;
            if received > self.max_bytes {
                return Err(too_large(received));
            }
            body.extend_from_slice(&chunk);
        }
        Ok((body, content_type))
    }
}

#[async_trait]
impl PluginAdapter for HttpMediaRehoster {
    fn name(&self) -> &str {
        "http-media"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Media
    }

    async fn health_check(&self) -> Result<HealthStatus, MensagerError> {
        match tokio::fs::metadata(&self.storage_path).await {
            Ok(meta) if meta.is_dir() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Unhealthy(format!(
                "{} is not a directory",
                self.storage_path.display()
            ))),
            // Created lazily on first download.
            Err(_) => Ok(HealthStatus::Degraded(format!(
                "{} does not exist yet",
                self.storage_path.display()
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), MensagerError> {
        Ok(())
    }
}

#[async_trait]
impl MediaRehoster for HttpMediaRehoster {
    async fn rehost(
        &self,
        remote_url: &str,
        file_stem: &str,
    ) -> Result<RehostedMedia, MensagerError> {
        let (bytes, header_mime) = self.download(remote_url).await?;
        let mime_type = header_mime
            .filter(|m| m != FALLBACK_MIME)
            .or_else(|| sniff_mime(&bytes).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        let file_name = format!("{}{}", sanitize_stem(file_stem), extension_for(&mime_type));
        let io_err = |e: std::io::Error| MensagerError::Media {
            message: format!("failed to store media: {e}"),
            source: Some(Box::new(e)),
        };
        tokio::fs::create_dir_all(&self.storage_path)
            .await
            .map_err(io_err)?;
        tokio::fs::write(self.storage_path.join(&file_name), &bytes)
            .await
            .map_err(io_err)?;

        debug!(file = %file_name, size = bytes.len(), mime = %mime_type, "media re-hosted");
        Ok(RehostedMedia {
            url: format!("{}/{}", self.base_url, file_name),
            mime_type,
        })
    }
}

/// Keeps `[A-Za-z0-9_-]`; anything else becomes `_`.
fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "media".to_string()
    } else {
        cleaned
    }
}

/// Prefers the extension named like the subtype (`image/jpeg` → `.jpeg`),
/// else the first one `mime_guess` knows, else `.bin`.
fn extension_for(mime_type: &str) -> String {
    if mime_type == FALLBACK_MIME || mime_type.contains('*') {
        return ".bin".to_string();
    }
    let subtype = mime_type.split_once('/').map(|(_, sub)| sub).unwrap_or_default();
    mime_guess::get_mime_extensions_str(mime_type)
        .and_then(|exts| exts.iter().find(|ext| **ext == subtype).or(exts.first()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".bin".to_string())
}

/// Magic-byte detection for servers that omit `Content-Type`.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\xFF\xD8\xFF", "image/jpeg"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"GIF8", "image/gif"),
        (b"%PDF", "application/pdf"),
        (b"OggS", "audio/ogg"),
        (b"PK\x03\x04", "application/zip"),
    ];
    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| bytes.starts_with(magic)) {
        return Some(mime);
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        return Some("video/mp4");
    }
    None
}
