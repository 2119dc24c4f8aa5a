// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Mensager.

use thiserror::Error;

/// The primary error type used across Mensager crates and collaborator traits.
#[derive(Debug, Error)]
pub enum MensagerError {
    /// Configuration errors (invalid values, missing secrets).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A gateway payload could not be turned into a canonical message.
    #[error("normalization error: {message}")]
    Normalization { message: String },

    /// Media download or re-hosting failed.
    #[error("media error: {message}")]
    Media {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist (or is not visible to the caller).
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Auth(String),

    /// HTTP gateway errors (bind failure, server error).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MensagerError {
    /// Shorthand for a normalization failure.
    pub fn normalization(message: impl Into<String>) -> Self {
        Self::Normalization {
            message: message.into(),
        }
    }

    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
