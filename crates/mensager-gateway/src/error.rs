// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mensager_core::MensagerError;
use serde_json::json;

/// HTTP face of [`MensagerError`]. Bodies are `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub MensagerError);

impl From<MensagerError> for ApiError {
    fn from(err: MensagerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            MensagerError::Normalization { .. } => StatusCode::BAD_REQUEST,
            MensagerError::NotFound { .. } => StatusCode::NOT_FOUND,
            MensagerError::Auth(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self.0, "request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
