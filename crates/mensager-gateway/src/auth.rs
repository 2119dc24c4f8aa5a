// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JWT authentication for the console API and the realtime stream.
//!
//! Tokens are HS256 and are looked up in order:
//! 1. `Authorization: Bearer <token>`
//! 2. `api_access_token` header
//! 3. `token` query parameter (EventSource cannot set headers)
//!
//! The verified account id becomes an [`AuthContext`] request extension.

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use mensager_core::{AccountId, MensagerError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub account_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Who is calling. Present on every authenticated route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub account_id: AccountId,
}

#[derive(Clone)]
pub struct AuthState {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("key", &"[redacted]")
            .finish()
    }
}

impl AuthState {
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<AuthContext, MensagerError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    MensagerError::Auth("token expired".to_string())
                }
                _ => MensagerError::Auth("invalid token".to_string()),
            }
        })?;
        Ok(AuthContext {
            user_id: data.claims.sub,
            account_id: AccountId(data.claims.account_id),
        })
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn token_from_request(req: &Request) -> Option<String> {
    let headers = req.headers();
    if let Some(bearer) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(bearer.trim().to_string());
    }
    if let Some(token) = headers.get("api_access_token").and_then(|v| v.to_str().ok()) {
        return Some(token.to_string());
    }
    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.token)
}

pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = token_from_request(&req)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MensagerError::Auth("missing token".to_string()))?;
    let context = auth.validate(&token)?;
    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| MensagerError::Auth("missing token".to_string()).into())
    }
}
