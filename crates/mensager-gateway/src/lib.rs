// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for Mensager.
//!
//! Routes:
//! - `GET /health` and `GET /media/{file}` (public)
//! - `POST /webhooks/evolution?inbox_id=N` (gateway delivery)
//! - `GET /api/v1/realtime` (SSE stream, authenticated)
//! - `/api/v1/...` console endpoints (authenticated)

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use auth::{AuthContext, AuthState, Claims};
pub use error::ApiError;
pub use server::{GatewayState, build_router, start_server};
