// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity token middleware.
//!
//! Clients send their Firebase ID token either as a `token` query
//! parameter, an `Authorization: Bearer` header or the `__session` cookie
//! (the only cookie Firebase Hosting forwards).

use crate::error::AppError;
use crate::services::identity::IdentityClaims;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "__session";

/// Token found in the header or cookie, if any.
#[derive(Debug, Clone, Default)]
pub struct SessionToken(pub Option<String>);

/// Caller verified from their identity token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub claims: IdentityClaims,
}

/// Header first, then cookie.
pub fn extract_session_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer
        .map(str::to_string)
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .filter(|t| !t.is_empty())
}

/// Stash the header/cookie token for handlers that verify it themselves.
pub async fn capture_session_token(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let token = extract_session_token(request.headers(), &jar);
    request.extensions_mut().insert(SessionToken(token));
    next.run(request).await
}

/// Middleware that requires a valid identity token.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_session_token(request.headers(), &jar) else {
        return AppError::Unauthorized.into_response();
    };

    let claims = match state.identity.verify(&token).await {
        Ok(claims) => claims,
        Err(e) => return AppError::from(e).into_response(),
    };

    request.extensions_mut().insert(AuthUser {
        uid: claims.uid.clone(),
        claims,
    });
    next.run(request).await
}
