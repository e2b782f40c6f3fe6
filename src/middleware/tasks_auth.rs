// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admission for Cloud Tasks callbacks carrying payment triggers.

use crate::config::PAYMENTS_QUEUE_NAME;
use crate::services::jwks::VerifyError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

const QUEUE_HEADER: &str = "x-cloudtasks-queuename";
const RETRY_HEADER: &str = "x-cloudtasks-taskretrycount";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Only the payments queue may deliver to `/tasks/*`, and only with an OIDC
/// token minted for our tasks service account. The verified principal is
/// attached to the request for the handler.
pub async fn require_tasks_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let queue = header_str(request.headers(), QUEUE_HEADER);
    if queue != Some(PAYMENTS_QUEUE_NAME) {
        tracing::warn!(queue = ?queue, "Rejected task delivery from unexpected queue");
        return Err(StatusCode::FORBIDDEN);
    }

    let principal = match state
        .google_oidc_verifier
        .verify_cloud_tasks_token(request.headers().get(header::AUTHORIZATION))
        .await
    {
        Ok(principal) => principal,
        Err(VerifyError::Forbidden(reason)) => {
            tracing::warn!(reason = %reason, "Rejected task delivery with bad OIDC token");
            return Err(StatusCode::FORBIDDEN);
        }
        // 500 lets Cloud Tasks retry once the key fetch recovers.
        Err(VerifyError::Transient(reason)) => {
            tracing::error!(reason = %reason, "Could not verify task OIDC token");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    tracing::debug!(
        email = %principal.email,
        retry = header_str(request.headers(), RETRY_HEADER).unwrap_or("0"),
        "Accepted payment task delivery"
    );
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
