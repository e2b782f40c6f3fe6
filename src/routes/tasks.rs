// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks, not directly by users, and
//! sit behind queue-header and OIDC verification.

use crate::middleware::tasks_auth::require_tasks_auth;
use crate::services::google_oidc::VerifiedTaskPrincipal;
use crate::services::tasks::PaymentTrigger;
use crate::AppState;
use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    middleware,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/payments", post(process_payment_trigger))
        .route_layer(middleware::from_fn_with_state(state, require_tasks_auth))
}

/// Run one payment trigger. Errors answer 500 so Cloud Tasks retries.
async fn process_payment_trigger(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<VerifiedTaskPrincipal>,
    Json(trigger): Json<PaymentTrigger>,
) -> StatusCode {
    tracing::info!(
        caller = %principal.email,
        kind = %trigger.kind,
        partition = %trigger.partition,
        user = %trigger.user,
        id = %trigger.id,
        "Processing payment trigger"
    );

    match state.payments.handle(&trigger).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!(
                kind = %trigger.kind,
                user = %trigger.user,
                id = %trigger.id,
                error = %e,
                "Payment trigger failed"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
