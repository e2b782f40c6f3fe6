// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The data endpoint.
//!
//! One URL for every lifecycle action, dispatched on the `action` query
//! parameter and accepted with any method.

use crate::db::Partition;
use crate::error::{AppError, Result};
use crate::middleware::auth::{capture_session_token, SessionToken};
use crate::services::gate::DataCall;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    middleware,
    routing::any,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/data", any(handle_data))
        .route_layer(middleware::from_fn(capture_session_token))
}

#[derive(Debug, Default, Deserialize)]
pub struct DataParams {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub test: Option<String>,
    #[serde(default)]
    pub sandbox: Option<String>,
}

impl DataParams {
    pub fn partition(&self) -> Partition {
        Partition::from_flags(is_set(self.test.as_deref()), is_set(self.sandbox.as_deref()))
    }
}

/// A bare `?test` counts as set; `false` and `0` do not.
pub fn is_set(flag: Option<&str>) -> bool {
    flag.is_some_and(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0"))
}

fn parse_body(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))
}

async fn handle_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataParams>,
    Extension(SessionToken(session_token)): Extension<SessionToken>,
    body: Bytes,
) -> Result<Json<Value>> {
    let partition = params.partition();
    let action = params
        .action
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("missing action".to_string()))?;
    let user = params.user.unwrap_or_default();
    let token = params.token.filter(|t| !t.is_empty()).or(session_token);
    let body = parse_body(&body)?;

    tracing::info!(partition = %partition, action = %action, user = %user, "Data call");

    let result = state
        .gate
        .handle(DataCall {
            partition,
            user,
            token,
            action,
            body,
        })
        .await;

    if let Err(e) = &result {
        tracing::info!(partition = %partition, error = %e, code = e.code(), "Data call failed");
    }
    result.map(Json)
}
