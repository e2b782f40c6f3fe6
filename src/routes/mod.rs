// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP surface: the data endpoint, gateway routes and task callbacks.

pub mod data;
pub mod payments;
pub mod tasks;

use crate::AppState;
use axum::http::{header, request::Parts, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    build_id: &'static str,
}

async fn health_check() -> Json<Health> {
    Json(Health {
        status: "ok",
        build_id: option_env!("BUILD_ID").unwrap_or("unknown"),
    })
}

/// The web app and local dev servers may call us with the session cookie.
fn origin_allowed(origin: &str, frontend_url: &str) -> bool {
    origin == frontend_url.trim_end_matches('/')
        || ["http://localhost", "http://127.0.0.1"]
            .iter()
            .any(|local| {
                origin
                    .strip_prefix(local)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
            })
}

fn cors_layer(frontend_url: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| origin_allowed(origin, &frontend_url))
            },
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(data::routes())
        .merge(payments::routes(state.clone()))
        .merge(tasks::routes(state.clone()))
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors_layer(state.config.frontend_url.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::origin_allowed;

    #[test]
    fn frontend_and_local_origins_pass() {
        let frontend = "https://tutorbook.app/";
        assert!(origin_allowed("https://tutorbook.app", frontend));
        assert!(origin_allowed("http://localhost:5173", frontend));
        assert!(origin_allowed("http://127.0.0.1", frontend));
    }

    #[test]
    fn lookalike_origins_fail() {
        let frontend = "https://tutorbook.app";
        assert!(!origin_allowed("https://tutorbook.app.evil.com", frontend));
        assert!(!origin_allowed("http://localhost.evil.com", frontend));
        assert!(!origin_allowed("https://localhost:5173", frontend));
    }
}
