// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Security tests for Cloud Task handlers.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tutorbook_api::config::PAYMENTS_QUEUE_NAME;
use tutorbook_api::services::google_oidc::tasks_service_account;

mod common;

/// A trigger whose payout request does not exist, so processing is a no-op.
fn payload() -> String {
    json!({
        "kind": "requestedPayout",
        "partition": "test",
        "user": "tutor",
        "id": "nothing-here",
    })
    .to_string()
}

fn task_request(queue: Option<&str>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/tasks/payments")
        .header("content-type", "application/json");
    if let Some(queue) = queue {
        builder = builder.header("x-cloudtasks-queuename", queue);
    }
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(payload())).unwrap()
}

#[tokio::test]
async fn test_payment_task_no_header_forbidden() {
    let app = common::create_test_app().await;
    let (status, _) = app.send(task_request(None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_task_missing_auth_forbidden() {
    let app = common::create_test_app().await;
    let (status, _) = app
        .send(task_request(Some(PAYMENTS_QUEUE_NAME), None))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_task_wrong_queue_forbidden() {
    let app = common::create_test_app().await;
    let email = tasks_service_account(&app.state.config.gcp_project_id);
    let token = common::tasks_oidc_token(&app.state.config, &email);
    let (status, _) = app
        .send(task_request(Some("activity-processing"), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_task_wrong_service_account_forbidden() {
    let app = common::create_test_app().await;
    let token = common::tasks_oidc_token(&app.state.config, "intruder@example.com");
    let (status, _) = app
        .send(task_request(Some(PAYMENTS_QUEUE_NAME), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_task_identity_token_forbidden() {
    let app = common::create_test_app().await;
    let token = app.token("sup");
    let (status, _) = app
        .send(task_request(Some(PAYMENTS_QUEUE_NAME), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_task_with_valid_token_allowed() {
    let app = common::create_test_app().await;
    let email = tasks_service_account(&app.state.config.gcp_project_id);
    let token = common::tasks_oidc_token(&app.state.config, &email);
    let (status, _) = app
        .send(task_request(Some(PAYMENTS_QUEUE_NAME), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
}
