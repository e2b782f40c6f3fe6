// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admission through the data endpoint: token, profile and action checks
//! that run before any transition.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{free_request, identity_token, user_json, P};
use serde_json::json;
use tutorbook_api::db::collections;

mod common;

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = common::create_test_app().await;
    let (status, body) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/data?user=pupil&action=newRequest&test")
                .body(Body::from(json!({"request": free_request()}).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = common::create_test_app().await;
    let (status, body) = app
        .data_with_token("pupil", "not-a-jwt", "newRequest", json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn token_for_another_user_is_a_mismatch() {
    let app = common::create_test_app().await;
    let token = app.token("pupil");
    let (status, body) = app
        .data_with_token("tutor", &token, "newRequest", json!({"request": free_request()}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "identity_mismatch");
}

#[tokio::test]
async fn email_must_match_the_profile() {
    let app = common::create_test_app().await;
    let token = identity_token(&app.state.config, "pupil", "someone@else.com", false, &[]);
    let (status, body) = app
        .data_with_token("pupil", &token, "newRequest", json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "identity_mismatch");
}

#[tokio::test]
async fn email_comparison_ignores_case() {
    let app = common::create_test_app().await;
    let token = identity_token(&app.state.config, "pupil", "Pupil@Example.com", false, &[]);
    let (status, body) = app
        .data_with_token("pupil", &token, "newRequest", json!({"request": free_request()}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn email_shaped_user_is_a_bad_request() {
    let app = common::create_test_app().await;
    let token = app.token("pupil");
    let (status, body) = app
        .data_with_token("pupil@example.com", &token, "newRequest", json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let app = common::create_test_app().await;
    let token = identity_token(&app.state.config, "ghost", "ghost@example.com", false, &[]);
    let (status, _) = app
        .data_with_token("ghost", &token, "newRequest", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn incomplete_profile_is_forbidden() {
    let app = common::create_test_app().await;
    let mut profile = user_json("newbie", "New Person", "Pupil");
    profile["type"] = json!("");
    app.put(P.user("newbie"), profile).await;

    let token = identity_token(&app.state.config, "newbie", "newbie@example.com", false, &[]);
    let (status, body) = app
        .data_with_token("newbie", &token, "newRequest", json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "incomplete_profile");
    assert_eq!(body["details"], "User did not have a valid type");
}

#[tokio::test]
async fn unknown_action_is_unsupported() {
    let app = common::create_test_app().await;
    let (status, body) = app.data("pupil", "approveEverything", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_action");
}

#[tokio::test]
async fn malformed_payload_is_a_bad_request() {
    let app = common::create_test_app().await;
    let (status, body) = app
        .data("pupil", "approveRequest", json!({"request": "nope"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn missing_record_is_not_found() {
    let app = common::create_test_app().await;
    let (status, body) = app
        .data(
            "tutor",
            "approveRequest",
            json!({"request": common::request_ref(), "id": "missing"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"], "Resource not found: requestsIn (missing)");
}

#[tokio::test]
async fn bearer_header_and_session_cookie_are_accepted() {
    let app = common::create_test_app().await;
    let body = json!({"request": free_request()}).to_string();

    let (status, reply) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/data?user=pupil&action=newRequest&test=1")
                .header("authorization", format!("Bearer {}", app.token("pupil")))
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{reply}");

    let (status, reply) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/data?user=pupil&action=newRequest&test")
                .header("cookie", format!("__session={}", app.token("pupil")))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{reply}");

    assert_eq!(
        app.count(&P.user("pupil").collection(collections::REQUESTS_OUT)).await,
        2
    );
}

#[tokio::test]
async fn partitions_are_isolated() {
    let app = common::create_test_app().await;
    let token = app.token("pupil");
    // The seeded profile only exists in the test partition.
    let (status, _) = app
        .send(
            Request::builder()
                .method("POST")
                .uri(format!("/data?user=pupil&action=newRequest&test=false&token={token}"))
                .body(Body::from(json!({"request": free_request()}).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_action_is_a_bad_request() {
    let app = common::create_test_app().await;
    let token = app.token("pupil");
    let (status, _) = app
        .send(
            Request::builder()
                .method("GET")
                .uri(format!("/data?user=pupil&test&token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
