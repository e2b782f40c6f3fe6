// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request -> appointment transitions through the data endpoint.

use axum::http::StatusCode;
use common::{appt_ref, free_request, paid_request, request_ref, LOCATION, LOCATION_NAME, P};
use serde_json::{json, Value};
use tutorbook_api::db::{collections, DocPath};
use tutorbook_api::error::AppError;
use tutorbook_api::services::gate::DataCall;
use tutorbook_api::services::lifecycle::RequestRef;
use tutorbook_api::services::tasks::TriggerKind;

mod common;

fn user_doc(uid: &str, collection: &str, id: &str) -> DocPath {
    P.user(uid).child(collection, id)
}

fn location_doc(collection: &str, id: &str) -> DocPath {
    P.location(LOCATION).child(collection, id)
}

#[tokio::test]
async fn new_request_writes_both_sides_with_one_id() {
    let app = common::create_test_app().await;

    let (status, body) = app
        .data("pupil", "newRequest", json!({"request": free_request()}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["id"].as_str().unwrap();

    let out = app.doc(&user_doc("pupil", collections::REQUESTS_OUT, id)).await.unwrap();
    let inbox = app.doc(&user_doc("tutor", collections::REQUESTS_IN, id)).await.unwrap();
    assert_eq!(out, inbox);
    assert_eq!(out["subject"], "Algebra 1");
    assert_eq!(out["toUser"]["name"], "Tina Tutor");
    assert_eq!(out["location"]["name"], LOCATION_NAME);
    assert_eq!(out["payment"]["amount"], 0.0);
    assert!(app.queue.take().is_empty());
}

#[tokio::test]
async fn approve_request_creates_three_appointments_sharing_the_id() {
    let app = common::create_test_app().await;
    let id = app.scheduled_appointment(free_request()).await;

    assert!(!app.exists(&user_doc("pupil", collections::REQUESTS_OUT, &id)).await);
    assert!(!app.exists(&user_doc("tutor", collections::REQUESTS_IN, &id)).await);
    assert_eq!(
        app.count(&P.user("pupil").collection(collections::APPROVED_REQUESTS_OUT)).await,
        1
    );

    let projections = [
        app.doc(&user_doc("pupil", collections::APPOINTMENTS, &id)).await,
        app.doc(&user_doc("tutor", collections::APPOINTMENTS, &id)).await,
        app.doc(&location_doc(collections::APPOINTMENTS, &id)).await,
    ];
    let projections: Vec<Value> = projections.into_iter().map(Option::unwrap).collect();
    for appt in &projections {
        assert_eq!(appt["time"], projections[0]["time"]);
        assert_eq!(appt["location"], projections[0]["location"]);
        assert_eq!(appt["for"]["subject"], "Algebra 1");
    }
}

#[tokio::test]
async fn approve_request_books_availability() {
    let app = common::create_test_app().await;
    app.scheduled_appointment(free_request()).await;

    let tutor = app.doc(&P.user("tutor")).await.unwrap();
    let slots = &tutor["availability"][LOCATION_NAME]["Monday"];
    assert_eq!(
        slots,
        &json!([{"open": "3:00 PM", "close": "4:00 PM", "booked": true}])
    );
}

#[tokio::test]
async fn second_approval_is_rejected() {
    let app = common::create_test_app().await;
    let id = app.scheduled_appointment(free_request()).await;

    let (status, body) = app
        .data("tutor", "approveRequest", json!({"request": request_ref(), "id": id}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    // Past the gate's existence check, the engine sees the earlier approval.
    let ctx = app
        .state
        .gate
        .admit(&DataCall {
            partition: P,
            user: "tutor".to_string(),
            token: Some(app.token("tutor")),
            action: "approveRequest".to_string(),
            body: Value::Null,
        })
        .await
        .unwrap();
    let locator: RequestRef = serde_json::from_value(request_ref()).unwrap();
    let err = app
        .state
        .gate
        .engine()
        .approve_request(&ctx, &locator, &id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    assert_eq!(
        app.count(&P.user("pupil").collection(collections::APPROVED_REQUESTS_OUT)).await,
        1
    );
}

#[tokio::test]
async fn reject_request_moves_it_to_rejected() {
    let app = common::create_test_app().await;
    let (_, body) = app
        .data("pupil", "newRequest", json!({"request": free_request()}))
        .await;
    let id = body["id"].as_str().unwrap();

    let (status, body) = app
        .data("tutor", "rejectRequest", json!({"request": request_ref(), "id": id}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let rejected = app
        .doc(&user_doc("pupil", collections::REJECTED_REQUESTS_OUT, id))
        .await
        .unwrap();
    assert_eq!(rejected["rejectedBy"]["uid"], "tutor");
    assert_eq!(rejected["for"]["subject"], "Algebra 1");
    assert!(!app.exists(&user_doc("pupil", collections::REQUESTS_OUT, id)).await);
    assert!(!app.exists(&user_doc("tutor", collections::REQUESTS_IN, id)).await);
    assert!(!app.exists(&user_doc("tutor", collections::APPOINTMENTS, id)).await);
}

#[tokio::test]
async fn cancel_request_notifies_only_the_other_party() {
    let app = common::create_test_app().await;
    let (_, body) = app
        .data("pupil", "newRequest", json!({"request": free_request()}))
        .await;
    let id = body["id"].as_str().unwrap();

    let (status, body) = app
        .data("pupil", "cancelRequest", json!({"request": request_ref(), "id": id}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    assert!(app.exists(&user_doc("tutor", collections::CANCELED_REQUESTS_IN, id)).await);
    assert!(!app.exists(&user_doc("pupil", collections::CANCELED_REQUESTS_OUT, id)).await);
    assert!(!app.exists(&user_doc("pupil", collections::REQUESTS_OUT, id)).await);
    assert!(!app.exists(&user_doc("tutor", collections::REQUESTS_IN, id)).await);
}

#[tokio::test]
async fn tutor_cannot_cancel_a_request_they_received() {
    let app = common::create_test_app().await;
    let (_, body) = app
        .data("pupil", "newRequest", json!({"request": free_request()}))
        .await;
    let id = body["id"].as_str().unwrap();

    let (status, body) = app
        .data("tutor", "cancelRequest", json!({"request": request_ref(), "id": id}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn modify_request_updates_both_copies() {
    let app = common::create_test_app().await;
    let (_, body) = app
        .data("pupil", "newRequest", json!({"request": free_request()}))
        .await;
    let id = body["id"].as_str().unwrap();

    let mut edit = free_request();
    edit["subject"] = json!("Geometry");
    edit["time"]["from"] = json!("3:30 PM");
    let (status, body) = app
        .data("pupil", "modifyRequest", json!({"request": edit, "id": id}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    for path in [
        user_doc("pupil", collections::REQUESTS_OUT, id),
        user_doc("tutor", collections::REQUESTS_IN, id),
    ] {
        let request = app.doc(&path).await.unwrap();
        assert_eq!(request["subject"], "Geometry");
        assert_eq!(request["time"]["from"], "3:30 PM");
        assert_eq!(request["fromUser"]["name"], "Pat Pupil");
    }
    assert!(app.exists(&user_doc("tutor", collections::MODIFIED_REQUESTS_IN, id)).await);
    assert!(!app.exists(&user_doc("pupil", collections::MODIFIED_REQUESTS_OUT, id)).await);
}

#[tokio::test]
async fn paid_request_files_a_sent_payment() {
    let app = common::create_test_app().await;
    let (status, body) = app
        .data(
            "pupil",
            "newRequest",
            json!({
                "request": paid_request(),
                "payment": {"method": "Stripe", "transaction": {"id": "tok_visa"}},
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["id"].as_str().unwrap();

    let request = app.doc(&user_doc("tutor", collections::REQUESTS_IN, id)).await.unwrap();
    assert_eq!(request["payment"]["amount"], 25.0);

    let sent = app.doc(&user_doc("pupil", collections::SENT_PAYMENTS, id)).await.unwrap();
    assert_eq!(sent["amount"], 25.0);
    assert_eq!(sent["method"], "Stripe");
    assert_eq!(sent["transaction"]["id"], "tok_visa");

    let triggers = app.queue.take();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].kind, TriggerKind::SentPayment);
    assert_eq!(triggers[0].user, "pupil");
    assert_eq!(triggers[0].id, id);
}

#[tokio::test]
async fn paypal_request_is_already_authorized() {
    let app = common::create_test_app().await;
    let (status, body) = app
        .data(
            "pupil",
            "newRequest",
            json!({
                "request": paid_request(),
                "payment": {"method": "PayPal", "transaction": {"id": "PAY-123"}},
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["id"].as_str().unwrap();

    for uid in ["pupil", "tutor"] {
        let auth = app.doc(&user_doc(uid, collections::AUTH_PAYMENTS, id)).await.unwrap();
        assert_eq!(auth["id"], "PAY-123");
    }
    assert!(!app.exists(&user_doc("pupil", collections::SENT_PAYMENTS, id)).await);
    assert!(app.queue.take().is_empty());
}

#[tokio::test]
async fn rejecting_a_paid_request_cancels_its_authorization() {
    let app = common::create_test_app().await;
    let (_, body) = app
        .data(
            "pupil",
            "newRequest",
            json!({
                "request": paid_request(),
                "payment": {"method": "Stripe", "transaction": {"id": "tok_visa"}},
            }),
        )
        .await;
    let id = body["id"].as_str().unwrap();
    app.queue.take();

    let (status, _) = app
        .data("tutor", "rejectRequest", json!({"request": request_ref(), "id": id}))
        .await;
    assert_eq!(status, StatusCode::OK);

    assert!(!app.exists(&user_doc("pupil", collections::SENT_PAYMENTS, id)).await);
    let triggers = app.queue.take();
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].kind, TriggerKind::AuthorizationCanceled);
}

#[tokio::test]
async fn cannot_request_a_lesson_with_yourself() {
    let app = common::create_test_app().await;
    let mut request = free_request();
    request["toUser"] = json!({"uid": "pupil"});

    let (status, body) = app.data("pupil", "newRequest", json!({"request": request})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn location_is_resolved_by_name() {
    let app = common::create_test_app().await;
    let mut request = free_request();
    request["location"] = json!({"name": LOCATION_NAME});

    let (status, body) = app.data("pupil", "newRequest", json!({"request": request})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["request"]["location"]["id"], LOCATION);
}

#[tokio::test]
async fn cancel_appointment_removes_every_projection() {
    let app = common::create_test_app().await;
    let id = app.scheduled_appointment(free_request()).await;

    let (status, body) = app
        .data("pupil", "cancelAppt", json!({"appt": appt_ref(), "id": id}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    assert!(!app.exists(&user_doc("pupil", collections::APPOINTMENTS, &id)).await);
    assert!(!app.exists(&user_doc("tutor", collections::APPOINTMENTS, &id)).await);
    assert!(!app.exists(&location_doc(collections::APPOINTMENTS, &id)).await);
    assert!(app.exists(&user_doc("tutor", collections::CANCELED_APPOINTMENTS, &id)).await);

    let tutor = app.doc(&P.user("tutor")).await.unwrap();
    assert_eq!(
        tutor["availability"][LOCATION_NAME]["Monday"][0]["booked"],
        json!(false)
    );
}

#[tokio::test]
async fn modify_appointment_rewrites_every_projection() {
    let app = common::create_test_app().await;
    let id = app.scheduled_appointment(free_request()).await;

    let mut edit = appt_ref();
    edit["time"] = json!({"day": "Tuesday", "from": "3:00 PM", "to": "4:00 PM"});
    let (status, body) = app
        .data("tutor", "modifyAppt", json!({"appt": edit, "id": id}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let appt = app.assert_projections_consistent(&id, collections::APPOINTMENTS).await;
    assert_eq!(appt["time"]["day"], "Tuesday");
    assert!(app.exists(&user_doc("pupil", collections::MODIFIED_APPOINTMENTS, &id)).await);
}

const OTHER_LOCATION: &str = "paly";

async fn seed_other_location(app: &common::TestApp) {
    app.put(
        P.location(OTHER_LOCATION),
        json!({"name": "Palo Alto High", "supervisors": ["sup"], "config": {"hrs": {}}}),
    )
    .await;
}

#[tokio::test]
async fn moving_an_appointment_moves_the_location_copy() {
    let app = common::create_test_app().await;
    seed_other_location(&app).await;
    let id = app.scheduled_appointment(free_request()).await;

    let mut edit = appt_ref();
    edit["location"] = json!({"id": OTHER_LOCATION, "name": "Palo Alto High"});
    edit["time"] = json!({"day": "Monday", "from": "3:00 PM", "to": "4:00 PM"});
    let (status, body) = app
        .data("tutor", "modifyAppt", json!({"appt": edit, "id": id}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let appt = app.assert_projections_consistent(&id, collections::APPOINTMENTS).await;
    assert_eq!(appt["location"]["id"], OTHER_LOCATION);
    assert!(!app.exists(&location_doc(collections::APPOINTMENTS, &id)).await);
    assert!(app
        .exists(&P.location(OTHER_LOCATION).child(collections::APPOINTMENTS, &id))
        .await);
}

#[tokio::test]
async fn supervisors_only_act_on_their_own_locations() {
    let app = common::create_test_app().await;
    seed_other_location(&app).await;
    let id = app.scheduled_appointment(free_request()).await;
    let foreign = common::identity_token(
        &app.state.config,
        "sup",
        "sup@example.com",
        true,
        &[OTHER_LOCATION],
    );

    let (status, _) = app
        .data_with_token("sup", &foreign, "cancelAppt", json!({"appt": appt_ref(), "id": id}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut edit = appt_ref();
    edit["time"] = json!({"day": "Tuesday", "from": "3:00 PM", "to": "4:00 PM"});
    let (status, _) = app
        .data_with_token("sup", &foreign, "modifyAppt", json!({"appt": edit, "id": id}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Holding the old location is not enough to move it somewhere else.
    let mut edit = appt_ref();
    edit["location"] = json!({"id": OTHER_LOCATION, "name": "Palo Alto High"});
    edit["time"] = json!({"day": "Monday", "from": "3:00 PM", "to": "4:00 PM"});
    let (status, _) = app
        .data("sup", "modifyAppt", json!({"appt": edit, "id": id}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let appt = app.assert_projections_consistent(&id, collections::APPOINTMENTS).await;
    assert_eq!(appt["time"]["day"], "Monday");
    assert_eq!(appt["location"]["id"], LOCATION);

    let (_, body) = app
        .data("pupil", "newRequest", json!({"request": free_request()}))
        .await;
    let request_id = body["id"].as_str().unwrap();
    let (status, _) = app
        .data_with_token(
            "sup",
            &foreign,
            "approveRequest",
            json!({"request": request_ref(), "id": request_id}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.exists(&user_doc("tutor", collections::REQUESTS_IN, request_id)).await);
}
