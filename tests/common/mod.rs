// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tutorbook_api::config::Config;
use tutorbook_api::db::{DocPath, DocumentStore, FirestoreDb, MemoryStore, Partition, WriteBatch};
use tutorbook_api::error::{AppError, Result};
use tutorbook_api::models::ConciseUser;
use tutorbook_api::routes::create_router;
use tutorbook_api::services::jwks::now_unix_secs;
use tutorbook_api::services::notify::Notifier;
use tutorbook_api::services::payments::{ChargeRequest, GatewayRecord, PaymentGateway, PayoutRequest};
use tutorbook_api::services::tasks::{PaymentTrigger, TriggerQueue};
use tutorbook_api::services::{GoogleOidcVerifier, IdentityVerifier, MemoryDirectory};
use tutorbook_api::{AppState, Collaborators};

pub const P: Partition = Partition::Test;
pub const LOCATION: &str = "gunn";
pub const LOCATION_NAME: &str = "Gunn Academic Center";
pub const TASKS_KID: &str = "test-tasks-kid";

const TEST_RSA_PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/test_rsa_private.pem");
const TEST_RSA_PUBLIC_PEM: &[u8] = include_bytes!("../fixtures/test_rsa_public.pem");

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Fakes ───────────────────────────────────────────────────────

/// Gateway that answers from memory and records every call.
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<String>>,
    charges: Mutex<Vec<ChargeRequest>>,
    payouts: Mutex<Vec<PayoutRequest>>,
    idempotency_keys: Mutex<Vec<String>>,
    decline_charges: AtomicBool,
    next_id: AtomicUsize,
}

impl FakeGateway {
    fn id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn keyed(&self, key: &str) {
        self.idempotency_keys.lock().unwrap().push(key.to_string());
    }

    /// Make every charge fail as if the card were declined.
    pub fn decline_charges(&self) {
        self.decline_charges.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().unwrap().clone()
    }

    pub fn payouts(&self) -> Vec<PayoutRequest> {
        self.payouts.lock().unwrap().clone()
    }

    /// Keys sent with money-moving calls, in call order.
    pub fn idempotency_keys(&self) -> Vec<String> {
        self.idempotency_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_customer(&self, email: &str, source: &str) -> Result<GatewayRecord> {
        self.record(format!("create_customer:{email}:{source}"));
        let id = self.id("cus");
        let card = self.id("card");
        Ok(GatewayRecord::new(
            id.clone(),
            json!({"id": id, "email": email, "sources": {"data": [{"id": card, "object": "card"}]}}),
        ))
    }

    async fn attach_source(&self, customer_id: &str, source: &str) -> Result<GatewayRecord> {
        self.record(format!("attach_source:{customer_id}:{source}"));
        let card = self.id("card");
        Ok(GatewayRecord::new(card.clone(), json!({"id": card, "customer": customer_id})))
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<GatewayRecord> {
        self.record(format!("retrieve_customer:{customer_id}"));
        Ok(GatewayRecord::new(customer_id, json!({"id": customer_id})))
    }

    async fn create_charge(&self, charge: &ChargeRequest) -> Result<GatewayRecord> {
        self.record(format!("create_charge:{}:{}", charge.amount_cents, charge.capture));
        self.keyed(&charge.idempotency_key);
        if self.decline_charges.load(Ordering::SeqCst) {
            return Err(AppError::Gateway("card_declined".to_string()));
        }
        self.charges.lock().unwrap().push(charge.clone());
        let id = self.id("ch");
        Ok(GatewayRecord::new(
            id.clone(),
            json!({"id": id, "amount": charge.amount_cents, "captured": charge.capture}),
        ))
    }

    async fn capture_charge(
        &self,
        charge_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<GatewayRecord> {
        self.record(format!("capture_charge:{charge_id}:{amount_cents}"));
        self.keyed(idempotency_key);
        if self.decline_charges.load(Ordering::SeqCst) {
            return Err(AppError::Gateway("charge_expired_for_capture".to_string()));
        }
        Ok(GatewayRecord::new(
            charge_id,
            json!({"id": charge_id, "amount": amount_cents, "captured": true}),
        ))
    }

    async fn refund_charge(&self, charge_id: &str, idempotency_key: &str) -> Result<GatewayRecord> {
        self.record(format!("refund_charge:{charge_id}"));
        self.keyed(idempotency_key);
        let id = self.id("re");
        Ok(GatewayRecord::new(id.clone(), json!({"id": id, "charge": charge_id})))
    }

    async fn create_payout(&self, payout: &PayoutRequest) -> Result<GatewayRecord> {
        self.record(format!("create_payout:{}:{}", payout.account_id, payout.amount_cents));
        self.keyed(&payout.idempotency_key);
        self.payouts.lock().unwrap().push(payout.clone());
        let id = self.id("po");
        Ok(GatewayRecord::new(
            id.clone(),
            json!({"id": id, "amount": payout.amount_cents, "status": "pending"}),
        ))
    }

    async fn connect_account(&self, code: &str) -> Result<GatewayRecord> {
        self.record(format!("connect_account:{code}"));
        let id = self.id("acct");
        Ok(GatewayRecord::new(id.clone(), json!({"id": id})))
    }

    async fn login_link(&self, account_id: &str) -> Result<String> {
        self.record(format!("login_link:{account_id}"));
        Ok(format!("https://connect.example.com/{account_id}"))
    }
}

/// Trigger sink that only remembers what was enqueued.
#[derive(Default)]
pub struct RecordingQueue {
    triggers: Mutex<Vec<PaymentTrigger>>,
}

impl RecordingQueue {
    /// Drain the triggers enqueued so far.
    pub fn take(&self) -> Vec<PaymentTrigger> {
        std::mem::take(&mut *self.triggers.lock().unwrap())
    }
}

#[async_trait]
impl TriggerQueue for RecordingQueue {
    async fn enqueue(&self, trigger: PaymentTrigger) -> Result<()> {
        self.triggers.lock().unwrap().push(trigger);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &ConciseUser, subject: &str, _message: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.uid.clone(),
            subject: subject.to_string(),
        });
        Ok(())
    }
}

// ─── App ─────────────────────────────────────────────────────────

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub queue: Arc<RecordingQueue>,
    pub notifier: Arc<RecordingNotifier>,
    pub directory: Arc<MemoryDirectory>,
}

/// App over an in-memory store with seeded users, a location and the
/// tutor's payout account.
pub async fn create_test_app() -> TestApp {
    let config = Config::test_default();
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(FakeGateway::default());
    let queue = Arc::new(RecordingQueue::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let directory = Arc::new(MemoryDirectory::new());

    let tasks_key = DecodingKey::from_rsa_pem(TEST_RSA_PUBLIC_PEM).expect("test public key");
    let collaborators = Collaborators {
        store: store.clone(),
        identity: Arc::new(IdentityVerifier::new(&config).expect("identity verifier")),
        google_oidc_verifier: Arc::new(
            GoogleOidcVerifier::new_with_static_key(&config, TASKS_KID, tasks_key)
                .expect("oidc verifier"),
        ),
        live_gateway: gateway.clone(),
        test_gateway: gateway.clone(),
        notifier: notifier.clone(),
        directory: directory.clone(),
        triggers: Some(queue.clone()),
    };
    let state = Arc::new(AppState::assemble(config, collaborators));

    let app = TestApp {
        router: create_router(state.clone()),
        state,
        store,
        gateway,
        queue,
        notifier,
        directory,
    };
    app.seed().await;
    app
}

pub fn user_json(uid: &str, name: &str, user_type: &str) -> Value {
    json!({
        "name": name,
        "email": format!("{uid}@example.com"),
        "id": format!("{uid}@example.com"),
        "uid": uid,
        "type": user_type,
        "gender": "Female",
        "grade": "Junior",
        "photo": format!("https://example.com/{uid}.png"),
        "payments": {"type": "Free", "hourlyCharge": 0},
        "proxy": [],
    })
}

impl TestApp {
    async fn seed(&self) {
        let mut tutor = user_json("tutor", "Tina Tutor", "Tutor");
        tutor["payments"] = json!({"type": "Paid", "hourlyCharge": 25});

        self.put(P.user("pupil"), user_json("pupil", "Pat Pupil", "Pupil")).await;
        self.put(P.user("tutor"), tutor).await;
        self.put(P.user("sup"), user_json("sup", "Sam Supervisor", "Supervisor")).await;
        self.put(
            P.location(LOCATION),
            json!({"name": LOCATION_NAME, "supervisors": ["sup"], "config": {"hrs": {}}}),
        )
        .await;
        self.put(P.gateway_account("tutor"), json!({"id": "acct_tutor"})).await;
    }

    pub async fn put(&self, path: DocPath, data: Value) {
        let mut batch = WriteBatch::new();
        batch.set(path, &data).unwrap();
        self.store.commit(batch).await.unwrap();
    }

    pub async fn doc(&self, path: &DocPath) -> Option<Value> {
        self.store.get(path).await.unwrap()
    }

    pub async fn exists(&self, path: &DocPath) -> bool {
        self.doc(path).await.is_some()
    }

    pub async fn count(&self, path: &tutorbook_api::db::CollectionPath) -> usize {
        self.store.list(path).await.unwrap().len()
    }

    /// Identity token for a seeded user; `sup` supervises the test location.
    pub fn token(&self, uid: &str) -> String {
        let supervisor = uid == "sup";
        let locations: Vec<&str> = if supervisor { vec![LOCATION] } else { vec![] };
        identity_token(&self.state.config, uid, &format!("{uid}@example.com"), supervisor, &locations)
    }

    /// Call the data endpoint as a seeded user.
    pub async fn data(&self, uid: &str, action: &str, body: Value) -> (StatusCode, Value) {
        let token = self.token(uid);
        self.data_with_token(uid, &token, action, body).await
    }

    pub async fn data_with_token(
        &self,
        uid: &str,
        token: &str,
        action: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let uri = format!("/data?user={uid}&action={action}&test=true&token={token}");
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    /// Assert the pupil, tutor and location copies of `collection/id`
    /// agree; returns the shared record.
    pub async fn assert_projections_consistent(&self, id: &str, collection: &str) -> Value {
        let pupil = self
            .doc(&P.user("pupil").child(collection, id))
            .await
            .unwrap_or_else(|| panic!("pupil copy of {collection}/{id} missing"));
        let location = pupil["location"]["id"].as_str().unwrap().to_string();
        let tutor = self.doc(&P.user("tutor").child(collection, id)).await;
        let at_location = self.doc(&P.location(&location).child(collection, id)).await;
        assert_eq!(tutor.as_ref(), Some(&pupil), "tutor copy of {collection}/{id}");
        assert_eq!(at_location.as_ref(), Some(&pupil), "{location} copy of {collection}/{id}");
        pupil
    }

    /// Run every queued trigger on the payment processor, in order.
    pub async fn drain_triggers(&self) -> Vec<(PaymentTrigger, Result<()>)> {
        let mut results = Vec::new();
        for trigger in self.queue.take() {
            let result = self.state.payments.handle(&trigger).await;
            results.push((trigger, result));
        }
        results
    }
}

// ─── Requests ────────────────────────────────────────────────────

pub fn free_request() -> Value {
    json!({
        "subject": "Algebra 1",
        "fromUser": {"uid": "pupil"},
        "toUser": {"uid": "tutor"},
        "time": {"day": "Monday", "from": "3:00 PM", "to": "4:00 PM"},
        "location": {"id": LOCATION, "name": LOCATION_NAME},
        "payment": {"type": "Free"},
        "message": "See you there",
    })
}

pub fn paid_request() -> Value {
    let mut request = free_request();
    request["payment"] = json!({"type": "Paid"});
    request
}

pub fn request_ref() -> Value {
    json!({"fromUser": {"uid": "pupil"}, "toUser": {"uid": "tutor"}})
}

pub fn appt_ref() -> Value {
    json!({
        "attendees": [{"uid": "pupil"}, {"uid": "tutor"}],
        "location": {"id": LOCATION, "name": LOCATION_NAME},
    })
}

impl TestApp {
    /// File and approve a request; returns the shared id.
    pub async fn scheduled_appointment(&self, request: Value) -> String {
        let (status, body) = self.data("pupil", "newRequest", json!({"request": request})).await;
        assert_eq!(status, StatusCode::OK, "newRequest: {body}");
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = self
            .data("tutor", "approveRequest", json!({"request": request_ref(), "id": id}))
            .await;
        assert_eq!(status, StatusCode::OK, "approveRequest: {body}");
        id
    }
}

// ─── Tokens ──────────────────────────────────────────────────────

/// HS256 identity token signed with the dev secret.
pub fn identity_token(
    config: &Config,
    uid: &str,
    email: &str,
    supervisor: bool,
    locations: &[&str],
) -> String {
    let now = now_unix_secs();
    let claims = json!({
        "sub": uid,
        "email": email,
        "iss": format!("https://securetoken.google.com/{}", config.gcp_project_id),
        "aud": config.gcp_project_id,
        "iat": now,
        "exp": now + 3600,
        "supervisor": supervisor,
        "locations": locations,
    });
    let secret = config.identity_dev_secret.clone().expect("dev secret");
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// RS256 OIDC token as Cloud Tasks would send it.
pub fn tasks_oidc_token(config: &Config, email: &str) -> String {
    let now = now_unix_secs();
    let claims = json!({
        "iss": "https://accounts.google.com",
        "aud": config.api_url.trim_end_matches('/'),
        "sub": "1234567890",
        "email": email,
        "email_verified": true,
        "iat": now,
        "exp": now + 3600,
    });
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TASKS_KID.to_string());
    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(TEST_RSA_PRIVATE_PEM).expect("test private key"),
    )
    .unwrap()
}
