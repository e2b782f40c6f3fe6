// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Connected payout accounts, card filing and the gateway webhook.

use crate::db::Partition;
use crate::error::{AppError, Result};
use crate::middleware::auth::{require_identity, AuthUser};
use crate::models::Transaction;
use crate::routes::data::is_set;
use crate::services::tasks::{PaymentTrigger, TriggerKind};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Oldest webhook timestamp accepted, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let accounts = Router::new()
        .route("/payments/account/init", get(init_account))
        .route("/payments/account/url", get(account_url))
        .route("/payments/methods", post(add_method))
        .route_layer(middleware::from_fn_with_state(state, require_identity));

    Router::new()
        .route("/webhooks/stripe", post(stripe_webhook))
        .merge(accounts)
}

#[derive(Debug, Deserialize)]
struct AccountParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    test: Option<String>,
    #[serde(default)]
    sandbox: Option<String>,
}

impl AccountParams {
    fn partition(&self) -> Partition {
        Partition::from_flags(is_set(self.test.as_deref()), is_set(self.sandbox.as_deref()))
    }
}

/// Finish connecting the caller's payout account.
async fn init_account(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<AccountParams>,
) -> Result<Json<Value>> {
    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing code".to_string()))?;
    let url = state
        .payments
        .init_account(params.partition(), &auth.uid, code)
        .await?;
    Ok(Json(json!({ "url": url })))
}

/// Login link for the caller's stored payout account.
async fn account_url(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<AccountParams>,
) -> Result<Json<Value>> {
    let url = state
        .payments
        .account_login_link(params.partition(), &auth.uid)
        .await?;
    Ok(Json(json!({ "url": url })))
}

/// File a card token for the caller. The gateway customer is updated by
/// the payment processor.
async fn add_method(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<AccountParams>,
    Json(method): Json<Transaction>,
) -> Result<Json<Value>> {
    let partition = params.partition();
    let id = state.payments.file_method(partition, &auth.uid, &method).await?;

    let trigger = PaymentTrigger::new(TriggerKind::PaymentMethod, partition, &auth.uid, &id);
    if let Err(e) = state.triggers.enqueue(trigger).await {
        tracing::error!(user = %auth.uid, id = %id, error = %e, "Failed to enqueue payment method");
    }
    Ok(Json(json!({ "id": id })))
}

/// Check a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) against
/// `body`.
pub fn verify_signature(secret: &str, header: &str, body: &[u8], now_secs: i64) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| AppError::BadRequest("signature has no timestamp".to_string()))?;
    if (now_secs - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::BadRequest("signature timestamp outside tolerance".to_string()));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if signatures
        .iter()
        .any(|sig| bool::from(sig.as_bytes().ct_eq(expected.as_bytes())))
    {
        Ok(())
    } else {
        Err(AppError::BadRequest("webhook signature mismatch".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayoutMetadata {
    partition: Partition,
    user: String,
    payout_doc: String,
}

async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing Stripe-Signature".to_string()))?;
    if let Err(e) = verify_signature(
        &state.config.stripe_webhook_secret,
        signature,
        &body,
        chrono::Utc::now().timestamp(),
    ) {
        tracing::warn!(error = %e, "Security Alert: rejected webhook with bad signature");
        return Err(e);
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid webhook event: {e}")))?;

    let Some(status) = event.kind.strip_prefix("payout.") else {
        tracing::debug!(kind = %event.kind, "Ignoring webhook event");
        return Ok(StatusCode::OK);
    };
    if !matches!(status, "paid" | "failed" | "canceled") {
        tracing::debug!(kind = %event.kind, "Ignoring payout event");
        return Ok(StatusCode::OK);
    }

    let metadata: PayoutMetadata = match event
        .data
        .object
        .get("metadata")
        .cloned()
        .map(serde_json::from_value)
    {
        Some(Ok(metadata)) => metadata,
        _ => {
            tracing::warn!(kind = %event.kind, "Payout event without our metadata");
            return Ok(StatusCode::OK);
        }
    };

    let found = state
        .payments
        .record_payout_status(metadata.partition, &metadata.user, &metadata.payout_doc, status)
        .await?;
    if !found {
        tracing::warn!(
            user = %metadata.user,
            payout_doc = %metadata.payout_doc,
            "Payout event for unknown payout"
        );
    }
    Ok(StatusCode::OK)
}
