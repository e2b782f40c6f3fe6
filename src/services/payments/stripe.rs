// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe API client.
//!
//! Form-encoded requests against the REST API. All amounts are in cents
//! and USD.

use crate::error::AppError;
use crate::error::Result;
use crate::services::payments::gateway::{
    ChargeRequest, GatewayRecord, PaymentGateway, PayoutRequest,
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";
const CONNECT_OAUTH_URL: &str = "https://connect.stripe.com/oauth/token";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const CURRENCY: &str = "usd";

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?,
            secret_key: secret_key.to_string(),
            base_url: STRIPE_API_URL.to_string(),
        })
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, String)],
        connected_account: Option<&str>,
        idempotency_key: Option<&str>,
    ) -> Result<GatewayRecord> {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form);
        if let Some(account) = connected_account {
            request = request.header("Stripe-Account", account);
        }
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("POST {} failed: {}", path, e)))?;

        Self::check_response(path, response).await
    }

    async fn get(&self, path: &str) -> Result<GatewayRecord> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("GET {} failed: {}", path, e)))?;

        Self::check_response(path, response).await
    }

    /// Check response status and turn the body into a record.
    async fn check_response(path: &str, response: reqwest::Response) -> Result<GatewayRecord> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("{} returned invalid JSON: {}", path, e)))?;

        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "{} returned HTTP {}: {}",
                path,
                status,
                error_message(&body)
            )));
        }

        let id = body
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(GatewayRecord::new(id, body))
    }
}

/// The human-readable part of a Stripe error body.
fn error_message(body: &Value) -> &str {
    body.pointer("/error/message")
        .or_else(|| body.get("error_description"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_customer(&self, email: &str, source: &str) -> Result<GatewayRecord> {
        self.post_form(
            "/customers",
            &[("email", email.to_string()), ("source", source.to_string())],
            None,
            None,
        )
        .await
    }

    async fn attach_source(&self, customer_id: &str, source: &str) -> Result<GatewayRecord> {
        self.post_form(
            &format!("/customers/{customer_id}/sources"),
            &[("source", source.to_string())],
            None,
            None,
        )
        .await
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<GatewayRecord> {
        self.get(&format!("/customers/{customer_id}")).await
    }

    async fn create_charge(&self, charge: &ChargeRequest) -> Result<GatewayRecord> {
        self.post_form(
            "/charges",
            &[
                ("amount", charge.amount_cents.to_string()),
                ("currency", CURRENCY.to_string()),
                ("customer", charge.customer_id.clone()),
                ("application_fee_amount", charge.application_fee_cents.to_string()),
                ("capture", charge.capture.to_string()),
                ("transfer_data[destination]", charge.destination_account.clone()),
                ("description", charge.description.clone()),
            ],
            None,
            Some(&charge.idempotency_key),
        )
        .await
    }

    async fn capture_charge(
        &self,
        charge_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<GatewayRecord> {
        self.post_form(
            &format!("/charges/{charge_id}/capture"),
            &[("amount", amount_cents.to_string())],
            None,
            Some(idempotency_key),
        )
        .await
    }

    async fn refund_charge(&self, charge_id: &str, idempotency_key: &str) -> Result<GatewayRecord> {
        self.post_form(
            "/refunds",
            &[("charge", charge_id.to_string())],
            None,
            Some(idempotency_key),
        )
        .await
    }

    async fn create_payout(&self, payout: &PayoutRequest) -> Result<GatewayRecord> {
        let metadata: Vec<(String, String)> = payout
            .metadata
            .iter()
            .map(|(k, v)| (format!("metadata[{k}]"), v.clone()))
            .collect();
        let mut form = vec![
            ("amount", payout.amount_cents.to_string()),
            ("currency", CURRENCY.to_string()),
        ];
        form.extend(metadata.iter().map(|(k, v)| (k.as_str(), v.clone())));

        self.post_form(
            "/payouts",
            &form,
            Some(&payout.account_id),
            Some(&payout.idempotency_key),
        )
        .await
    }

    async fn connect_account(&self, code: &str) -> Result<GatewayRecord> {
        let response = self
            .http
            .post(CONNECT_OAUTH_URL)
            .form(&[
                ("client_secret", self.secret_key.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Account connection request failed: {}", e)))?;

        let token = Self::check_response("/oauth/token", response).await?;
        let account_id = token
            .data
            .get("stripe_user_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Gateway("OAuth response had no stripe_user_id".to_string()))?;

        self.get(&format!("/accounts/{account_id}")).await
    }

    async fn login_link(&self, account_id: &str) -> Result<String> {
        let link = self
            .post_form(&format!("/accounts/{account_id}/login_links"), &[], None, None)
            .await?;
        link.data
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Gateway("login link response had no url".to_string()))
    }
}
