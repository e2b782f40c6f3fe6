// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The card/payout gateway seam.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// An object returned by the gateway: its id plus the raw body, which is
/// stored as-is under `stripeCustomers` / `stripeAccounts`.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRecord {
    pub id: String,
    pub data: Value,
}

impl GatewayRecord {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn status(&self) -> Option<&str> {
        self.data.get("status").and_then(Value::as_str)
    }
}

/// A charge from a customer to a connected tutor account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount_cents: i64,
    pub application_fee_cents: i64,
    pub customer_id: String,
    pub destination_account: String,
    /// false to only authorize
    pub capture: bool,
    pub description: String,
    pub idempotency_key: String,
}

/// A payout from a connected account's balance to its bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutRequest {
    pub account_id: String,
    pub amount_cents: i64,
    pub metadata: Vec<(String, String)>,
    pub idempotency_key: String,
}

/// Money-moving calls carry an idempotency key, so a redelivered trigger
/// gets the original result back instead of moving money twice.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer paying with `source` (a card token).
    async fn create_customer(&self, email: &str, source: &str) -> Result<GatewayRecord>;

    /// Attach another card to an existing customer, returning the card.
    async fn attach_source(&self, customer_id: &str, source: &str) -> Result<GatewayRecord>;

    async fn retrieve_customer(&self, customer_id: &str) -> Result<GatewayRecord>;

    async fn create_charge(&self, charge: &ChargeRequest) -> Result<GatewayRecord>;

    /// Capture a previously authorized charge.
    async fn capture_charge(
        &self,
        charge_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<GatewayRecord>;

    async fn refund_charge(&self, charge_id: &str, idempotency_key: &str) -> Result<GatewayRecord>;

    async fn create_payout(&self, payout: &PayoutRequest) -> Result<GatewayRecord>;

    /// Finish connecting a tutor's payout account from an OAuth code.
    async fn connect_account(&self, code: &str) -> Result<GatewayRecord>;

    /// Dashboard login URL for a connected account.
    async fn login_link(&self, account_id: &str) -> Result<String>;
}
