// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The payment chain: sent -> authorized -> requested -> approved/denied ->
//! past, and tutor payouts.
//!
//! Amounts are stored in dollars; the gateway is called in cents.

use crate::models::appointment::Appointment;
use crate::models::request::Request;
use crate::models::user::ConciseUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How the payer pays for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Card token authorized by the payment processor.
    Stripe,
    /// Already authorized by the client with an external transaction.
    PayPal,
}

impl PaymentMethod {
    /// Parse a method label. Unknown labels fall back to `Stripe`, and
    /// the second value reports whether the label was recognized.
    pub fn from_label(label: Option<&str>) -> (Self, bool) {
        match label {
            Some("Stripe") => (PaymentMethod::Stripe, true),
            Some("PayPal") => (PaymentMethod::PayPal, true),
            _ => (PaymentMethod::Stripe, false),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Stripe => "Stripe",
            PaymentMethod::PayPal => "PayPal",
        }
    }
}

/// Client-side payment handle: a card token or an external transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payment intent filed with a new paid request, awaiting authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentPayment {
    pub from: ConciseUser,
    pub to: ConciseUser,
    pub amount: f64,
    #[serde(rename = "for")]
    pub request: Request,
    pub method: String,
    #[serde(default)]
    pub transaction: Transaction,
    pub timestamp: DateTime<Utc>,
}

/// An authorized, uncaptured charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayment {
    /// Gateway charge (or external transaction) id
    pub id: String,
    pub from: ConciseUser,
    pub to: ConciseUser,
    pub amount: f64,
    #[serde(rename = "for")]
    pub request: Request,
    pub timestamp: DateTime<Utc>,
}

/// A tutor's request that the payer pay for a finished appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedPayment {
    pub from: ConciseUser,
    pub to: ConciseUser,
    pub amount: f64,
    #[serde(rename = "for")]
    pub appointment: Appointment,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedPayment {
    #[serde(flatten)]
    pub payment: RequestedPayment,
    pub approved_by: ConciseUser,
    pub approved_timestamp: DateTime<Utc>,
}

/// A captured charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastPayment {
    pub id: String,
    pub from: ConciseUser,
    pub to: ConciseUser,
    pub amount: f64,
    /// Application fee kept from `amount`
    #[serde(default)]
    pub fee: f64,
    #[serde(rename = "for")]
    pub appointment: Appointment,
    pub timestamp: DateTime<Utc>,
    /// Set once the amount has been paid out to the tutor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_id: Option<String>,
}

impl PastPayment {
    /// Tutor's share of this payment, in cents.
    pub fn net_cents(&self) -> i64 {
        to_cents(self.amount) - to_cents(self.fee)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedPayout {
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastPayout {
    /// Gateway payout id
    pub id: String,
    pub amount: f64,
    pub status: String,
    /// `pastPayments` document ids included in this payout
    pub payments: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Convert a dollar amount to whole cents.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Application fee on a charge, rounded down to the cent.
pub fn fee_cents(amount_cents: i64, percent: u32) -> i64 {
    amount_cents * i64::from(percent) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_conversion_rounds() {
        assert_eq!(to_cents(25.0), 2500);
        assert_eq!(to_cents(0.1 + 0.2), 30);
        assert_eq!(to_cents(19.999), 2000);
        assert_eq!(from_cents(1999), 19.99);
    }

    #[test]
    fn fee_is_floored_percentage() {
        assert_eq!(fee_cents(2500, 10), 250);
        assert_eq!(fee_cents(999, 10), 99);
        assert_eq!(fee_cents(999, 0), 0);
    }

    #[test]
    fn unknown_method_defaults_to_card() {
        assert_eq!(PaymentMethod::from_label(Some("PayPal")), (PaymentMethod::PayPal, true));
        assert_eq!(PaymentMethod::from_label(Some("Venmo")), (PaymentMethod::Stripe, false));
        assert_eq!(PaymentMethod::from_label(None), (PaymentMethod::Stripe, false));
    }
}
