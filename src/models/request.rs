// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lesson requests.

use crate::models::location::LocationRef;
use crate::models::user::{ConciseUser, PaymentType};
use crate::time_utils::window_hours;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Weekly lesson slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TimeSlot {
    #[validate(length(min = 1))]
    pub day: String,
    #[validate(length(min = 1))]
    pub from: String,
    #[validate(length(min = 1))]
    pub to: String,
}

impl TimeSlot {
    /// Lesson length in hours when both ends are clock times.
    pub fn duration_hours(&self) -> Option<f64> {
        window_hours(&self.from, &self.to)
    }

    fn trim(&mut self) {
        trim_in_place(&mut self.day);
        trim_in_place(&mut self.from);
        trim_in_place(&mut self.to);
    }
}

/// Payment terms attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerms {
    #[serde(default, rename = "type")]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// A lesson request, stored as `requestsOut` under the sender and
/// `requestsIn` under the recipient with the same ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[validate(length(min = 1))]
    pub subject: String,
    #[validate(nested)]
    pub time: TimeSlot,
    #[serde(default)]
    pub location: LocationRef,
    #[serde(default)]
    pub from_user: ConciseUser,
    #[serde(default)]
    pub to_user: ConciseUser,
    #[serde(default)]
    pub payment: PaymentTerms,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Request {
    pub fn is_paid(&self) -> bool {
        self.payment.payment_type == PaymentType::Paid
    }

    /// Whether `uid` is one of the two parties.
    pub fn involves(&self, uid: &str) -> bool {
        self.from_user.uid == uid || self.to_user.uid == uid
    }

    /// Trim surrounding whitespace from every free-text field.
    pub fn trim(&mut self) {
        trim_in_place(&mut self.subject);
        trim_in_place(&mut self.message);
        trim_in_place(&mut self.location.id);
        trim_in_place(&mut self.location.name);
        self.time.trim();
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}
