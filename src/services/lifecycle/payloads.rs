// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound payload shapes.
//!
//! Most transitions only need enough of the client's copy of a record to
//! find the stored one, so these types keep just the locating fields and
//! ignore the rest.

use crate::models::{LocationRef, Request, TimeSlot, Transaction};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A user named inside a record, by uid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PartyRef {
    pub uid: String,
}

/// Locates a request pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRef {
    pub from_user: PartyRef,
    pub to_user: PartyRef,
}

/// Locates an appointment (scheduled, active or past).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApptRef {
    pub attendees: [PartyRef; 2],
    #[serde(default)]
    pub location: LocationRef,
}

impl ApptRef {
    pub fn has_attendee(&self, uid: &str) -> bool {
        self.attendees.iter().any(|a| a.uid == uid)
    }
}

/// Locates a pending clock-in or clock-out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClockRef {
    #[serde(rename = "for")]
    pub record: ApptRef,
}

/// Edits to a scheduled appointment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApptEdit {
    pub attendees: [PartyRef; 2],
    #[serde(default)]
    pub location: LocationRef,
    pub time: TimeSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampTimes {
    pub sent_timestamp: DateTime<Utc>,
}

/// A past appointment entered or corrected by a supervisor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastApptEdit {
    pub attendees: [PartyRef; 2],
    #[serde(default)]
    pub location: LocationRef,
    pub time: TimeSlot,
    pub clock_in: StampTimes,
    pub clock_out: StampTimes,
    #[serde(rename = "for", default)]
    pub request: Option<Request>,
}

impl PastApptEdit {
    pub fn has_attendee(&self, uid: &str) -> bool {
        self.attendees.iter().any(|a| a.uid == uid)
    }
}

/// Payment details sent with a new paid request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentDraft {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub transaction: Transaction,
}
