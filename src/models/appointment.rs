// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Appointments and their clocked successors.
//!
//! An appointment embeds the request it came from under `for`. Stamps never
//! embed anything, so snapshots stay at most two levels deep.

use crate::models::location::LocationRef;
use crate::models::request::{Request, TimeSlot};
use crate::models::user::ConciseUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled lesson, stored under both attendees and the location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub attendees: [ConciseUser; 2],
    pub location: LocationRef,
    pub time: TimeSlot,
    #[serde(rename = "for")]
    pub request: Request,
    pub timestamp: DateTime<Utc>,
}

impl Appointment {
    /// Snapshot an approved request as an appointment.
    pub fn from_request(request: &Request, now: DateTime<Utc>) -> Self {
        let mut snapshot = request.clone();
        snapshot.timestamp = snapshot.timestamp.or(Some(now));
        Appointment {
            attendees: [request.from_user.clone(), request.to_user.clone()],
            location: request.location.clone(),
            time: request.time.clone(),
            request: snapshot,
            timestamp: now,
        }
    }

    pub fn has_attendee(&self, uid: &str) -> bool {
        self.attendees.iter().any(|a| a.uid == uid)
    }

    /// The attendee who is not `uid`.
    pub fn other_attendee(&self, uid: &str) -> Option<&ConciseUser> {
        match &self.attendees {
            [a, b] if a.uid == uid => Some(b),
            [a, b] if b.uid == uid => Some(a),
            _ => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.request.is_paid()
    }
}

/// Who clocked and when, plus the approving supervisor once approved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockStamp {
    pub sent_by: ConciseUser,
    pub sent_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<ConciseUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_timestamp: Option<DateTime<Utc>>,
}

impl ClockStamp {
    pub fn approved(mut self, by: &ConciseUser, at: DateTime<Utc>) -> Self {
        self.approved_by = Some(by.clone());
        self.approved_timestamp = Some(at);
        self
    }
}

/// An appointment that has been clocked into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub clock_in: ClockStamp,
}

/// A finished appointment with both clock stamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub clock_in: ClockStamp,
    pub clock_out: ClockStamp,
}

impl PastAppointment {
    /// Clocked service time in seconds, never negative.
    pub fn service_seconds(&self) -> f64 {
        let elapsed = self.clock_out.sent_timestamp - self.clock_in.sent_timestamp;
        (elapsed.num_milliseconds().max(0) as f64) / 1000.0
    }
}
