// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clock-in and clock-out events awaiting supervisor review.

use crate::models::appointment::{ActiveAppointment, Appointment, ClockStamp};
use crate::models::user::ConciseUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A clock event as filed under `locations/{id}/clockIns|clockOuts`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockEvent<T> {
    pub sent_by: ConciseUser,
    pub sent_timestamp: DateTime<Utc>,
    #[serde(rename = "for")]
    pub record: T,
}

impl<T> ClockEvent<T> {
    /// The stamp carried into the successor appointment.
    pub fn stamp(&self) -> ClockStamp {
        ClockStamp {
            sent_by: self.sent_by.clone(),
            sent_timestamp: self.sent_timestamp,
            approved_by: None,
            approved_timestamp: None,
        }
    }
}

pub type ClockIn = ClockEvent<Appointment>;
pub type ClockOut = ClockEvent<ActiveAppointment>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedClockEvent<T> {
    #[serde(flatten)]
    pub event: ClockEvent<T>,
    pub approved_by: ConciseUser,
    pub approved_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedClockEvent<T> {
    #[serde(flatten)]
    pub event: ClockEvent<T>,
    pub rejected_by: ConciseUser,
    pub rejected_timestamp: DateTime<Utc>,
}
