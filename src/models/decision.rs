// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Records left behind when someone decides on a request, appointment or
//! payment: the decided record plus who decided and when.

use crate::models::appointment::Appointment;
use crate::models::payment::RequestedPayment;
use crate::models::request::Request;
use crate::models::user::ConciseUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! decision_record {
    ($(#[$meta:meta])* $name:ident, $record:ty, $by:literal, $at:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(rename = "for")]
            pub record: $record,
            #[serde(rename = $by)]
            pub by: ConciseUser,
            #[serde(rename = $at)]
            pub timestamp: DateTime<Utc>,
        }

        impl $name {
            pub fn new(record: $record, by: &ConciseUser, timestamp: DateTime<Utc>) -> Self {
                Self {
                    record,
                    by: by.clone(),
                    timestamp,
                }
            }
        }
    };
}

decision_record!(
    /// Stored as `approvedRequestsOut` under the sender.
    ApprovedRequest, Request, "approvedBy", "approvedTimestamp"
);
decision_record!(
    /// Stored as `rejectedRequestsOut` under the sender.
    RejectedRequest, Request, "rejectedBy", "rejectedTimestamp"
);
decision_record!(CanceledRequest, Request, "canceledBy", "canceledTimestamp");
decision_record!(ModifiedRequest, Request, "modifiedBy", "modifiedTimestamp");
decision_record!(ModifiedAppointment, Appointment, "modifiedBy", "modifiedTimestamp");
decision_record!(CanceledAppointment, Appointment, "canceledBy", "canceledTimestamp");
decision_record!(
    /// Stored under both attendees when the payer declines a payment.
    DeniedPayment, RequestedPayment, "deniedBy", "deniedTimestamp"
);
