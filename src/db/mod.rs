// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: document paths, the store seam and its backends.

pub mod firestore;
pub mod memory;
pub mod paths;
pub mod store;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;
pub use paths::{CollectionPath, DocPath, Partition};
pub use store::{new_document_id, Document, DocumentStore, WriteBatch, WriteOp};

/// Collection names as constants.
pub mod collections {
    pub const PARTITIONS: &str = "partitions";
    pub const USERS: &str = "users";
    pub const LOCATIONS: &str = "locations";

    // Requests (under users)
    pub const REQUESTS_IN: &str = "requestsIn";
    pub const REQUESTS_OUT: &str = "requestsOut";
    pub const APPROVED_REQUESTS_OUT: &str = "approvedRequestsOut";
    pub const REJECTED_REQUESTS_OUT: &str = "rejectedRequestsOut";
    pub const CANCELED_REQUESTS_IN: &str = "canceledRequestsIn";
    pub const CANCELED_REQUESTS_OUT: &str = "canceledRequestsOut";
    pub const MODIFIED_REQUESTS_IN: &str = "modifiedRequestsIn";
    pub const MODIFIED_REQUESTS_OUT: &str = "modifiedRequestsOut";

    // Appointments (under users and locations)
    pub const APPOINTMENTS: &str = "appointments";
    pub const ACTIVE_APPOINTMENTS: &str = "activeAppointments";
    pub const PAST_APPOINTMENTS: &str = "pastAppointments";
    pub const MODIFIED_APPOINTMENTS: &str = "modifiedAppointments";
    pub const CANCELED_APPOINTMENTS: &str = "canceledAppointments";

    // Clock events (under locations)
    pub const CLOCK_INS: &str = "clockIns";
    pub const CLOCK_OUTS: &str = "clockOuts";
    pub const APPROVED_CLOCK_INS: &str = "approvedClockIns";
    pub const APPROVED_CLOCK_OUTS: &str = "approvedClockOuts";
    pub const REJECTED_CLOCK_INS: &str = "rejectedClockIns";
    pub const REJECTED_CLOCK_OUTS: &str = "rejectedClockOuts";

    // Payments (under users)
    pub const SENT_PAYMENTS: &str = "sentPayments";
    pub const AUTH_PAYMENTS: &str = "authPayments";
    pub const REQUESTED_PAYMENTS: &str = "requestedPayments";
    pub const APPROVED_PAYMENTS: &str = "approvedPayments";
    pub const DENIED_PAYMENTS: &str = "deniedPayments";
    pub const PAST_PAYMENTS: &str = "pastPayments";
    pub const REQUESTED_PAYOUTS: &str = "requestedPayouts";
    pub const PAST_PAYOUTS: &str = "pastPayouts";

    // Gateway records (keyed by user id)
    pub const GATEWAY_CUSTOMERS: &str = "stripeCustomers";
    pub const GATEWAY_ACCOUNTS: &str = "stripeAccounts";
    pub const METHODS: &str = "methods";
    pub const CARDS: &str = "cards";
    pub const REFUNDS: &str = "refunds";
}
