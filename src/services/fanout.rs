// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Projection paths for fan-out writes.
//!
//! Every projection of one logical record shares the same document id.

use crate::db::{DocPath, Partition};
use crate::models::Appointment;

/// `users/{uid}/{collection}/{id}`
pub fn user_doc(partition: Partition, uid: &str, collection: &str, id: &str) -> DocPath {
    partition.user(uid).child(collection, id)
}

/// The same document under both attendees.
pub fn attendee_docs(
    partition: Partition,
    appt: &Appointment,
    collection: &str,
    id: &str,
) -> [DocPath; 2] {
    [
        user_doc(partition, &appt.attendees[0].uid, collection, id),
        user_doc(partition, &appt.attendees[1].uid, collection, id),
    ]
}

/// `locations/{location}/{collection}/{id}`
pub fn location_doc(partition: Partition, location_id: &str, collection: &str, id: &str) -> DocPath {
    partition.location(location_id).child(collection, id)
}

/// Both attendees plus the location.
pub fn appointment_docs(
    partition: Partition,
    appt: &Appointment,
    collection: &str,
    id: &str,
) -> [DocPath; 3] {
    let [first, second] = attendee_docs(partition, appt, collection, id);
    [
        first,
        second,
        location_doc(partition, &appt.location.id, collection, id),
    ]
}
