// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booked/open availability recomputation.

use crate::db::{collections, Partition, WriteBatch};
use crate::error::{AppError, Result};
use crate::models::user::{Availability, AvailabilitySlot};
use crate::models::{Appointment, User};
use crate::services::lifecycle::LifecycleEngine;
use serde_json::json;

/// Mark availability windows booked by `appointments`.
///
/// Every appointment contributes one booked window under its location name
/// and day. Stored windows no appointment occupies are kept, unbooked.
pub fn booked_availability(stored: &Availability, appointments: &[Appointment]) -> Availability {
    let mut result = Availability::new();

    for appt in appointments {
        let slots = result
            .entry(appt.location.name.clone())
            .or_default()
            .entry(appt.time.day.clone())
            .or_default();
        if !slots.iter().any(|s| s.open == appt.time.from && s.close == appt.time.to) {
            slots.push(AvailabilitySlot {
                open: appt.time.from.clone(),
                close: appt.time.to.clone(),
                booked: true,
            });
        }
    }

    for (location, days) in stored {
        let by_day = result.entry(location.clone()).or_default();
        for (day, windows) in days {
            let slots = by_day.entry(day.clone()).or_default();
            for window in windows {
                if !slots.iter().any(|s| s.open == window.open && s.close == window.close) {
                    slots.push(AvailabilitySlot {
                        open: window.open.clone(),
                        close: window.close.clone(),
                        booked: false,
                    });
                }
            }
        }
    }

    result
}

impl LifecycleEngine {
    /// Recompute a user's availability from their current appointments.
    pub async fn update_user_availability(&self, partition: Partition, uid: &str) -> Result<()> {
        let _profile = self.lock_profile(partition, uid).await;
        let user_path = partition.user(uid);
        let user: User = self
            .store
            .get_as(&user_path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user ({uid})")))?;

        let appointments: Vec<Appointment> = self
            .store
            .list_as(&user_path.collection(collections::APPOINTMENTS))
            .await?
            .into_iter()
            .map(|(_, appt)| appt)
            .collect();

        let availability = booked_availability(&user.availability, &appointments);
        if availability == user.availability {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        batch.merge(user_path, json!({ "availability": availability }))?;
        self.store.commit(batch).await?;

        tracing::debug!(user = uid, appointments = appointments.len(), "Refreshed availability");
        Ok(())
    }

    /// Refresh availability for each user, logging failures.
    pub(crate) async fn refresh_availability(&self, partition: Partition, uids: &[&str]) {
        for uid in uids {
            if let Err(e) = self.update_user_availability(partition, uid).await {
                tracing::warn!(user = uid, error = %e, "Availability refresh failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationRef, TimeSlot};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn appt(location: &str, day: &str, from: &str, to: &str) -> Appointment {
        Appointment {
            location: LocationRef {
                id: location.to_lowercase(),
                name: location.to_string(),
            },
            time: TimeSlot {
                day: day.into(),
                from: from.into(),
                to: to.into(),
            },
            ..Default::default()
        }
    }

    fn slot(open: &str, close: &str, booked: bool) -> AvailabilitySlot {
        AvailabilitySlot {
            open: open.into(),
            close: close.into(),
            booked,
        }
    }

    #[test]
    fn appointments_book_matching_windows() {
        let mut stored = Availability::new();
        stored.insert(
            "Gunn".into(),
            BTreeMap::from([(
                "Monday".to_string(),
                vec![slot("3:00 PM", "4:00 PM", false), slot("A Period", "A Period", true)],
            )]),
        );

        let result = booked_availability(&stored, &[appt("Gunn", "Monday", "3:00 PM", "4:00 PM")]);
        assert_eq!(
            result["Gunn"]["Monday"],
            vec![slot("3:00 PM", "4:00 PM", true), slot("A Period", "A Period", false)]
        );
    }

    #[test]
    fn duplicate_appointments_book_once() {
        let appts = [
            appt("Gunn", "Friday", "B Period", "B Period"),
            appt("Gunn", "Friday", "B Period", "B Period"),
        ];
        let result = booked_availability(&Availability::new(), &appts);
        assert_eq!(result["Gunn"]["Friday"].len(), 1);
    }

    fn windows() -> impl Strategy<Value = Vec<(u8, u8, u8)>> {
        prop::collection::vec((0u8..2, 0u8..3, 0u8..4), 0..12)
    }

    fn build(entries: &[(u8, u8, u8)]) -> (Availability, Vec<Appointment>) {
        let locations = ["Gunn", "Paly"];
        let days = ["Monday", "Tuesday", "Wednesday"];
        let times = ["A Period", "B Period", "3:00 PM", "4:00 PM"];
        let mut stored = Availability::new();
        let mut appts = Vec::new();
        for (i, (l, d, t)) in entries.iter().enumerate() {
            let (loc, day, time) = (locations[*l as usize], days[*d as usize], times[*t as usize]);
            if i % 2 == 0 {
                stored
                    .entry(loc.into())
                    .or_default()
                    .entry(day.into())
                    .or_default()
                    .push(slot(time, time, i % 4 == 0));
            } else {
                appts.push(appt(loc, day, time, time));
            }
        }
        (stored, appts)
    }

    proptest! {
        #[test]
        fn every_appointment_is_booked_and_windows_survive(entries in windows()) {
            let (stored, appts) = build(&entries);
            let result = booked_availability(&stored, &appts);

            for a in &appts {
                let slots = &result[&a.location.name][&a.time.day];
                prop_assert!(slots.iter().any(|s| s.open == a.time.from && s.booked));
            }
            for (loc, days) in &stored {
                for (day, windows) in days {
                    for w in windows {
                        let booked = appts.iter().any(|a| {
                            a.location.name == *loc && a.time.day == *day && a.time.from == w.open
                        });
                        let slots = &result[loc][day];
                        prop_assert!(slots.iter().any(|s| s.open == w.open && s.booked == booked));
                    }
                }
            }
            for days in result.values() {
                for slots in days.values() {
                    for (i, s) in slots.iter().enumerate() {
                        prop_assert!(!slots[i + 1..].iter().any(|o| o.open == s.open && o.close == s.close));
                    }
                }
            }
        }
    }
}
