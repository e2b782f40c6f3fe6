// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled and past appointment transitions.

use super::hours::round_service_window;
use super::{
    ensure_party_or_supervisor, ensure_supervises, invalid, ApptEdit, ApptRef, Context,
    LifecycleEngine, PastApptEdit,
};
use crate::db::{collections, new_document_id, WriteBatch};
use crate::error::{AppError, Result};
use crate::models::{
    Appointment, CanceledAppointment, ClockStamp, ModifiedAppointment, PastAppointment,
    PaymentTerms, Request,
};
use crate::services::fanout::{appointment_docs, location_doc, user_doc};
use crate::services::tasks::{PaymentTrigger, TriggerKind};
use serde_json::{json, Value};
use validator::Validate;

impl LifecycleEngine {
    pub async fn modify_appt(&self, ctx: &Context, edit: ApptEdit, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let path = user_doc(p, &edit.attendees[0].uid, collections::APPOINTMENTS, id);
        let stored: Appointment = self.store.require(&path, "appointment").await?;
        let parties = [stored.attendees[0].uid.as_str(), stored.attendees[1].uid.as_str()];
        ensure_party_or_supervisor(ctx, &parties, &stored.location.id)?;

        let mut time = edit.time;
        time.day = time.day.trim().to_string();
        time.from = time.from.trim().to_string();
        time.to = time.to.trim().to_string();
        time.validate().map_err(invalid)?;
        let (location, _) = self.resolve_location(p, &edit.location).await?;
        ensure_party_or_supervisor(ctx, &parties, &location.id)?;

        let old_location = stored.location.id.clone();
        let appt = Appointment {
            time,
            location,
            ..stored
        };
        let modified = ModifiedAppointment::new(appt.clone(), &ctx.actor.concise, ctx.now);

        let mut batch = WriteBatch::new();
        for attendee in &appt.attendees {
            if attendee.uid != ctx.uid() {
                batch.set(
                    user_doc(p, &attendee.uid, collections::MODIFIED_APPOINTMENTS, id),
                    &modified,
                )?;
            }
        }
        if !ctx.supervises(&appt.location.id) {
            batch.set(
                location_doc(p, &appt.location.id, collections::MODIFIED_APPOINTMENTS, id),
                &modified,
            )?;
        }
        if old_location != appt.location.id {
            batch.delete_if_exists(location_doc(p, &old_location, collections::APPOINTMENTS, id));
        }
        batch.set_all(appointment_docs(p, &appt, collections::APPOINTMENTS, id), &appt)?;
        self.store.commit(batch).await?;

        let [a, b] = &appt.attendees;
        self.refresh_availability(p, &[&a.uid, &b.uid]).await;

        tracing::info!(partition = %p, action = "modifyAppt", id, location = %appt.location.id, "Modified appointment");
        Ok(json!({ "appt": appt, "id": id }))
    }

    pub async fn cancel_appt(&self, ctx: &Context, locator: &ApptRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let path = user_doc(p, &locator.attendees[0].uid, collections::APPOINTMENTS, id);
        let appt: Appointment = self.store.require(&path, "appointment").await?;
        let [a, b] = &appt.attendees;
        ensure_party_or_supervisor(ctx, &[&a.uid, &b.uid], &appt.location.id)?;
        let canceled = CanceledAppointment::new(appt.clone(), &ctx.actor.concise, ctx.now);

        let mut batch = WriteBatch::new();
        for attendee in &appt.attendees {
            if attendee.uid != ctx.uid() {
                batch.set(
                    user_doc(p, &attendee.uid, collections::CANCELED_APPOINTMENTS, id),
                    &canceled,
                )?;
            }
        }
        batch.set(
            location_doc(p, &appt.location.id, collections::CANCELED_APPOINTMENTS, id),
            &canceled,
        )?;
        if appt.is_paid() {
            for attendee in &appt.attendees {
                batch.delete_if_exists(user_doc(p, &attendee.uid, collections::AUTH_PAYMENTS, id));
            }
        }
        for doc in appointment_docs(p, &appt, collections::APPOINTMENTS, id) {
            if doc == path {
                batch.delete(doc);
            } else {
                batch.delete_if_exists(doc);
            }
        }
        self.store.commit(batch).await?;

        if appt.is_paid() {
            let payer = &appt.request.from_user.uid;
            self.enqueue(PaymentTrigger::new(TriggerKind::AuthorizationCanceled, p, payer, id))
                .await;
        }
        self.refresh_availability(p, &[&a.uid, &b.uid]).await;

        tracing::info!(partition = %p, action = "cancelAppt", id, paid = appt.is_paid(), "Canceled appointment");
        Ok(json!({ "appt": appt, "id": id }))
    }

    /// Record a past appointment that was never clocked.
    pub async fn new_past_appt(&self, ctx: &Context, draft: PastApptEdit) -> Result<Value> {
        let p = ctx.partition;
        let (location, stored_location) = self.resolve_location(p, &draft.location).await?;
        ensure_supervises(ctx, &location.id)?;
        draft.time.validate().map_err(invalid)?;
        check_window(&draft)?;

        let attendees = [
            self.concise_user(p, &draft.attendees[0].uid).await?,
            self.concise_user(p, &draft.attendees[1].uid).await?,
        ];
        let request = match draft.request {
            Some(mut request) => {
                request.from_user = attendees[0].clone();
                request.to_user = attendees[1].clone();
                request.location = location.clone();
                request
            }
            None => Request {
                subject: String::new(),
                time: draft.time.clone(),
                location: location.clone(),
                from_user: attendees[0].clone(),
                to_user: attendees[1].clone(),
                payment: PaymentTerms::default(),
                message: String::new(),
                timestamp: Some(ctx.now),
            },
        };

        let (clock_in, clock_out) = round_service_window(
            &stored_location.config.hrs,
            draft.clock_in.sent_timestamp,
            draft.clock_out.sent_timestamp,
        );
        let stamp = |at| {
            ClockStamp {
                sent_by: ctx.actor.concise.clone(),
                sent_timestamp: at,
                ..Default::default()
            }
            .approved(&ctx.actor.concise, ctx.now)
        };
        let past = PastAppointment {
            appointment: Appointment {
                attendees,
                location,
                time: draft.time,
                request,
                timestamp: ctx.now,
            },
            clock_in: stamp(clock_in),
            clock_out: stamp(clock_out),
        };

        let id = new_document_id();
        let mut batch = WriteBatch::new();
        batch.set_all(
            appointment_docs(p, &past.appointment, collections::PAST_APPOINTMENTS, &id),
            &past,
        )?;
        self.store.commit(batch).await?;

        let [a, b] = &past.appointment.attendees;
        self.add_service_time(p, &[&a.uid, &b.uid], past.service_seconds())
            .await;

        tracing::info!(partition = %p, action = "newPastAppt", id = %id, seconds = past.service_seconds(), "Recorded past appointment");
        Ok(json!({ "appt": past, "id": id }))
    }

    pub async fn modify_past_appt(&self, ctx: &Context, edit: PastApptEdit, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let path = user_doc(p, &edit.attendees[0].uid, collections::PAST_APPOINTMENTS, id);
        let stored: PastAppointment = self.store.require(&path, "past appointment").await?;
        ensure_supervises(ctx, &stored.appointment.location.id)?;
        edit.time.validate().map_err(invalid)?;
        check_window(&edit)?;

        let (location, stored_location) = self.resolve_location(p, &edit.location).await?;
        ensure_supervises(ctx, &location.id)?;
        let (clock_in, clock_out) = round_service_window(
            &stored_location.config.hrs,
            edit.clock_in.sent_timestamp,
            edit.clock_out.sent_timestamp,
        );

        let before = stored.service_seconds();
        let old_location = stored.appointment.location.id.clone();
        let mut past = stored;
        past.appointment.time = edit.time;
        past.appointment.location = location;
        past.clock_in.sent_timestamp = clock_in;
        past.clock_out.sent_timestamp = clock_out;

        let mut batch = WriteBatch::new();
        if old_location != past.appointment.location.id {
            batch.delete_if_exists(location_doc(p, &old_location, collections::PAST_APPOINTMENTS, id));
        }
        batch.set_all(
            appointment_docs(p, &past.appointment, collections::PAST_APPOINTMENTS, id),
            &past,
        )?;
        self.store.commit(batch).await?;

        let delta = past.service_seconds() - before;
        let [a, b] = &past.appointment.attendees;
        self.add_service_time(p, &[&a.uid, &b.uid], delta).await;

        tracing::info!(partition = %p, action = "modifyPastAppt", id, delta_seconds = delta, "Modified past appointment");
        Ok(json!({ "appt": past, "id": id }))
    }

    pub async fn delete_past_appt(&self, ctx: &Context, locator: &ApptRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let path = user_doc(p, &locator.attendees[0].uid, collections::PAST_APPOINTMENTS, id);
        let past: PastAppointment = self.store.require(&path, "past appointment").await?;
        let [a, b] = &past.appointment.attendees;
        ensure_party_or_supervisor(ctx, &[&a.uid, &b.uid], &past.appointment.location.id)?;

        let mut batch = WriteBatch::new();
        for doc in appointment_docs(p, &past.appointment, collections::PAST_APPOINTMENTS, id) {
            if doc == path {
                batch.delete(doc);
            } else {
                batch.delete_if_exists(doc);
            }
        }
        self.store.commit(batch).await?;

        self.add_service_time(p, &[&a.uid, &b.uid], -past.service_seconds())
            .await;

        tracing::info!(partition = %p, action = "deletePastAppt", id, "Deleted past appointment");
        Ok(json!({ "appt": past, "id": id }))
    }
}

fn check_window(edit: &PastApptEdit) -> Result<()> {
    if edit.clock_out.sent_timestamp <= edit.clock_in.sent_timestamp {
        return Err(AppError::BadRequest("clock-out must come after clock-in".to_string()));
    }
    if edit.attendees[0].uid.is_empty() || edit.attendees[1].uid.is_empty() {
        return Err(AppError::BadRequest("both attendees are required".to_string()));
    }
    Ok(())
}
