// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clock-in / clock-out transitions.
//!
//! Tutors file pending clock events under the location; its supervisors
//! approve or reject them. Instant variants skip the pending step.

use super::hours::round_service_window;
use super::{ensure_party_or_supervisor, ensure_supervises, ApptRef, ClockRef, Context, LifecycleEngine};
use crate::db::{collections, new_document_id, DocPath, Partition, WriteBatch};
use crate::error::{AppError, Result};
use crate::models::{
    ActiveAppointment, Appointment, ApprovedClockEvent, ClockEvent, ClockIn, ClockOut, ClockStamp,
    HoursRules, Location, PastAppointment, RejectedClockEvent,
};
use crate::services::fanout::{appointment_docs, location_doc, user_doc};
use serde_json::{json, Value};

impl LifecycleEngine {
    pub async fn clock_in(&self, ctx: &Context, locator: &ApptRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let appt: Appointment = self
            .store
            .require(
                &user_doc(p, &locator.attendees[0].uid, collections::APPOINTMENTS, id),
                "appointment",
            )
            .await?;
        let [a, b] = &appt.attendees;
        ensure_party_or_supervisor(ctx, &[&a.uid, &b.uid], &appt.location.id)?;

        let pending = location_doc(p, &appt.location.id, collections::CLOCK_INS, id);
        if self.store.exists(&pending).await? {
            return Err(AppError::Conflict(format!("clock-in ({id}) is already pending")));
        }

        let event = ClockIn {
            sent_by: ctx.actor.concise.clone(),
            sent_timestamp: ctx.now,
            record: appt.clone(),
        };

        let mut batch = WriteBatch::new();
        batch.set(pending.clone(), &event)?;
        self.mark_clocked(&mut batch, ctx, true)?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "clockIn", id, location = %appt.location.id, "Clock-in pending approval");
        Ok(json!({
            "recipient": recipient(&appt, &pending),
            "clockIn": event,
            "appt": appt,
            "id": id,
        }))
    }

    pub async fn clock_out(&self, ctx: &Context, locator: &ApptRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let active: ActiveAppointment = self
            .store
            .require(
                &user_doc(p, &locator.attendees[0].uid, collections::ACTIVE_APPOINTMENTS, id),
                "active appointment",
            )
            .await?;

        let location_id = active.appointment.location.id.clone();
        let [a, b] = &active.appointment.attendees;
        ensure_party_or_supervisor(ctx, &[&a.uid, &b.uid], &location_id)?;
        let pending = location_doc(p, &location_id, collections::CLOCK_OUTS, id);
        if self.store.exists(&pending).await? {
            return Err(AppError::Conflict(format!("clock-out ({id}) is already pending")));
        }

        let event = ClockOut {
            sent_by: ctx.actor.concise.clone(),
            sent_timestamp: ctx.now,
            record: active.clone(),
        };

        let mut batch = WriteBatch::new();
        batch.set(pending.clone(), &event)?;
        self.mark_clocked(&mut batch, ctx, false)?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "clockOut", id, location = %location_id, "Clock-out pending approval");
        Ok(json!({
            "recipient": recipient(&active.appointment, &pending),
            "clockOut": event,
            "appt": active,
            "id": id,
        }))
    }

    pub async fn approve_clock_in(&self, ctx: &Context, locator: &ClockRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let location_id = &locator.record.location.id;
        ensure_supervises(ctx, location_id)?;
        let pending = location_doc(p, location_id, collections::CLOCK_INS, id);
        let clock_in: ClockIn = self.store.require(&pending, "clock-in").await?;

        let active = ActiveAppointment {
            appointment: clock_in.record.clone(),
            clock_in: clock_in.stamp().approved(&ctx.actor.concise, ctx.now),
        };
        let approved = ApprovedClockEvent {
            event: clock_in,
            approved_by: ctx.actor.concise.clone(),
            approved_timestamp: ctx.now,
        };

        let mut batch = WriteBatch::new();
        batch
            .delete(pending)
            .set(
                location_doc(p, location_id, collections::APPROVED_CLOCK_INS, &new_document_id()),
                &approved,
            )?
            .set_all(
                appointment_docs(p, &active.appointment, collections::ACTIVE_APPOINTMENTS, id),
                &active,
            )?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "approveClockIn", id, location = %location_id, "Approved clock-in");
        Ok(json!({ "appt": active, "id": id }))
    }

    pub async fn reject_clock_in(&self, ctx: &Context, locator: &ClockRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let location_id = &locator.record.location.id;
        ensure_supervises(ctx, location_id)?;
        let pending = location_doc(p, location_id, collections::CLOCK_INS, id);
        let clock_in: ClockIn = self.store.require(&pending, "clock-in").await?;

        let rejected = RejectedClockEvent {
            event: clock_in,
            rejected_by: ctx.actor.concise.clone(),
            rejected_timestamp: ctx.now,
        };

        let mut batch = WriteBatch::new();
        batch.delete(pending).set(
            location_doc(p, location_id, collections::REJECTED_CLOCK_INS, &new_document_id()),
            &rejected,
        )?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "rejectClockIn", id, location = %location_id, "Rejected clock-in");
        Ok(json!({ "clockIn": rejected, "id": id }))
    }

    pub async fn approve_clock_out(&self, ctx: &Context, locator: &ClockRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let location_id = &locator.record.location.id;
        ensure_supervises(ctx, location_id)?;
        let pending = location_doc(p, location_id, collections::CLOCK_OUTS, id);
        let clock_out: ClockOut = self.store.require(&pending, "clock-out").await?;

        let stamp = clock_out.stamp().approved(&ctx.actor.concise, ctx.now);
        let past = self
            .close_out(p, clock_out.record.clone(), stamp)
            .await?;
        let approved = ApprovedClockEvent {
            event: clock_out,
            approved_by: ctx.actor.concise.clone(),
            approved_timestamp: ctx.now,
        };

        let mut batch = WriteBatch::new();
        batch.delete(pending).set(
            location_doc(p, location_id, collections::APPROVED_CLOCK_OUTS, &new_document_id()),
            &approved,
        )?;
        let past_id = self.finish_appointment(&mut batch, p, id, &past)?;
        self.store.commit(batch).await?;

        let [a, b] = &past.appointment.attendees;
        self.add_service_time(p, &[&a.uid, &b.uid], past.service_seconds())
            .await;

        tracing::info!(
            partition = %p,
            action = "approveClockOut",
            id,
            past_id = %past_id,
            seconds = past.service_seconds(),
            "Approved clock-out"
        );
        Ok(json!({ "appt": past, "id": past_id }))
    }

    pub async fn reject_clock_out(&self, ctx: &Context, locator: &ClockRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let location_id = &locator.record.location.id;
        ensure_supervises(ctx, location_id)?;
        let pending = location_doc(p, location_id, collections::CLOCK_OUTS, id);
        let clock_out: ClockOut = self.store.require(&pending, "clock-out").await?;

        let active_docs = appointment_docs(
            p,
            &clock_out.record.appointment,
            collections::ACTIVE_APPOINTMENTS,
            id,
        );
        let rejected = RejectedClockEvent {
            event: clock_out,
            rejected_by: ctx.actor.concise.clone(),
            rejected_timestamp: ctx.now,
        };

        let mut batch = WriteBatch::new();
        batch.delete(pending).set(
            location_doc(p, location_id, collections::REJECTED_CLOCK_OUTS, &new_document_id()),
            &rejected,
        )?;
        for doc in active_docs {
            batch.delete_if_exists(doc);
        }
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "rejectClockOut", id, location = %location_id, "Rejected clock-out");
        Ok(json!({ "clockOut": rejected, "id": id }))
    }

    /// Clock in and approve in one step.
    pub async fn instant_clock_in(&self, ctx: &Context, locator: &ApptRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let appt: Appointment = self
            .store
            .require(
                &user_doc(p, &locator.attendees[0].uid, collections::APPOINTMENTS, id),
                "appointment",
            )
            .await?;
        ensure_supervises(ctx, &appt.location.id)?;

        let event = ClockEvent {
            sent_by: ctx.actor.concise.clone(),
            sent_timestamp: ctx.now,
            record: appt,
        };
        let active = ActiveAppointment {
            appointment: event.record.clone(),
            clock_in: event.stamp().approved(&ctx.actor.concise, ctx.now),
        };
        let approved = ApprovedClockEvent {
            event,
            approved_by: ctx.actor.concise.clone(),
            approved_timestamp: ctx.now,
        };

        let location_id = &active.appointment.location.id;
        let mut batch = WriteBatch::new();
        batch
            .set(
                location_doc(p, location_id, collections::APPROVED_CLOCK_INS, &new_document_id()),
                &approved,
            )?
            .set_all(
                appointment_docs(p, &active.appointment, collections::ACTIVE_APPOINTMENTS, id),
                &active,
            )?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "instantClockIn", id, location = %location_id, "Clocked in");
        Ok(json!({ "appt": active, "id": id }))
    }

    /// Clock out and approve in one step.
    pub async fn instant_clock_out(&self, ctx: &Context, locator: &ApptRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let active: ActiveAppointment = self
            .store
            .require(
                &user_doc(p, &locator.attendees[0].uid, collections::ACTIVE_APPOINTMENTS, id),
                "active appointment",
            )
            .await?;
        let location_id = active.appointment.location.id.clone();
        ensure_supervises(ctx, &location_id)?;

        let event = ClockEvent {
            sent_by: ctx.actor.concise.clone(),
            sent_timestamp: ctx.now,
            record: active,
        };
        let stamp = event.stamp().approved(&ctx.actor.concise, ctx.now);
        let past = self.close_out(p, event.record.clone(), stamp).await?;
        let approved = ApprovedClockEvent {
            event,
            approved_by: ctx.actor.concise.clone(),
            approved_timestamp: ctx.now,
        };

        let mut batch = WriteBatch::new();
        batch.set(
            location_doc(p, &location_id, collections::APPROVED_CLOCK_OUTS, &new_document_id()),
            &approved,
        )?;
        let past_id = self.finish_appointment(&mut batch, p, id, &past)?;
        self.store.commit(batch).await?;

        let [a, b] = &past.appointment.attendees;
        self.add_service_time(p, &[&a.uid, &b.uid], past.service_seconds())
            .await;

        tracing::info!(partition = %p, action = "instantClockOut", id, past_id = %past_id, "Clocked out");
        Ok(json!({ "appt": past, "id": past_id }))
    }

    /// Build the past appointment for an approved clock-out, rounded by
    /// the location's rules.
    async fn close_out(
        &self,
        partition: Partition,
        active: ActiveAppointment,
        clock_out: ClockStamp,
    ) -> Result<PastAppointment> {
        let rules = self
            .store
            .get_as::<Location>(&partition.location(&active.appointment.location.id))
            .await?
            .map(|location| location.config.hrs)
            .unwrap_or_else(|| {
                tracing::warn!(location = %active.appointment.location.id, "Location missing, using default hour rules");
                HoursRules::default()
            });

        let mut past = PastAppointment {
            appointment: active.appointment,
            clock_in: active.clock_in,
            clock_out,
        };
        let (start, end) = round_service_window(
            &rules,
            past.clock_in.sent_timestamp,
            past.clock_out.sent_timestamp,
        );
        past.clock_in.sent_timestamp = start;
        past.clock_out.sent_timestamp = end;
        Ok(past)
    }

    /// Move an appointment from active to past. Returns the past id.
    fn finish_appointment(
        &self,
        batch: &mut WriteBatch,
        partition: Partition,
        id: &str,
        past: &PastAppointment,
    ) -> Result<String> {
        for doc in appointment_docs(partition, &past.appointment, collections::ACTIVE_APPOINTMENTS, id) {
            batch.delete_if_exists(doc);
        }
        let past_id = new_document_id();
        batch.set_all(
            appointment_docs(partition, &past.appointment, collections::PAST_APPOINTMENTS, &past_id),
            past,
        )?;
        Ok(past_id)
    }

    /// Flip the actor's clocked-in flags.
    fn mark_clocked(&self, batch: &mut WriteBatch, ctx: &Context, clocked_in: bool) -> Result<()> {
        batch.merge(
            ctx.partition.user(ctx.uid()),
            json!({ "clockedIn": clocked_in, "clockedOut": !clocked_in }),
        )?;
        Ok(())
    }
}

fn recipient(appt: &Appointment, pending: &DocPath) -> Value {
    json!({
        "name": format!("the {}'s supervisors", appt.location.name),
        "path": pending.to_string(),
    })
}
