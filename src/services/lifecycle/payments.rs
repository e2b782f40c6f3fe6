// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payer decisions on finished paid appointments, and payout requests.

use super::{Context, LifecycleEngine};
use crate::db::{collections, new_document_id, WriteBatch};
use crate::error::{AppError, Result};
use crate::models::{
    Appointment, ApprovedPayment, DeniedPayment, RequestedPayment, RequestedPayout,
};
use crate::services::fanout::user_doc;
use crate::services::tasks::{PaymentTrigger, TriggerKind};
use serde_json::{json, Value};

impl LifecycleEngine {
    /// Ask the other attendee to pay for an appointment.
    pub async fn request_payment_for(&self, ctx: &Context, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let appt: Appointment = self
            .store
            .require(&user_doc(p, ctx.uid(), collections::APPOINTMENTS, id), "appointment")
            .await?;
        if !appt.is_paid() {
            return Err(AppError::BadRequest(format!("appointment ({id}) is not a paid lesson")));
        }
        let payer = appt
            .other_attendee(ctx.uid())
            .cloned()
            .ok_or_else(|| AppError::Forbidden(format!("not an attendee of appointment ({id})")))?;

        let payment = RequestedPayment {
            from: payer,
            to: ctx.actor.concise.clone(),
            amount: appt.request.payment.amount,
            appointment: appt,
            timestamp: ctx.now,
        };

        let mut batch = WriteBatch::new();
        batch.set(
            user_doc(p, &payment.from.uid, collections::REQUESTED_PAYMENTS, id),
            &payment,
        )?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "requestPaymentFor", id, payer = %payment.from.uid, amount = payment.amount, "Requested payment");
        Ok(json!({ "payment": payment, "id": id }))
    }

    pub async fn approve_payment(&self, ctx: &Context, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let requested_path = user_doc(p, ctx.uid(), collections::REQUESTED_PAYMENTS, id);
        let payment: RequestedPayment = self.store.require(&requested_path, "requested payment").await?;
        let payer = payment.from.uid.clone();
        let tutor = payment.to.uid.clone();

        let approved = ApprovedPayment {
            payment,
            approved_by: ctx.actor.concise.clone(),
            approved_timestamp: ctx.now,
        };

        let mut batch = WriteBatch::new();
        batch.delete(requested_path).set_all(
            [
                user_doc(p, &payer, collections::APPROVED_PAYMENTS, id),
                user_doc(p, &tutor, collections::APPROVED_PAYMENTS, id),
            ],
            &approved,
        )?;
        self.store.commit(batch).await?;

        self.enqueue(PaymentTrigger::new(TriggerKind::ApprovedPayment, p, &payer, id))
            .await;

        tracing::info!(partition = %p, action = "approvePayment", id, payer = %payer, tutor = %tutor, "Approved payment");
        Ok(json!({ "approvedPayment": approved, "id": id }))
    }

    /// Decline a payment request. The authorization stays so the tutor
    /// can ask again.
    pub async fn deny_payment(&self, ctx: &Context, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let requested_path = user_doc(p, ctx.uid(), collections::REQUESTED_PAYMENTS, id);
        let payment: RequestedPayment = self.store.require(&requested_path, "requested payment").await?;
        let [a, b] = payment.appointment.attendees.clone();

        let denied = DeniedPayment::new(payment, &ctx.actor.concise, ctx.now);
        let mut batch = WriteBatch::new();
        batch.delete(requested_path).set_all(
            [
                user_doc(p, &a.uid, collections::DENIED_PAYMENTS, id),
                user_doc(p, &b.uid, collections::DENIED_PAYMENTS, id),
            ],
            &denied,
        )?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "denyPayment", id, "Denied payment");
        Ok(json!({ "deniedPayment": denied, "id": id }))
    }

    pub async fn request_payout(&self, ctx: &Context) -> Result<Value> {
        let p = ctx.partition;
        let id = new_document_id();
        let payout = RequestedPayout { timestamp: ctx.now };

        let mut batch = WriteBatch::new();
        batch.set(user_doc(p, ctx.uid(), collections::REQUESTED_PAYOUTS, &id), &payout)?;
        self.store.commit(batch).await?;

        self.enqueue(PaymentTrigger::new(TriggerKind::RequestedPayout, p, ctx.uid(), &id))
            .await;

        tracing::info!(partition = %p, action = "requestPayout", id = %id, user = %ctx.uid(), "Requested payout");
        Ok(json!({ "payout": payout, "id": id }))
    }
}
