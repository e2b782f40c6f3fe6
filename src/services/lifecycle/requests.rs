// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request transitions.

use super::{ensure_party_or_supervisor, invalid, Context, LifecycleEngine, PaymentDraft, RequestRef};
use crate::db::{collections, new_document_id, WriteBatch};
use crate::error::{AppError, Result};
use crate::models::payment::{from_cents, to_cents};
use crate::models::{
    Appointment, ApprovedRequest, AuthPayment, CanceledRequest, ModifiedRequest, PaymentMethod,
    RejectedRequest, Request, SentPayment, User,
};
use crate::services::fanout::{appointment_docs, user_doc};
use crate::services::tasks::{PaymentTrigger, TriggerKind};
use serde_json::{json, Value};
use validator::Validate;

impl LifecycleEngine {
    pub async fn new_request(
        &self,
        ctx: &Context,
        mut request: Request,
        payment: Option<PaymentDraft>,
    ) -> Result<Value> {
        let p = ctx.partition;
        request.trim();
        request.validate().map_err(invalid)?;

        if request.from_user.uid == request.to_user.uid {
            return Err(AppError::BadRequest("cannot request a lesson with yourself".to_string()));
        }
        let (location, _) = self.resolve_location(p, &request.location).await?;
        ensure_party_or_supervisor(ctx, &[&request.from_user.uid], &location.id)?;
        request.location = location;
        request.from_user = self.concise_user(p, &request.from_user.uid).await?;
        request.to_user = self.concise_user(p, &request.to_user.uid).await?;
        request.timestamp = Some(ctx.now);

        if request.is_paid() {
            let tutor: User = self
                .store
                .require(&p.user(&request.to_user.uid), "user")
                .await?;
            if !tutor.is_paid_tutor() {
                return Err(AppError::BadRequest(format!(
                    "{} does not offer paid lessons",
                    request.to_user.name
                )));
            }
            let hours = request.time.duration_hours().ok_or_else(|| {
                AppError::BadRequest("paid lessons need times like 3:00 PM".to_string())
            })?;
            request.payment.amount = from_cents(to_cents(request.to_user.hourly_charge * hours));
        } else {
            request.payment.amount = 0.0;
        }

        let id = new_document_id();
        let from = request.from_user.uid.clone();
        let to = request.to_user.uid.clone();

        let mut batch = WriteBatch::new();
        batch
            .set(user_doc(p, &from, collections::REQUESTS_OUT, &id), &request)?
            .set(user_doc(p, &to, collections::REQUESTS_IN, &id), &request)?;

        let mut sent_payment = false;
        let payment = match payment.filter(|_| request.is_paid()) {
            Some(draft) => {
                let (method, known) = PaymentMethod::from_label(draft.method.as_deref());
                if !known {
                    tracing::warn!(method = ?draft.method, id = %id, "Unknown payment method, using Stripe");
                }
                let record = match method {
                    PaymentMethod::PayPal => {
                        let auth = AuthPayment {
                            id: draft.transaction.id.clone(),
                            from: request.from_user.clone(),
                            to: request.to_user.clone(),
                            amount: request.payment.amount,
                            request: request.clone(),
                            timestamp: ctx.now,
                        };
                        batch.set_all(
                            [
                                user_doc(p, &from, collections::AUTH_PAYMENTS, &id),
                                user_doc(p, &to, collections::AUTH_PAYMENTS, &id),
                            ],
                            &auth,
                        )?;
                        serde_json::to_value(&auth)?
                    }
                    PaymentMethod::Stripe => {
                        let sent = SentPayment {
                            from: request.from_user.clone(),
                            to: request.to_user.clone(),
                            amount: request.payment.amount,
                            request: request.clone(),
                            method: method.as_str().to_string(),
                            transaction: draft.transaction,
                            timestamp: ctx.now,
                        };
                        batch.set(user_doc(p, &from, collections::SENT_PAYMENTS, &id), &sent)?;
                        sent_payment = true;
                        serde_json::to_value(&sent)?
                    }
                };
                Some(record)
            }
            None => None,
        };

        self.store.commit(batch).await?;

        if sent_payment {
            self.enqueue(PaymentTrigger::new(TriggerKind::SentPayment, p, &from, &id))
                .await;
        }

        tracing::info!(
            partition = %p,
            action = "newRequest",
            id = %id,
            from = %from,
            to = %to,
            paid = request.is_paid(),
            "Created request"
        );
        Ok(json!({ "request": request, "payment": payment, "id": id }))
    }

    pub async fn approve_request(&self, ctx: &Context, locator: &RequestRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let in_path = user_doc(p, &locator.to_user.uid, collections::REQUESTS_IN, id);
        let Some(request) = self.store.get_as::<Request>(&in_path).await? else {
            let approved = user_doc(p, &locator.from_user.uid, collections::APPROVED_REQUESTS_OUT, id);
            if self.store.exists(&approved).await? {
                return Err(AppError::Conflict(format!("request ({id}) was already approved")));
            }
            return Err(AppError::NotFound(format!("request ({id})")));
        };
        ensure_party_or_supervisor(ctx, &[&request.to_user.uid], &request.location.id)?;

        let from = request.from_user.uid.clone();
        let to = request.to_user.uid.clone();
        let appt = Appointment::from_request(&request, ctx.now);
        let approved = ApprovedRequest::new(request.clone(), &ctx.actor.concise, ctx.now);

        let mut batch = WriteBatch::new();
        batch
            .set(user_doc(p, &from, collections::APPROVED_REQUESTS_OUT, id), &approved)?
            .delete_if_exists(user_doc(p, &from, collections::REQUESTS_OUT, id))
            .delete(in_path)
            .set_all(appointment_docs(p, &appt, collections::APPOINTMENTS, id), &appt)?;
        self.store.commit(batch).await?;

        self.refresh_availability(p, &[&from, &to]).await;

        tracing::info!(partition = %p, action = "approveRequest", id, from = %from, to = %to, "Approved request");
        Ok(json!({ "request": request, "appt": appt, "id": id }))
    }

    pub async fn reject_request(&self, ctx: &Context, locator: &RequestRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let in_path = user_doc(p, &locator.to_user.uid, collections::REQUESTS_IN, id);
        let request: Request = self.store.require(&in_path, "request").await?;
        ensure_party_or_supervisor(ctx, &[&request.to_user.uid], &request.location.id)?;
        let from = request.from_user.uid.clone();
        let to = request.to_user.uid.clone();

        let rejected = RejectedRequest::new(request.clone(), &ctx.actor.concise, ctx.now);
        let mut batch = WriteBatch::new();
        batch
            .set(user_doc(p, &from, collections::REJECTED_REQUESTS_OUT, id), &rejected)?
            .delete_if_exists(user_doc(p, &from, collections::REQUESTS_OUT, id))
            .delete(in_path);
        if request.is_paid() {
            drop_request_payments(&mut batch, ctx, &from, &to, id);
        }
        self.store.commit(batch).await?;

        if request.is_paid() {
            self.enqueue(PaymentTrigger::new(TriggerKind::AuthorizationCanceled, p, &from, id))
                .await;
        }

        tracing::info!(partition = %p, action = "rejectRequest", id, from = %from, to = %to, "Rejected request");
        Ok(json!({ "request": request, "id": id }))
    }

    pub async fn cancel_request(&self, ctx: &Context, locator: &RequestRef, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let out_path = user_doc(p, &locator.from_user.uid, collections::REQUESTS_OUT, id);
        let request: Request = self.store.require(&out_path, "request").await?;
        ensure_party_or_supervisor(ctx, &[&request.from_user.uid], &request.location.id)?;
        let from = request.from_user.uid.clone();
        let to = request.to_user.uid.clone();

        let canceled = CanceledRequest::new(request.clone(), &ctx.actor.concise, ctx.now);
        let mut batch = WriteBatch::new();
        if to != ctx.uid() {
            batch.set(user_doc(p, &to, collections::CANCELED_REQUESTS_IN, id), &canceled)?;
        }
        if from != ctx.uid() {
            batch.set(user_doc(p, &from, collections::CANCELED_REQUESTS_OUT, id), &canceled)?;
        }
        batch
            .delete(out_path)
            .delete_if_exists(user_doc(p, &to, collections::REQUESTS_IN, id));
        if request.is_paid() {
            drop_request_payments(&mut batch, ctx, &from, &to, id);
        }
        self.store.commit(batch).await?;

        if request.is_paid() {
            self.enqueue(PaymentTrigger::new(TriggerKind::AuthorizationCanceled, p, &from, id))
                .await;
        }

        tracing::info!(partition = %p, action = "cancelRequest", id, from = %from, to = %to, "Canceled request");
        Ok(json!({ "request": request, "id": id }))
    }

    /// Apply the caller's edits to subject, time, location and message.
    pub async fn modify_request(&self, ctx: &Context, mut edit: Request, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let out_path = user_doc(p, &edit.from_user.uid, collections::REQUESTS_OUT, id);
        let stored: Request = self.store.require(&out_path, "request").await?;
        let parties = [stored.from_user.uid.as_str(), stored.to_user.uid.as_str()];
        ensure_party_or_supervisor(ctx, &parties, &stored.location.id)?;

        edit.trim();
        edit.validate().map_err(invalid)?;
        let (location, _) = self.resolve_location(p, &edit.location).await?;
        ensure_party_or_supervisor(ctx, &parties, &location.id)?;

        let request = Request {
            subject: edit.subject,
            time: edit.time,
            location,
            message: edit.message,
            ..stored
        };
        let from = request.from_user.uid.clone();
        let to = request.to_user.uid.clone();

        let modified = ModifiedRequest::new(request.clone(), &ctx.actor.concise, ctx.now);
        let mut batch = WriteBatch::new();
        if from != ctx.uid() {
            batch.set(user_doc(p, &from, collections::MODIFIED_REQUESTS_OUT, id), &modified)?;
        }
        if to != ctx.uid() {
            batch.set(user_doc(p, &to, collections::MODIFIED_REQUESTS_IN, id), &modified)?;
        }
        batch
            .set(out_path, &request)?
            .set(user_doc(p, &to, collections::REQUESTS_IN, id), &request)?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "modifyRequest", id, from = %from, to = %to, "Modified request");
        Ok(json!({ "request": request, "id": id }))
    }
}

/// Drop the payment records filed with a paid request. The gateway
/// authorization itself is refunded by the processor.
fn drop_request_payments(batch: &mut WriteBatch, ctx: &Context, from: &str, to: &str, id: &str) {
    let p = ctx.partition;
    batch
        .delete_if_exists(user_doc(p, from, collections::AUTH_PAYMENTS, id))
        .delete_if_exists(user_doc(p, to, collections::AUTH_PAYMENTS, id))
        .delete_if_exists(user_doc(p, from, collections::SENT_PAYMENTS, id));
}
