// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorization gate for the data endpoint.
//!
//! Every call is admitted (token verified, profile loaded and matched to the
//! token), parsed into an [`Action`], checked against the guard table and
//! then run on the lifecycle engine while holding the engagement's lock.

pub mod actions;
pub mod guards;

pub use actions::{Action, ActionKind};

use crate::db::{DocumentStore, Partition};
use crate::error::{AppError, Result};
use crate::models::{ConciseUser, User};
use crate::services::identity::IdentityVerifier;
use crate::services::lifecycle::{Actor, Context, LifecycleEngine};
use crate::services::locks::EngagementLocks;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// One call to the data endpoint, before admission.
#[derive(Debug, Clone)]
pub struct DataCall {
    pub partition: Partition,
    /// The profile id the caller claims to be.
    pub user: String,
    pub token: Option<String>,
    pub action: String,
    pub body: Value,
}

pub struct Gate {
    store: Arc<dyn DocumentStore>,
    identity: Arc<IdentityVerifier>,
    engine: Arc<LifecycleEngine>,
    locks: EngagementLocks,
}

impl Gate {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<IdentityVerifier>,
        engine: Arc<LifecycleEngine>,
    ) -> Self {
        Self {
            store,
            identity,
            engine,
            locks: EngagementLocks::new(),
        }
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    /// Admit, authorize and run one data call.
    pub async fn handle(&self, call: DataCall) -> Result<Value> {
        let ctx = self.admit(&call).await?;
        let kind: ActionKind = call.action.parse()?;
        let action = Action::parse(kind, call.body)?;
        guards::authorize(&ctx, &action)?;

        let _guard = match action.engagement_id() {
            Some(id) => Some(self.locks.acquire(&format!("{}/{id}", ctx.partition)).await),
            None => None,
        };
        guards::check_existence(self.store.as_ref(), &ctx, &action).await?;

        tracing::debug!(partition = %ctx.partition, action = %kind, user = %ctx.uid(), "Running action");
        self.run(&ctx, action).await
    }

    /// Verify the caller and load their profile.
    pub async fn admit(&self, call: &DataCall) -> Result<Context> {
        let token = call.token.as_deref().filter(|t| !t.is_empty()).ok_or(AppError::Unauthorized)?;
        if call.user.trim().is_empty() {
            return Err(AppError::BadRequest("missing user".to_string()));
        }
        if call.user.contains('@') {
            return Err(AppError::BadRequest(
                "user must be a uid, not an email address".to_string(),
            ));
        }

        let claims = self.identity.verify(token).await?;
        let user: User = self
            .store
            .require(&call.partition.user(&call.user), "user")
            .await?;

        let email_matches = claims
            .email
            .as_deref()
            .is_some_and(|email| email.eq_ignore_ascii_case(user.email.trim()));
        if claims.uid != user.uid || claims.uid != call.user || !email_matches {
            tracing::warn!(
                claimed = %call.user,
                token_uid = %claims.uid,
                "Token does not match the claimed user"
            );
            return Err(AppError::IdentityMismatch);
        }

        if let Some(field) = user.missing_required_field() {
            return Err(AppError::IncompleteProfile(field));
        }
        let defaulted = user.defaulted_fields();
        if !defaulted.is_empty() {
            tracing::warn!(user = %user.uid, fields = ?defaulted, "Profile is missing optional fields");
        }

        Ok(Context {
            partition: call.partition,
            actor: Actor {
                concise: ConciseUser::from(&user),
                user,
                claims,
            },
            now: Utc::now(),
        })
    }

    async fn run(&self, ctx: &Context, action: Action) -> Result<Value> {
        let engine = &self.engine;
        match action {
            Action::CreateLocation { location, id } => engine.create_location(ctx, location, id).await,
            Action::UpdateLocation { patch, id } => engine.update_location(ctx, patch, &id).await,
            Action::DeleteLocation { id } => engine.delete_location(ctx, &id).await,
            Action::CreateProxyUser { profile } => engine.create_proxy_user(ctx, profile).await,
            Action::CreateUser { user } => engine.create_user(ctx, user).await,
            Action::NewRequest { request, payment } => engine.new_request(ctx, request, payment).await,
            Action::ApproveRequest { request, id } => engine.approve_request(ctx, &request, &id).await,
            Action::RejectRequest { request, id } => engine.reject_request(ctx, &request, &id).await,
            Action::CancelRequest { request, id } => engine.cancel_request(ctx, &request, &id).await,
            Action::ModifyRequest { request, id } => engine.modify_request(ctx, request, &id).await,
            Action::ModifyAppt { appt, id } => engine.modify_appt(ctx, appt, &id).await,
            Action::CancelAppt { appt, id } => engine.cancel_appt(ctx, &appt, &id).await,
            Action::NewPastAppt { appt } => engine.new_past_appt(ctx, appt).await,
            Action::ModifyPastAppt { appt, id } => engine.modify_past_appt(ctx, appt, &id).await,
            Action::DeletePastAppt { appt, id } => engine.delete_past_appt(ctx, &appt, &id).await,
            Action::ClockIn { appt, id } => engine.clock_in(ctx, &appt, &id).await,
            Action::ClockOut { appt, id } => engine.clock_out(ctx, &appt, &id).await,
            Action::ApproveClockIn { clock_in, id } => engine.approve_clock_in(ctx, &clock_in, &id).await,
            Action::RejectClockIn { clock_in, id } => engine.reject_clock_in(ctx, &clock_in, &id).await,
            Action::ApproveClockOut { clock_out, id } => {
                engine.approve_clock_out(ctx, &clock_out, &id).await
            }
            Action::RejectClockOut { clock_out, id } => {
                engine.reject_clock_out(ctx, &clock_out, &id).await
            }
            Action::InstantClockIn { appt, id } => engine.instant_clock_in(ctx, &appt, &id).await,
            Action::InstantClockOut { appt, id } => engine.instant_clock_out(ctx, &appt, &id).await,
            Action::RequestPaymentFor { id, .. } => engine.request_payment_for(ctx, &id).await,
            Action::ApprovePayment { id } => engine.approve_payment(ctx, &id).await,
            Action::DenyPayment { id } => engine.deny_payment(ctx, &id).await,
            Action::RequestPayout => engine.request_payout(ctx).await,
        }
    }
}
