// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lifecycle engine.
//!
//! One method per transition. Each re-reads the stored predecessor, builds
//! the successor records from it and commits the whole fan-out as one
//! [`WriteBatch`] in marker, delete, create order. Derived views and payment
//! triggers are handled after the commit.

mod appointments;
pub mod availability;
mod clock;
pub mod hours;
mod locations;
mod payments;
pub mod payloads;
mod requests;

pub use payloads::{
    ApptEdit, ApptRef, ClockRef, PartyRef, PastApptEdit, PaymentDraft, RequestRef, StampTimes,
};

use crate::db::{DocumentStore, Partition, WriteBatch};
use crate::error::{AppError, Result};
use crate::models::{ConciseUser, Location, LocationRef, User, UserType};
use crate::services::directory::AccountDirectory;
use crate::services::identity::IdentityClaims;
use crate::services::locks::{EngagementGuard, EngagementLocks};
use crate::services::tasks::{PaymentTrigger, TriggerQueue};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

/// The admitted caller.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub concise: ConciseUser,
    pub claims: IdentityClaims,
}

/// Request-scoped context threaded through every transition.
#[derive(Debug, Clone)]
pub struct Context {
    pub partition: Partition,
    pub actor: Actor,
    pub now: DateTime<Utc>,
}

impl Context {
    pub fn uid(&self) -> &str {
        &self.actor.user.uid
    }

    pub fn is_supervisor(&self) -> bool {
        self.actor.claims.supervisor
    }

    pub fn supervises(&self, location_id: &str) -> bool {
        self.actor.claims.supervises(location_id)
    }
}

pub struct LifecycleEngine {
    store: Arc<dyn DocumentStore>,
    triggers: Arc<dyn TriggerQueue>,
    directory: Arc<dyn AccountDirectory>,
    /// Serializes read-modify-write of derived profile fields per user.
    profiles: EngagementLocks,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        triggers: Arc<dyn TriggerQueue>,
        directory: Arc<dyn AccountDirectory>,
    ) -> Self {
        Self {
            store,
            triggers,
            directory,
            profiles: EngagementLocks::new(),
        }
    }

    async fn lock_profile(&self, partition: Partition, uid: &str) -> EngagementGuard<'_> {
        self.profiles.acquire(&format!("{partition}/users/{uid}")).await
    }

    /// Concise snapshot of a stored user.
    async fn concise_user(&self, partition: Partition, uid: &str) -> Result<ConciseUser> {
        let user: User = self.store.require(&partition.user(uid), "user").await?;
        Ok(ConciseUser::from(&user))
    }

    /// Fill in a location reference from the stored location, looking the
    /// id up by name when it is missing.
    async fn resolve_location(&self, partition: Partition, location: &LocationRef) -> Result<(LocationRef, Location)> {
        if !location.id.is_empty() {
            let stored: Location = self
                .store
                .require(&partition.location(&location.id), "location")
                .await?;
            let reference = LocationRef {
                id: location.id.clone(),
                name: stored.name.clone(),
            };
            return Ok((reference, stored));
        }

        let name = location.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("location needs an id or a name".to_string()));
        }
        self.store
            .list_as::<Location>(&partition.locations())
            .await?
            .into_iter()
            .find(|(_, stored)| stored.name == name)
            .map(|(id, stored)| {
                (
                    LocationRef {
                        id,
                        name: stored.name.clone(),
                    },
                    stored,
                )
            })
            .ok_or_else(|| AppError::NotFound(format!("location ({name})")))
    }

    /// Hand a trigger to the payment processor. The triggering documents
    /// are already committed, so a failure here is logged for repair rather
    /// than failing the transition.
    async fn enqueue(&self, trigger: PaymentTrigger) {
        let (kind, user, id) = (trigger.kind, trigger.user.clone(), trigger.id.clone());
        if let Err(e) = self.triggers.enqueue(trigger).await {
            tracing::error!(kind = %kind, user = %user, id = %id, error = %e, "Failed to enqueue payment trigger");
        }
    }

    /// Add (or with a negative value, remove) service time for each user.
    async fn add_service_time(&self, partition: Partition, uids: &[&str], seconds: f64) {
        if seconds == 0.0 {
            return;
        }
        for uid in uids {
            if let Err(e) = self.add_service_seconds(partition, uid, seconds).await {
                tracing::warn!(user = uid, seconds, error = %e, "Service hours update failed");
            }
        }
    }

    async fn add_service_seconds(&self, partition: Partition, uid: &str, seconds: f64) -> Result<()> {
        let _profile = self.lock_profile(partition, uid).await;
        let path = partition.user(uid);
        let mut user: User = self.store.require(&path, "user").await?;
        if !user.add_service_seconds(seconds) {
            tracing::warn!(user = uid, user_type = %user.user_type, "User type does not accrue service hours");
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        let total = if user.kind() == Some(UserType::Tutor) {
            json!({ "secondsTutored": user.seconds_tutored })
        } else {
            json!({ "secondsPupiled": user.seconds_pupiled })
        };
        batch.merge(path, total)?;
        self.store.commit(batch).await
    }
}

/// Require that the actor manages a location.
fn ensure_supervises(ctx: &Context, location_id: &str) -> Result<()> {
    if ctx.supervises(location_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "not a supervisor of location ({location_id})"
        )))
    }
}

/// Let a party to the engagement through; anyone else must manage its
/// location.
fn ensure_party_or_supervisor(ctx: &Context, parties: &[&str], location_id: &str) -> Result<()> {
    if parties.contains(&ctx.uid()) {
        Ok(())
    } else {
        ensure_supervises(ctx, location_id)
    }
}

fn invalid(err: validator::ValidationErrors) -> AppError {
    AppError::BadRequest(err.to_string())
}
