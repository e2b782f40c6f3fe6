// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-action admission rules: who may run an action, and which of the
//! caller's own documents must exist first.

use super::actions::Action;
use crate::db::{collections, DocPath, DocumentStore};
use crate::error::{AppError, Result};
use crate::models::UserType;
use crate::services::fanout::{location_doc, user_doc};
use crate::services::lifecycle::Context;

/// Check the role and ownership rule for `action`.
pub fn authorize(ctx: &Context, action: &Action) -> Result<()> {
    let uid = ctx.uid();
    let supervisor = ctx.is_supervisor();
    let kind = action.kind();

    let allowed = match action {
        Action::CreateLocation { .. } | Action::CreateProxyUser { .. } => supervisor,
        Action::UpdateLocation { id, .. } | Action::DeleteLocation { id } => ctx.supervises(id),
        Action::CreateUser { user } => user.uid == uid || supervisor,
        Action::NewRequest { request, .. } => request.from_user.uid == uid || supervisor,
        Action::ApproveRequest { request, .. } | Action::RejectRequest { request, .. } => {
            request.to_user.uid == uid || supervisor
        }
        Action::CancelRequest { request, .. } => request.from_user.uid == uid || supervisor,
        Action::ModifyRequest { request, .. } => request.involves(uid) || supervisor,
        Action::ModifyAppt { appt, .. } => appt.attendees.iter().any(|a| a.uid == uid) || supervisor,
        Action::CancelAppt { appt, .. } | Action::DeletePastAppt { appt, .. } => {
            appt.has_attendee(uid) || supervisor
        }
        Action::NewPastAppt { appt } | Action::ModifyPastAppt { appt, .. } => {
            ctx.supervises(&appt.location.id)
        }
        Action::ClockIn { .. } | Action::ClockOut { .. } => {
            ctx.actor.user.kind() == Some(UserType::Tutor) || supervisor
        }
        Action::ApproveClockIn { clock_in: clock, .. }
        | Action::RejectClockIn { clock_in: clock, .. }
        | Action::ApproveClockOut { clock_out: clock, .. }
        | Action::RejectClockOut { clock_out: clock, .. } => ctx.supervises(&clock.record.location.id),
        Action::InstantClockIn { appt, .. } | Action::InstantClockOut { appt, .. } => {
            ctx.supervises(&appt.location.id)
        }
        Action::RequestPaymentFor { appt, .. } => appt.has_attendee(uid) && ctx.actor.user.is_paid_tutor(),
        Action::ApprovePayment { .. } | Action::DenyPayment { .. } => {
            ctx.actor.user.kind() == Some(UserType::Pupil)
        }
        Action::RequestPayout => ctx.actor.user.is_paid_tutor(),
    };

    if allowed {
        Ok(())
    } else {
        tracing::warn!(action = %kind, user = uid, supervisor, "Action not permitted");
        Err(AppError::Forbidden(format!("{kind} is not permitted for this user")))
    }
}

/// The caller's own document that `action` needs, if any.
pub fn required_document(ctx: &Context, action: &Action) -> Option<DocPath> {
    let p = ctx.partition;
    let uid = ctx.uid();
    let own = |collection: &str, id: &str| Some(user_doc(p, uid, collection, id));
    let unless_supervisor = |collection: &str, id: &str| {
        if ctx.is_supervisor() {
            None
        } else {
            own(collection, id)
        }
    };

    match action {
        Action::ApproveRequest { id, .. } | Action::RejectRequest { id, .. } => {
            unless_supervisor(collections::REQUESTS_IN, id)
        }
        Action::CancelRequest { id, .. } => unless_supervisor(collections::REQUESTS_OUT, id),
        Action::ModifyRequest { request, id } => {
            if request.from_user.uid == uid {
                own(collections::REQUESTS_OUT, id)
            } else if request.to_user.uid == uid {
                own(collections::REQUESTS_IN, id)
            } else {
                None
            }
        }
        Action::ModifyAppt { id, .. } | Action::CancelAppt { id, .. } | Action::ClockIn { id, .. } => {
            unless_supervisor(collections::APPOINTMENTS, id)
        }
        Action::DeletePastAppt { id, .. } => unless_supervisor(collections::PAST_APPOINTMENTS, id),
        Action::ClockOut { id, .. } => unless_supervisor(collections::ACTIVE_APPOINTMENTS, id),
        Action::ApproveClockIn { clock_in, id } | Action::RejectClockIn { clock_in, id } => Some(
            location_doc(p, &clock_in.record.location.id, collections::CLOCK_INS, id),
        ),
        Action::ApproveClockOut { clock_out, id } | Action::RejectClockOut { clock_out, id } => Some(
            location_doc(p, &clock_out.record.location.id, collections::CLOCK_OUTS, id),
        ),
        Action::RequestPaymentFor { id, .. }
        | Action::ApprovePayment { id }
        | Action::DenyPayment { id } => own(collections::APPOINTMENTS, id),
        Action::CreateLocation { .. }
        | Action::UpdateLocation { .. }
        | Action::DeleteLocation { .. }
        | Action::CreateProxyUser { .. }
        | Action::CreateUser { .. }
        | Action::NewRequest { .. }
        | Action::NewPastAppt { .. }
        | Action::ModifyPastAppt { .. }
        | Action::InstantClockIn { .. }
        | Action::InstantClockOut { .. }
        | Action::RequestPayout => None,
    }
}

/// Fail with `NotFound` unless the caller's required document exists.
pub async fn check_existence(store: &dyn DocumentStore, ctx: &Context, action: &Action) -> Result<()> {
    let Some(path) = required_document(ctx, action) else {
        return Ok(());
    };
    if store.exists(&path).await? {
        return Ok(());
    }
    tracing::info!(action = %action.kind(), path = %path, "Required document missing");
    Err(AppError::NotFound(format!(
        "{} ({})",
        path.collection_name(),
        path.id()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Partition;
    use crate::models::{ConciseUser, User};
    use crate::services::gate::actions::ActionKind;
    use crate::services::identity::IdentityClaims;
    use crate::services::lifecycle::Actor;
    use chrono::Utc;
    use serde_json::json;

    fn ctx(uid: &str, user_type: &str, supervisor: bool, locations: &[&str]) -> Context {
        let user = User {
            name: "Test User".into(),
            email: format!("{uid}@example.com"),
            id: format!("{uid}@example.com"),
            uid: uid.into(),
            user_type: user_type.into(),
            ..Default::default()
        };
        Context {
            partition: Partition::Test,
            actor: Actor {
                concise: ConciseUser::from(&user),
                user,
                claims: IdentityClaims {
                    uid: uid.into(),
                    email: None,
                    supervisor,
                    locations: locations.iter().map(|l| l.to_string()).collect(),
                },
            },
            now: Utc::now(),
        }
    }

    fn clock_action(kind: ActionKind, location: &str) -> Action {
        Action::parse(
            kind,
            json!({
                "clockIn": {"for": {"attendees": [{"uid": "pupil"}, {"uid": "tutor"}], "location": {"id": location}}},
                "id": "R1",
            }),
        )
        .unwrap()
    }

    #[test]
    fn clock_approval_needs_the_location_supervisor() {
        let action = clock_action(ActionKind::ApproveClockIn, "gunn");
        assert!(authorize(&ctx("sup", "Supervisor", true, &["gunn"]), &action).is_ok());
        assert!(matches!(
            authorize(&ctx("sup", "Supervisor", true, &["paly"]), &action),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&ctx("tutor", "Tutor", false, &[]), &action),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn approve_request_checks_caller_inbox_unless_supervisor() {
        let action = Action::parse(
            ActionKind::ApproveRequest,
            json!({"request": {"fromUser": {"uid": "pupil"}, "toUser": {"uid": "tutor"}}, "id": "R1"}),
        )
        .unwrap();

        let tutor = ctx("tutor", "Tutor", false, &[]);
        assert!(authorize(&tutor, &action).is_ok());
        assert_eq!(
            required_document(&tutor, &action).map(|p| p.to_string()),
            Some("partitions/test/users/tutor/requestsIn/R1".to_string())
        );

        let supervisor = ctx("sup", "Supervisor", true, &[]);
        assert_eq!(required_document(&supervisor, &action), None);

        assert!(authorize(&ctx("pupil", "Pupil", false, &[]), &action).is_err());
    }

    #[test]
    fn payment_actions_follow_roles() {
        let approve = Action::parse(ActionKind::ApprovePayment, json!({"id": "R1"})).unwrap();
        assert!(authorize(&ctx("pupil", "Pupil", false, &[]), &approve).is_ok());
        assert!(authorize(&ctx("tutor", "Tutor", false, &[]), &approve).is_err());

        let payout = Action::RequestPayout;
        assert!(authorize(&ctx("tutor", "Tutor", false, &[]), &payout).is_err());
    }

    #[tokio::test]
    async fn existence_check_reads_through_a_borrowed_store() {
        use crate::db::{MemoryStore, WriteBatch};

        let store = MemoryStore::new();
        let tutor = ctx("tutor", "Tutor", false, &[]);
        let action = Action::parse(
            ActionKind::ApproveRequest,
            json!({"request": {"fromUser": {"uid": "pupil"}, "toUser": {"uid": "tutor"}}, "id": "R1"}),
        )
        .unwrap();
        assert!(matches!(
            check_existence(&store, &tutor, &action).await,
            Err(AppError::NotFound(_))
        ));

        let mut batch = WriteBatch::new();
        batch
            .set(Partition::Test.user("tutor").child(collections::REQUESTS_IN, "R1"), &json!({}))
            .unwrap();
        store.commit(batch).await.unwrap();
        assert!(check_existence(&store, &tutor, &action).await.is_ok());
    }
}
