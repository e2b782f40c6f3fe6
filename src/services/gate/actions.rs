// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The closed set of data actions and their typed payloads.

use crate::error::{AppError, Result};
use crate::models::{Location, Request, User};
use crate::services::lifecycle::{
    ApptEdit, ApptRef, ClockRef, PastApptEdit, PaymentDraft, RequestRef,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

macro_rules! action_kinds {
    ($($variant:ident => $name:literal,)*) => {
        /// Every action name the data endpoint accepts.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ActionKind {
            $($variant,)*
        }

        impl ActionKind {
            pub const ALL: &'static [ActionKind] = &[$(ActionKind::$variant,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(ActionKind::$variant => $name,)*
                }
            }
        }

        impl FromStr for ActionKind {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(ActionKind::$variant),)*
                    other => Err(AppError::UnsupportedAction(other.to_string())),
                }
            }
        }
    };
}

action_kinds! {
    CreateLocation => "createLocation",
    UpdateLocation => "updateLocation",
    DeleteLocation => "deleteLocation",
    CreateProxyUser => "createProxyUser",
    CreateUser => "createUser",
    NewRequest => "newRequest",
    ApproveRequest => "approveRequest",
    RejectRequest => "rejectRequest",
    CancelRequest => "cancelRequest",
    ModifyRequest => "modifyRequest",
    ModifyAppt => "modifyAppt",
    CancelAppt => "cancelAppt",
    NewPastAppt => "newPastAppt",
    ModifyPastAppt => "modifyPastAppt",
    DeletePastAppt => "deletePastAppt",
    ClockIn => "clockIn",
    ClockOut => "clockOut",
    ApproveClockIn => "approveClockIn",
    RejectClockIn => "rejectClockIn",
    ApproveClockOut => "approveClockOut",
    RejectClockOut => "rejectClockOut",
    InstantClockIn => "instantClockIn",
    InstantClockOut => "instantClockOut",
    RequestPaymentFor => "requestPaymentFor",
    ApprovePayment => "approvePayment",
    DenyPayment => "denyPayment",
    RequestPayout => "requestPayout",
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed action with its payload.
#[derive(Debug, Clone)]
pub enum Action {
    CreateLocation { location: Location, id: Option<String> },
    UpdateLocation { patch: Map<String, Value>, id: String },
    DeleteLocation { id: String },
    CreateProxyUser { profile: User },
    CreateUser { user: User },
    NewRequest { request: Request, payment: Option<PaymentDraft> },
    ApproveRequest { request: RequestRef, id: String },
    RejectRequest { request: RequestRef, id: String },
    CancelRequest { request: RequestRef, id: String },
    ModifyRequest { request: Request, id: String },
    ModifyAppt { appt: ApptEdit, id: String },
    CancelAppt { appt: ApptRef, id: String },
    NewPastAppt { appt: PastApptEdit },
    ModifyPastAppt { appt: PastApptEdit, id: String },
    DeletePastAppt { appt: ApptRef, id: String },
    ClockIn { appt: ApptRef, id: String },
    ClockOut { appt: ApptRef, id: String },
    ApproveClockIn { clock_in: ClockRef, id: String },
    RejectClockIn { clock_in: ClockRef, id: String },
    ApproveClockOut { clock_out: ClockRef, id: String },
    RejectClockOut { clock_out: ClockRef, id: String },
    InstantClockIn { appt: ApptRef, id: String },
    InstantClockOut { appt: ApptRef, id: String },
    RequestPaymentFor { appt: ApptRef, id: String },
    ApprovePayment { id: String },
    DenyPayment { id: String },
    RequestPayout,
}

impl Action {
    /// Decode the payload for `kind`.
    pub fn parse(kind: ActionKind, body: Value) -> Result<Self> {
        use ActionKind as K;

        Ok(match kind {
            K::CreateLocation => Action::CreateLocation {
                location: field(&body, "location")?,
                id: optional(&body, "id")?.filter(|id: &String| !id.is_empty()),
            },
            K::UpdateLocation => Action::UpdateLocation {
                patch: field(&body, "location")?,
                id: id(&body)?,
            },
            K::DeleteLocation => Action::DeleteLocation { id: id(&body)? },
            K::CreateProxyUser => Action::CreateProxyUser {
                profile: field(&body, "user")?,
            },
            K::CreateUser => Action::CreateUser {
                user: serde_json::from_value(body)
                    .map_err(|e| AppError::BadRequest(format!("invalid user: {e}")))?,
            },
            K::NewRequest => Action::NewRequest {
                request: field(&body, "request")?,
                payment: optional(&body, "payment")?,
            },
            K::ApproveRequest => Action::ApproveRequest {
                request: field(&body, "request")?,
                id: id(&body)?,
            },
            K::RejectRequest => Action::RejectRequest {
                request: field(&body, "request")?,
                id: id(&body)?,
            },
            K::CancelRequest => Action::CancelRequest {
                request: field(&body, "request")?,
                id: id(&body)?,
            },
            K::ModifyRequest => Action::ModifyRequest {
                request: field(&body, "request")?,
                id: id(&body)?,
            },
            K::ModifyAppt => Action::ModifyAppt {
                appt: field(&body, "appt")?,
                id: id(&body)?,
            },
            K::CancelAppt => Action::CancelAppt {
                appt: field(&body, "appt")?,
                id: id(&body)?,
            },
            K::NewPastAppt => Action::NewPastAppt {
                appt: field(&body, "appt")?,
            },
            K::ModifyPastAppt => Action::ModifyPastAppt {
                appt: field(&body, "appt")?,
                id: id(&body)?,
            },
            K::DeletePastAppt => Action::DeletePastAppt {
                appt: field(&body, "appt")?,
                id: id(&body)?,
            },
            K::ClockIn => Action::ClockIn {
                appt: field(&body, "appt")?,
                id: id(&body)?,
            },
            K::ClockOut => Action::ClockOut {
                appt: field(&body, "appt")?,
                id: id(&body)?,
            },
            K::ApproveClockIn => Action::ApproveClockIn {
                clock_in: field(&body, "clockIn")?,
                id: id(&body)?,
            },
            K::RejectClockIn => Action::RejectClockIn {
                clock_in: field(&body, "clockIn")?,
                id: id(&body)?,
            },
            K::ApproveClockOut => Action::ApproveClockOut {
                clock_out: field(&body, "clockOut")?,
                id: id(&body)?,
            },
            K::RejectClockOut => Action::RejectClockOut {
                clock_out: field(&body, "clockOut")?,
                id: id(&body)?,
            },
            K::InstantClockIn => Action::InstantClockIn {
                appt: field(&body, "appt")?,
                id: id(&body)?,
            },
            K::InstantClockOut => Action::InstantClockOut {
                appt: field(&body, "appt")?,
                id: id(&body)?,
            },
            K::RequestPaymentFor => Action::RequestPaymentFor {
                appt: field(&body, "appt")?,
                id: id(&body)?,
            },
            K::ApprovePayment => Action::ApprovePayment { id: id(&body)? },
            K::DenyPayment => Action::DenyPayment { id: id(&body)? },
            K::RequestPayout => Action::RequestPayout,
        })
    }

    pub fn kind(&self) -> ActionKind {
        use ActionKind as K;

        match self {
            Action::CreateLocation { .. } => K::CreateLocation,
            Action::UpdateLocation { .. } => K::UpdateLocation,
            Action::DeleteLocation { .. } => K::DeleteLocation,
            Action::CreateProxyUser { .. } => K::CreateProxyUser,
            Action::CreateUser { .. } => K::CreateUser,
            Action::NewRequest { .. } => K::NewRequest,
            Action::ApproveRequest { .. } => K::ApproveRequest,
            Action::RejectRequest { .. } => K::RejectRequest,
            Action::CancelRequest { .. } => K::CancelRequest,
            Action::ModifyRequest { .. } => K::ModifyRequest,
            Action::ModifyAppt { .. } => K::ModifyAppt,
            Action::CancelAppt { .. } => K::CancelAppt,
            Action::NewPastAppt { .. } => K::NewPastAppt,
            Action::ModifyPastAppt { .. } => K::ModifyPastAppt,
            Action::DeletePastAppt { .. } => K::DeletePastAppt,
            Action::ClockIn { .. } => K::ClockIn,
            Action::ClockOut { .. } => K::ClockOut,
            Action::ApproveClockIn { .. } => K::ApproveClockIn,
            Action::RejectClockIn { .. } => K::RejectClockIn,
            Action::ApproveClockOut { .. } => K::ApproveClockOut,
            Action::RejectClockOut { .. } => K::RejectClockOut,
            Action::InstantClockIn { .. } => K::InstantClockIn,
            Action::InstantClockOut { .. } => K::InstantClockOut,
            Action::RequestPaymentFor { .. } => K::RequestPaymentFor,
            Action::ApprovePayment { .. } => K::ApprovePayment,
            Action::DenyPayment { .. } => K::DenyPayment,
            Action::RequestPayout => K::RequestPayout,
        }
    }

    /// The engagement id this action works on, for locking.
    pub fn engagement_id(&self) -> Option<&str> {
        match self {
            Action::UpdateLocation { id, .. }
            | Action::DeleteLocation { id }
            | Action::ApproveRequest { id, .. }
            | Action::RejectRequest { id, .. }
            | Action::CancelRequest { id, .. }
            | Action::ModifyRequest { id, .. }
            | Action::ModifyAppt { id, .. }
            | Action::CancelAppt { id, .. }
            | Action::ModifyPastAppt { id, .. }
            | Action::DeletePastAppt { id, .. }
            | Action::ClockIn { id, .. }
            | Action::ClockOut { id, .. }
            | Action::ApproveClockIn { id, .. }
            | Action::RejectClockIn { id, .. }
            | Action::ApproveClockOut { id, .. }
            | Action::RejectClockOut { id, .. }
            | Action::InstantClockIn { id, .. }
            | Action::InstantClockOut { id, .. }
            | Action::RequestPaymentFor { id, .. }
            | Action::ApprovePayment { id }
            | Action::DenyPayment { id } => Some(id.as_str()),
            Action::CreateLocation { id, .. } => id.as_deref(),
            Action::CreateProxyUser { .. }
            | Action::CreateUser { .. }
            | Action::NewRequest { .. }
            | Action::NewPastAppt { .. }
            | Action::RequestPayout => None,
        }
    }
}

fn field<T: DeserializeOwned>(body: &Value, key: &str) -> Result<T> {
    let value = body
        .get(key)
        .ok_or_else(|| AppError::BadRequest(format!("missing `{key}`")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::BadRequest(format!("invalid `{key}`: {e}")))
}

fn optional<T: DeserializeOwned>(body: &Value, key: &str) -> Result<Option<T>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => field(body, key).map(Some),
    }
}

fn id(body: &Value) -> Result<String> {
    let id: String = field(body, "id")?;
    let id = id.trim();
    if id.is_empty() || id.contains('/') {
        return Err(AppError::BadRequest("invalid `id`".to_string()));
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_action_name_round_trips() {
        assert_eq!(ActionKind::ALL.len(), 27);
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn unknown_action_is_unsupported() {
        assert!(matches!(
            "approveEverything".parse::<ActionKind>(),
            Err(AppError::UnsupportedAction(name)) if name == "approveEverything"
        ));
    }

    #[test]
    fn payload_errors_are_bad_requests() {
        let missing = Action::parse(ActionKind::ApproveRequest, json!({"id": "R1"}));
        assert!(matches!(missing, Err(AppError::BadRequest(msg)) if msg.contains("request")));

        let no_id = Action::parse(
            ActionKind::ClockIn,
            json!({"appt": {"attendees": [{"uid": "a"}, {"uid": "b"}]}}),
        );
        assert!(matches!(no_id, Err(AppError::BadRequest(_))));

        let slash = Action::parse(ActionKind::ApprovePayment, json!({"id": "a/b"}));
        assert!(matches!(slash, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn parsed_action_knows_its_engagement() {
        let action = Action::parse(
            ActionKind::ApproveClockIn,
            json!({
                "clockIn": {"for": {"attendees": [{"uid": "p"}, {"uid": "t"}], "location": {"id": "gunn"}}},
                "id": "R1",
            }),
        )
        .unwrap();
        assert_eq!(action.kind(), ActionKind::ApproveClockIn);
        assert_eq!(action.engagement_id(), Some("R1"));
        assert_eq!(Action::RequestPayout.engagement_id(), None);
    }
}
