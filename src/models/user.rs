// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profiles and the concise snapshot embedded into other records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use validator::Validate;

const DEFAULT_PHOTO_BASE: &str = "https://tutorbook.app/app/img/";
const DEFAULT_GRADE: &str = "Sophomore";
const DEFAULT_GENDER: &str = "Male";

/// Role of a user on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserType {
    Tutor,
    Pupil,
    Parent,
    Teacher,
    Supervisor,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Tutor => "Tutor",
            UserType::Pupil => "Pupil",
            UserType::Parent => "Parent",
            UserType::Teacher => "Teacher",
            UserType::Supervisor => "Supervisor",
        }
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Tutor" => Ok(UserType::Tutor),
            "Pupil" => Ok(UserType::Pupil),
            "Parent" => Ok(UserType::Parent),
            "Teacher" => Ok(UserType::Teacher),
            "Supervisor" => Ok(UserType::Supervisor),
            other => Err(format!("unknown user type: {other}")),
        }
    }
}

/// Whether lessons with a user cost money.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentType {
    #[default]
    Free,
    Paid,
}

/// A user's payment settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsConfig {
    #[serde(default, rename = "type")]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub hourly_charge: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One open window in a user's availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub open: String,
    pub close: String,
    #[serde(default)]
    pub booked: bool,
}

/// Location name -> day -> windows.
pub type Availability = BTreeMap<String, BTreeMap<String, Vec<AvailabilitySlot>>>;

/// Full user profile as stored under `users/{uid}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, rename = "type")]
    pub user_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payments: Option<PaymentsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub availability: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_tutored: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_pupiled: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clocked_in: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clocked_out: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn kind(&self) -> Option<UserType> {
        self.user_type.parse().ok()
    }

    pub fn is_paid_tutor(&self) -> bool {
        self.kind() == Some(UserType::Tutor)
            && self
                .payments
                .as_ref()
                .is_some_and(|p| p.payment_type == PaymentType::Paid)
    }

    /// The first required identity field that is empty, if any.
    pub fn missing_required_field(&self) -> Option<&'static str> {
        [
            ("name", &self.name),
            ("email", &self.email),
            ("id", &self.id),
            ("type", &self.user_type),
            ("uid", &self.uid),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }

    /// Optional profile fields that will fall back to defaults.
    pub fn defaulted_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.photo.as_deref().map_or(true, str::is_empty) {
            fields.push("photo");
        }
        if self.grade.as_deref().map_or(true, str::is_empty) {
            fields.push("grade");
        }
        if self.gender.as_deref().map_or(true, str::is_empty) {
            fields.push("gender");
        }
        if self.payments.is_none() {
            fields.push("payments");
        }
        if self.proxy.is_none() {
            fields.push("proxy");
        }
        fields
    }

    /// Add (or remove, when negative) service time for this user's role.
    ///
    /// Returns false when the role does not accrue service hours.
    pub fn add_service_seconds(&mut self, seconds: f64) -> bool {
        let total = match self.kind() {
            Some(UserType::Tutor) => &mut self.seconds_tutored,
            Some(UserType::Pupil) => &mut self.seconds_pupiled,
            _ => return false,
        };
        *total = Some((total.unwrap_or(0.0) + seconds).max(0.0));
        true
    }
}

/// Default profile photo for a gender.
pub fn default_photo(gender: Option<&str>) -> String {
    let file = if gender == Some("Female") {
        "female.png"
    } else {
        "male.png"
    };
    format!("{DEFAULT_PHOTO_BASE}{file}")
}

/// Reduced, safe-defaulted user snapshot embedded into other records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConciseUser {
    pub name: String,
    pub email: String,
    pub id: String,
    pub uid: String,
    pub photo: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub grade: String,
    pub gender: String,
    pub hourly_charge: f64,
    pub payments: PaymentsConfig,
    pub proxy: Vec<String>,
}

impl From<&User> for ConciseUser {
    fn from(user: &User) -> Self {
        let payments = user.payments.clone().unwrap_or_default();
        ConciseUser {
            name: user.name.clone(),
            email: user.email.clone(),
            id: user.id.clone(),
            uid: user.uid.clone(),
            photo: user
                .photo
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| default_photo(user.gender.as_deref())),
            user_type: user.user_type.clone(),
            grade: user
                .grade
                .clone()
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| DEFAULT_GRADE.to_string()),
            gender: user
                .gender
                .clone()
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| DEFAULT_GENDER.to_string()),
            hourly_charge: payments.hourly_charge,
            payments,
            proxy: user.proxy.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn concise_user_applies_defaults() {
        let user: User = serde_json::from_value(json!({
            "name": "Pat Pupil",
            "email": "pat@example.com",
            "id": "pat@example.com",
            "uid": "pat",
            "type": "Pupil",
            "gender": "Female",
        }))
        .unwrap();

        let concise = ConciseUser::from(&user);
        assert_eq!(concise.photo, "https://tutorbook.app/app/img/female.png");
        assert_eq!(concise.grade, "Sophomore");
        assert_eq!(concise.gender, "Female");
        assert_eq!(concise.payments.payment_type, PaymentType::Free);
        assert_eq!(concise.hourly_charge, 0.0);
        assert!(concise.proxy.is_empty());
        assert_eq!(
            user.defaulted_fields(),
            ["photo", "grade", "payments", "proxy"]
        );
    }

    #[test]
    fn missing_required_field_reports_first_gap() {
        let mut user = User {
            name: "T".into(),
            email: "t@example.com".into(),
            id: "t@example.com".into(),
            uid: "t".into(),
            user_type: "Tutor".into(),
            ..Default::default()
        };
        assert_eq!(user.missing_required_field(), None);
        user.id = " ".into();
        assert_eq!(user.missing_required_field(), Some("id"));
    }

    #[test]
    fn unknown_profile_fields_survive_round_trip() {
        let raw = json!({
            "name": "T",
            "uid": "t",
            "type": "Tutor",
            "location": "Gunn Academic Center",
            "config": {"showProfile": true},
        });
        let user: User = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["location"], "Gunn Academic Center");
        assert_eq!(back["config"]["showProfile"], true);
    }

    #[test]
    fn service_seconds_follow_role() {
        let mut tutor = User {
            user_type: "Tutor".into(),
            ..Default::default()
        };
        assert!(tutor.add_service_seconds(3600.0));
        assert!(tutor.add_service_seconds(-600.0));
        assert_eq!(tutor.seconds_tutored, Some(3000.0));
        assert_eq!(tutor.seconds_pupiled, None);

        let mut parent = User {
            user_type: "Parent".into(),
            ..Default::default()
        };
        assert!(!parent.add_service_seconds(60.0));
    }
}
