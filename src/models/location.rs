// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tutoring locations and their service-hour rounding rules.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use validator::Validate;

/// Granularity used when rounding service time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoundingThreshold {
    #[default]
    Minute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    Hour,
}

impl RoundingThreshold {
    pub fn seconds(self) -> i64 {
        match self {
            RoundingThreshold::Minute => 60,
            RoundingThreshold::FiveMinutes => 5 * 60,
            RoundingThreshold::FifteenMinutes => 15 * 60,
            RoundingThreshold::ThirtyMinutes => 30 * 60,
            RoundingThreshold::Hour => 60 * 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoundingThreshold::Minute => "Minute",
            RoundingThreshold::FiveMinutes => "5 Minutes",
            RoundingThreshold::FifteenMinutes => "15 Minutes",
            RoundingThreshold::ThirtyMinutes => "30 Minutes",
            RoundingThreshold::Hour => "Hour",
        }
    }
}

// Unrecognized values fall back to the default.
impl From<String> for RoundingThreshold {
    fn from(value: String) -> Self {
        match value.as_str() {
            "5 Minutes" => RoundingThreshold::FiveMinutes,
            "15 Minutes" => RoundingThreshold::FifteenMinutes,
            "30 Minutes" => RoundingThreshold::ThirtyMinutes,
            "Hour" => RoundingThreshold::Hour,
            _ => RoundingThreshold::Minute,
        }
    }
}

impl From<RoundingThreshold> for String {
    fn from(value: RoundingThreshold) -> Self {
        value.as_str().to_string()
    }
}

/// Direction used when rounding service time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoundingMode {
    #[default]
    Up,
    Down,
    Normally,
}

impl From<String> for RoundingMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Down" => RoundingMode::Down,
            "Normally" => RoundingMode::Normally,
            _ => RoundingMode::Up,
        }
    }
}

impl From<RoundingMode> for String {
    fn from(value: RoundingMode) -> Self {
        match value {
            RoundingMode::Up => "Up",
            RoundingMode::Down => "Down",
            RoundingMode::Normally => "Normally",
        }
        .to_string()
    }
}

/// How a location rounds clocked service time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HoursRules {
    /// Granularity of the rounded duration.
    pub threshold: RoundingThreshold,
    pub rounding: RoundingMode,
    /// Granularity the clock-in time is rounded to.
    pub time_threshold: RoundingThreshold,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationConfig {
    #[serde(default)]
    pub hrs: HoursRules,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Opening window of a location on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenHours {
    pub open: String,
    pub close: String,
}

/// A location as stored under `locations/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub hours: BTreeMap<String, Vec<OpenHours>>,
    #[serde(default)]
    pub supervisors: Vec<String>,
    #[serde(default)]
    pub config: LocationConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to a location embedded in requests and appointments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LocationRef {
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_rules_fall_back_to_defaults() {
        let location: Location = serde_json::from_value(json!({
            "name": "Gunn Academic Center",
            "config": {"hrs": {"threshold": "Fortnight", "rounding": "Sideways"}},
        }))
        .unwrap();
        assert_eq!(location.config.hrs, HoursRules::default());
        assert_eq!(location.config.hrs.rounding, RoundingMode::Up);
    }

    #[test]
    fn rules_keep_their_stored_spelling() {
        let rules: HoursRules = serde_json::from_value(json!({
            "threshold": "15 Minutes",
            "rounding": "Normally",
            "timeThreshold": "5 Minutes",
        }))
        .unwrap();
        assert_eq!(rules.threshold.seconds(), 900);
        assert_eq!(rules.time_threshold.seconds(), 300);
        assert_eq!(
            serde_json::to_value(rules).unwrap(),
            json!({"threshold": "15 Minutes", "rounding": "Normally", "timeThreshold": "5 Minutes"})
        );
    }
}
