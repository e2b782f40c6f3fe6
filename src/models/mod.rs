// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod appointment;
pub mod clock;
pub mod decision;
pub mod location;
pub mod payment;
pub mod request;
pub mod user;

pub use appointment::{ActiveAppointment, Appointment, ClockStamp, PastAppointment};
pub use clock::{ApprovedClockEvent, ClockEvent, ClockIn, ClockOut, RejectedClockEvent};
pub use decision::{
    ApprovedRequest, CanceledAppointment, CanceledRequest, DeniedPayment, ModifiedAppointment,
    ModifiedRequest, RejectedRequest,
};
pub use location::{HoursRules, Location, LocationRef, RoundingMode, RoundingThreshold};
pub use payment::{
    ApprovedPayment, AuthPayment, PastPayment, PastPayout, PaymentMethod, RequestedPayment,
    RequestedPayout, SentPayment, Transaction,
};
pub use request::{PaymentTerms, Request, TimeSlot};
pub use user::{ConciseUser, PaymentType, User, UserType};
