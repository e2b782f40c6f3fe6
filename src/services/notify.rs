// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound user notifications.
//!
//! Delivery (email, SMS, push) belongs to a separate service; this side only
//! emits the message.

use crate::error::Result;
use crate::models::ConciseUser;
use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &ConciseUser, subject: &str, message: &str) -> Result<()>;
}

/// Emits each email as a structured log event for the delivery pipeline.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_email(&self, to: &ConciseUser, subject: &str, message: &str) -> Result<()> {
        tracing::info!(
            event = "email",
            to_uid = %to.uid,
            to_email = %to.email,
            subject,
            message,
            "Email notification"
        );
        Ok(())
    }
}

/// First name, for salutations.
pub fn first_name(user: &ConciseUser) -> &str {
    user.name.split_whitespace().next().unwrap_or(&user.name)
}
