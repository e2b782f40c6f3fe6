// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tutorbook API: tutoring marketplace backend
//!
//! This crate provides the data endpoint that moves tutoring engagements
//! from request to appointment to clocked hours to payment, plus the
//! payment processor that settles them with the gateway.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use services::payments::PaymentGateway;
use services::{
    AccountDirectory, Gate, GoogleOidcVerifier, IdentityVerifier, InlineQueue, LifecycleEngine,
    Notifier, PaymentProcessor, TriggerQueue,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<IdentityVerifier>,
    pub gate: Gate,
    pub payments: Arc<PaymentProcessor>,
    pub triggers: Arc<dyn TriggerQueue>,
    pub google_oidc_verifier: Arc<GoogleOidcVerifier>,
}

/// External collaborators the state is assembled from.
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<IdentityVerifier>,
    pub google_oidc_verifier: Arc<GoogleOidcVerifier>,
    pub live_gateway: Arc<dyn PaymentGateway>,
    pub test_gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub directory: Arc<dyn AccountDirectory>,
    /// Trigger sink; `None` runs the processor in-process.
    pub triggers: Option<Arc<dyn TriggerQueue>>,
}

impl AppState {
    pub fn assemble(config: Config, parts: Collaborators) -> Self {
        let payments = Arc::new(PaymentProcessor::new(
            parts.store.clone(),
            parts.live_gateway,
            parts.test_gateway,
            parts.notifier,
            config.application_fee_percent,
        ));
        let triggers = parts
            .triggers
            .unwrap_or_else(|| Arc::new(InlineQueue::new(payments.clone())));
        let engine = Arc::new(LifecycleEngine::new(
            parts.store.clone(),
            triggers.clone(),
            parts.directory,
        ));
        let gate = Gate::new(parts.store.clone(), parts.identity.clone(), engine);

        Self {
            config,
            store: parts.store,
            identity: parts.identity,
            gate,
            payments,
            triggers,
            google_oidc_verifier: parts.google_oidc_verifier,
        }
    }
}
