// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tutorbook API Server
//!
//! Runs the data endpoint, payment trigger handler and gateway webhook on
//! Cloud Run.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tutorbook_api::{
    config::{Config, StoreBackend, TriggerMode},
    db::{DocumentStore, FirestoreDb, MemoryStore},
    services::{
        payments::{PaymentGateway, StripeClient},
        AccountDirectory, GoogleOidcVerifier, IdentityToolkitDirectory, IdentityVerifier,
        LogNotifier, TasksService, TriggerQueue,
    },
    AppState, Collaborators,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Tutorbook API");

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory document store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let triggers: Option<Arc<dyn TriggerQueue>> = match config.trigger_mode {
        TriggerMode::CloudTasks => {
            tracing::info!(
                project = %config.gcp_project_id,
                region = %config.gcp_region,
                "Cloud Tasks service initialized"
            );
            Some(Arc::new(TasksService::new(
                &config.gcp_project_id,
                &config.gcp_region,
                &config.api_url,
            )))
        }
        TriggerMode::Inline => {
            tracing::warn!("Payment triggers run in-process");
            None
        }
    };

    let live_gateway: Arc<dyn PaymentGateway> = Arc::new(StripeClient::new(&config.stripe_secret_key)?);
    let test_gateway: Arc<dyn PaymentGateway> =
        Arc::new(StripeClient::new(&config.stripe_test_secret_key)?);
    let directory: Arc<dyn AccountDirectory> =
        Arc::new(IdentityToolkitDirectory::new(&config.gcp_project_id)?);

    let collaborators = Collaborators {
        store,
        identity: Arc::new(IdentityVerifier::new(&config)?),
        google_oidc_verifier: Arc::new(GoogleOidcVerifier::new(&config)?),
        live_gateway,
        test_gateway,
        notifier: Arc::new(LogNotifier),
        directory,
        triggers,
    };

    let state = Arc::new(AppState::assemble(config.clone(), collaborators));
    let app = tutorbook_api::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tutorbook_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
