// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read from the environment once at startup.

use std::env;

/// Cloud Tasks queue that carries payment triggers.
pub const PAYMENTS_QUEUE_NAME: &str = "payment-processing";

/// Where documents are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// How payment triggers are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Enqueue a Cloud Task that calls back into `/tasks/payments`.
    CloudTasks,
    /// Run the processor on a spawned task in this process.
    Inline,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Server port
    pub port: u16,
    /// GCP / Firebase project ID
    pub gcp_project_id: String,
    /// GCP region for Cloud Tasks
    pub gcp_region: String,
    /// Public API URL (Cloud Tasks target and OIDC audience)
    pub api_url: String,
    /// Frontend URL for CORS
    pub frontend_url: String,
    pub store_backend: StoreBackend,
    pub trigger_mode: TriggerMode,
    /// Percentage of every captured charge kept as the application fee
    pub application_fee_percent: u32,

    // --- Secrets ---
    /// HS256 secret accepted for identity tokens (emulator and tests only)
    pub identity_dev_secret: Option<String>,
    /// Live gateway key
    pub stripe_secret_key: String,
    /// Gateway key used for the test partition
    pub stripe_test_secret_key: String,
    /// Webhook signing secret
    pub stripe_webhook_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("firestore") | Err(_) => StoreBackend::Firestore,
            Ok(other) => return Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        };

        let trigger_mode = match env::var("TRIGGER_MODE").as_deref() {
            Ok("inline") => TriggerMode::Inline,
            Ok("cloud-tasks") | Err(_) => TriggerMode::CloudTasks,
            Ok(other) => return Err(ConfigError::Invalid("TRIGGER_MODE", other.to_string())),
        };

        let application_fee_percent = match env::var("APPLICATION_FEE_PERCENT") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|p| *p <= 100)
                .ok_or(ConfigError::Invalid("APPLICATION_FEE_PERCENT", raw))?,
            Err(_) => 10,
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-central1".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            store_backend,
            trigger_mode,
            application_fee_percent,

            identity_dev_secret: env::var("IDENTITY_DEV_SECRET")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            stripe_secret_key: required_secret("STRIPE_SECRET_KEY")?,
            stripe_test_secret_key: required_secret("STRIPE_TEST_SECRET_KEY")?,
            stripe_webhook_secret: required_secret("STRIPE_WEBHOOK_SECRET")?,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-central1".to_string(),
            api_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            store_backend: StoreBackend::Memory,
            trigger_mode: TriggerMode::Inline,
            application_fee_percent: 10,
            identity_dev_secret: Some("test_identity_secret_32_bytes!!!".to_string()),
            stripe_secret_key: "sk_live_test_placeholder".to_string(),
            stripe_test_secret_key: "sk_test_placeholder".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
        }
    }
}

fn required_secret(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
