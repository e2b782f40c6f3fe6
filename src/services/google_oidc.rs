// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OIDC token verification for Cloud Tasks callbacks.

use crate::config::Config;
use crate::services::jwks::{extract_bearer_token, validate_iat, KeySource, VerifyError, CLOCK_SKEW_SECS};
use axum::http::HeaderValue;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Verified Cloud Tasks principal extracted from a valid OIDC token.
#[derive(Debug, Clone)]
pub struct VerifiedTaskPrincipal {
    pub email: String,
    pub subject: String,
    pub audience: String,
}

/// Service account Cloud Tasks signs payment-trigger callbacks as.
pub fn tasks_service_account(project_id: &str) -> String {
    format!("tutorbook-api@{project_id}.iam.gserviceaccount.com")
}

/// Verifier for Cloud Tasks-issued OIDC ID tokens.
pub struct GoogleOidcVerifier {
    expected_audience: String,
    expected_service_account_email: String,
    keys: KeySource,
}

impl GoogleOidcVerifier {
    /// Create a production verifier backed by Google's published keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let verifier = Self::with_keys(config, KeySource::remote(GOOGLE_JWKS_URL)?);

        tracing::info!(
            expected_audience = %verifier.expected_audience,
            expected_service_account_email = %verifier.expected_service_account_email,
            "Initialized Cloud Tasks OIDC verifier"
        );

        Ok(verifier)
    }

    /// Create a verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        Ok(Self::with_keys(config, KeySource::fixed(kid, decoding_key)?))
    }

    fn with_keys(config: &Config, keys: KeySource) -> Self {
        Self {
            expected_audience: canonicalize_audience(&config.api_url),
            expected_service_account_email: tasks_service_account(&config.gcp_project_id),
            keys,
        }
    }

    /// Verify a Cloud Tasks OIDC bearer token from an Authorization header.
    pub async fn verify_cloud_tasks_token(
        &self,
        auth_header: Option<&HeaderValue>,
    ) -> Result<VerifiedTaskPrincipal, VerifyError> {
        let token = extract_bearer_token(auth_header)?;

        let header = decode_header(token)
            .map_err(|e| VerifyError::Forbidden(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(VerifyError::Forbidden(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| VerifyError::Forbidden("missing JWT kid".to_string()))?;

        let decoding_key = self.keys.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<GoogleIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| VerifyError::Forbidden(format!("JWT validation failed: {e}")))?
            .claims;

        validate_iat(claims.iat)?;

        let email = claims
            .email
            .ok_or_else(|| VerifyError::Forbidden("missing email claim".to_string()))?;

        if email != self.expected_service_account_email {
            return Err(VerifyError::Forbidden(format!(
                "unexpected service account email: {email}"
            )));
        }

        if claims.email_verified != Some(true) {
            return Err(VerifyError::Forbidden(
                "email_verified claim is false or missing".to_string(),
            ));
        }

        Ok(VerifiedTaskPrincipal {
            email,
            subject: claims.sub,
            audience: claims.aud,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    aud: String,
    sub: String,
    iat: Option<usize>,
    email: Option<String>,
    email_verified: Option<bool>,
}

fn canonicalize_audience(audience: &str) -> String {
    audience.trim_end_matches('/').to_string()
}
