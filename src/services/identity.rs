// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token verification.
//!
//! Production tokens are RS256, signed by the securetoken service account.
//! When `IDENTITY_DEV_SECRET` is configured, HS256 tokens signed with it are
//! accepted too (auth emulator and tests).

use crate::config::Config;
use crate::error::AppError;
use crate::services::jwks::{validate_iat, KeySource, VerifyError, CLOCK_SKEW_SECS};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

const SECURETOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Claims this service relies on from a verified identity token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(rename = "sub")]
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Custom claim set on supervisor accounts.
    #[serde(default)]
    pub supervisor: bool,
    /// Custom claim: location ids a supervisor manages.
    #[serde(default)]
    pub locations: Vec<String>,
}

impl IdentityClaims {
    pub fn supervises(&self, location_id: &str) -> bool {
        self.supervisor && self.locations.iter().any(|id| id == location_id)
    }
}

#[derive(Debug, Deserialize)]
struct FirebaseTokenClaims {
    iat: Option<usize>,
    #[serde(flatten)]
    identity: IdentityClaims,
}

pub struct IdentityVerifier {
    project_id: String,
    keys: KeySource,
    dev_key: Option<DecodingKey>,
}

impl IdentityVerifier {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let keys = KeySource::remote(SECURETOKEN_JWKS_URL)?;
        if config.identity_dev_secret.is_some() {
            tracing::warn!("Accepting HS256 identity tokens signed with the dev secret");
        }
        Ok(Self::with_keys(config, keys))
    }

    /// Verifier with a fixed RS256 key, for tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        Ok(Self::with_keys(config, KeySource::fixed(kid, decoding_key)?))
    }

    fn with_keys(config: &Config, keys: KeySource) -> Self {
        Self {
            project_id: config.gcp_project_id.clone(),
            keys,
            dev_key: config
                .identity_dev_secret
                .as_ref()
                .map(|secret| DecodingKey::from_secret(secret.as_bytes())),
        }
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;
        validation
    }

    /// Verify a raw identity token.
    pub async fn verify(&self, token: &str) -> Result<IdentityClaims, VerifyError> {
        let header = decode_header(token)
            .map_err(|e| VerifyError::Forbidden(format!("invalid JWT header: {e}")))?;

        let claims = match (header.alg, &self.dev_key) {
            (Algorithm::HS256, Some(dev_key)) => {
                decode::<FirebaseTokenClaims>(token, dev_key, &self.validation(Algorithm::HS256))
            }
            (Algorithm::RS256, _) => {
                let kid = header
                    .kid
                    .ok_or_else(|| VerifyError::Forbidden("missing JWT kid".to_string()))?;
                let key = self.keys.key_for(&kid).await?;
                decode::<FirebaseTokenClaims>(token, key.as_ref(), &self.validation(Algorithm::RS256))
            }
            (alg, _) => {
                return Err(VerifyError::Forbidden(format!("unexpected JWT alg: {alg:?}")));
            }
        }
        .map_err(|e| VerifyError::Forbidden(format!("JWT validation failed: {e}")))?
        .claims;

        validate_iat(claims.iat)?;

        if claims.identity.uid.trim().is_empty() {
            return Err(VerifyError::Forbidden("empty sub claim".to_string()));
        }

        Ok(claims.identity)
    }
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Forbidden(reason) => {
                tracing::warn!(reason = %reason, "Rejected identity token");
                AppError::InvalidToken
            }
            VerifyError::Transient(reason) => AppError::Identity(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::jwks::now_unix_secs;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn sign(config: &Config, claims: serde_json::Value) -> String {
        let secret = config.identity_dev_secret.clone().unwrap();
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(config: &Config, uid: &str) -> serde_json::Value {
        let now = now_unix_secs();
        json!({
            "sub": uid,
            "email": "tutor@example.com",
            "iss": format!("https://securetoken.google.com/{}", config.gcp_project_id),
            "aud": config.gcp_project_id,
            "iat": now,
            "exp": now + 3600,
            "supervisor": true,
            "locations": ["gunn"],
        })
    }

    #[tokio::test]
    async fn dev_tokens_carry_custom_claims() {
        let config = Config::test_default();
        let verifier = IdentityVerifier::new(&config).unwrap();

        let verified = verifier.verify(&sign(&config, claims(&config, "tutor"))).await.unwrap();
        assert_eq!(verified.uid, "tutor");
        assert_eq!(verified.email.as_deref(), Some("tutor@example.com"));
        assert!(verified.supervises("gunn"));
        assert!(!verified.supervises("paly"));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let config = Config::test_default();
        let verifier = IdentityVerifier::new(&config).unwrap();

        let mut bad = claims(&config, "tutor");
        bad["aud"] = json!("someone-else");
        assert!(matches!(
            verifier.verify(&sign(&config, bad)).await,
            Err(VerifyError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn hs256_is_refused_without_dev_secret() {
        let config = Config::test_default();
        let token = sign(&config, claims(&config, "tutor"));

        let mut strict = config.clone();
        strict.identity_dev_secret = None;
        let verifier = IdentityVerifier::new(&strict).unwrap();
        assert!(matches!(
            verifier.verify(&token).await,
            Err(VerifyError::Forbidden(_))
        ));
    }
}
