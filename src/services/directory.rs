// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity account directory, used when supervisors create proxy users.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};

const IDENTITY_TOOLKIT_HOST: &str = "https://identitytoolkit.googleapis.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// An identity account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn create_account(
        &self,
        email: &str,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<Account>;
}

/// Identity Toolkit REST client.
pub struct IdentityToolkitDirectory {
    http_client: reqwest::Client,
    base_url: String,
    emulated: bool,
    token_generator: OnceCell<gcloud_sdk::GoogleAuthTokenGenerator>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    email: [&'a str; 1],
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<ToolkitUser>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest<'a> {
    email: &'a str,
    display_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolkitUser {
    local_id: String,
    #[serde(default)]
    email: String,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl From<ToolkitUser> for Account {
    fn from(user: ToolkitUser) -> Self {
        Account {
            uid: user.local_id,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
        }
    }
}

impl IdentityToolkitDirectory {
    /// Uses the auth emulator when `FIREBASE_AUTH_EMULATOR_HOST` is set.
    pub fn new(project_id: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let (host, emulated) = match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(emulator) => {
                tracing::info!(host = %emulator, "Using Firebase Auth emulator");
                (format!("http://{emulator}/identitytoolkit.googleapis.com"), true)
            }
            Err(_) => (IDENTITY_TOOLKIT_HOST.to_string(), false),
        };

        Ok(Self {
            http_client,
            base_url: format!("{host}/v1/projects/{project_id}"),
            emulated,
            token_generator: OnceCell::new(),
        })
    }

    async fn bearer(&self) -> Result<String> {
        // The emulator accepts this fixed admin credential.
        if self.emulated {
            return Ok("Bearer owner".to_string());
        }

        let generator = self
            .token_generator
            .get_or_try_init(|| async {
                gcloud_sdk::GoogleAuthTokenGenerator::new(
                    gcloud_sdk::TokenSourceType::Default,
                    gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
                )
                .await
            })
            .await
            .map_err(|e| AppError::Identity(format!("credentials unavailable: {e}")))?;

        let token = generator
            .create_token()
            .await
            .map_err(|e| AppError::Identity(format!("access token unavailable: {e}")))?;

        Ok(format!("{} {}", token.token_type, token.token.as_sensitive_str()))
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Identity(format!("{path} returned {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Identity(format!("invalid {path} response: {e}")))
    }
}

#[async_trait]
impl AccountDirectory for IdentityToolkitDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let response: LookupResponse = self
            .post("/accounts:lookup", &LookupRequest { email: [email] })
            .await?;
        Ok(response.users.into_iter().next().map(Account::from))
    }

    async fn create_account(
        &self,
        email: &str,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<Account> {
        let user: ToolkitUser = self
            .post(
                "/accounts",
                &SignUpRequest {
                    email,
                    display_name,
                    photo_url,
                },
            )
            .await?;

        tracing::info!(uid = %user.local_id, email, "Created identity account");

        Ok(Account {
            uid: user.local_id,
            email: email.to_string(),
            display_name: Some(display_name.to_string()),
            photo_url: photo_url.map(str::to_string),
        })
    }
}

/// Directory kept in memory, for the memory backend and tests.
#[derive(Default)]
pub struct MemoryDirectory {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, account: Account) {
        self.accounts
            .write()
            .await
            .insert(account.email.to_lowercase(), account);
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(&email.to_lowercase()).cloned())
    }

    async fn create_account(
        &self,
        email: &str,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email.to_lowercase()) {
            return Err(AppError::Conflict(format!("account for {email} already exists")));
        }
        let account = Account {
            uid: crate::db::new_document_id(),
            email: email.to_string(),
            display_name: Some(display_name.to_string()),
            photo_url: photo_url.map(str::to_string),
        };
        accounts.insert(email.to_lowercase(), account.clone());
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_directory_finds_case_insensitively() {
        let directory = MemoryDirectory::new();
        let created = directory
            .create_account("Pat@Example.com", "Pat Pupil", None)
            .await
            .unwrap();

        let found = directory.find_by_email("pat@example.com").await.unwrap();
        assert_eq!(found, Some(created));
        assert!(matches!(
            directory.create_account("pat@example.com", "Pat", None).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn lookup_body_shape() {
        let body = serde_json::to_value(LookupRequest { email: ["a@b.c"] }).unwrap();
        assert_eq!(body, serde_json::json!({"email": ["a@b.c"]}));
    }
}
