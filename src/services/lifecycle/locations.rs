// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Location and user management.

use super::{invalid, Context, LifecycleEngine};
use crate::db::{new_document_id, WriteBatch};
use crate::error::{AppError, Result};
use crate::models::user::default_photo;
use crate::models::{Location, User};
use serde_json::{json, Map, Value};
use validator::Validate;

impl LifecycleEngine {
    pub async fn create_location(&self, ctx: &Context, mut location: Location, id: Option<String>) -> Result<Value> {
        let p = ctx.partition;
        location.name = location.name.trim().to_string();
        location.validate().map_err(invalid)?;

        let id = id.filter(|id| !id.trim().is_empty()).unwrap_or_else(new_document_id);
        let path = p.location(&id);
        if self.store.exists(&path).await? {
            tracing::info!(partition = %p, id = %id, "Location already exists, overwriting");
        }

        let mut batch = WriteBatch::new();
        batch.set(path, &location)?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "createLocation", id = %id, name = %location.name, "Created location");
        Ok(json!({ "location": location, "id": id }))
    }

    /// Merge `patch` over the stored location.
    pub async fn update_location(&self, ctx: &Context, patch: Map<String, Value>, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let path = p.location(id);
        let Some(Value::Object(mut merged)) = self.store.get(&path).await? else {
            return Err(AppError::NotFound(format!("location ({id})")));
        };
        merged.extend(patch);

        let mut location: Location = serde_json::from_value(Value::Object(merged))
            .map_err(|e| AppError::BadRequest(format!("invalid location: {e}")))?;
        location.name = location.name.trim().to_string();
        location.validate().map_err(invalid)?;

        let mut batch = WriteBatch::new();
        batch.set(path, &location)?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "updateLocation", id, "Updated location");
        Ok(json!({ "location": location, "id": id }))
    }

    pub async fn delete_location(&self, ctx: &Context, id: &str) -> Result<Value> {
        let p = ctx.partition;
        let path = p.location(id);
        let location: Location = self.store.require(&path, "location").await?;

        let mut batch = WriteBatch::new();
        batch.delete(path);
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "deleteLocation", id, "Deleted location");
        Ok(json!({ "location": location, "id": id }))
    }

    pub async fn create_user(&self, ctx: &Context, user: User) -> Result<Value> {
        let p = ctx.partition;
        if user.uid.trim().is_empty() {
            return Err(AppError::BadRequest("user needs a uid".to_string()));
        }

        let mut batch = WriteBatch::new();
        batch.set(p.user(&user.uid), &user)?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "createUser", user = %user.uid, "Created user");
        Ok(json!({ "user": user }))
    }

    /// Create a profile on behalf of someone without an account, reusing
    /// their identity account when one already exists for the email.
    pub async fn create_proxy_user(&self, ctx: &Context, mut profile: User) -> Result<Value> {
        let p = ctx.partition;
        profile.name = profile.name.trim().to_string();
        profile.email = profile.email.trim().to_lowercase();
        profile.validate().map_err(invalid)?;

        let account = match self.directory.find_by_email(&profile.email).await? {
            Some(account) => {
                tracing::info!(uid = %account.uid, "Proxy user already has an identity account");
                account
            }
            None => {
                self.directory
                    .create_account(&profile.email, &profile.name, profile.photo.as_deref())
                    .await?
            }
        };

        profile.uid = account.uid.clone();
        if profile.id.is_empty() {
            profile.id = profile.email.clone();
        }
        profile.photo = account
            .photo_url
            .or(profile.photo.take())
            .filter(|photo| !photo.is_empty())
            .or_else(|| Some(default_photo(profile.gender.as_deref())));
        let proxies = profile.proxy.get_or_insert_with(Vec::new);
        if !proxies.iter().any(|uid| uid == ctx.uid()) {
            proxies.push(ctx.uid().to_string());
        }

        let mut batch = WriteBatch::new();
        batch.set(p.user(&profile.uid), &profile)?;
        self.store.commit(batch).await?;

        tracing::info!(partition = %p, action = "createProxyUser", user = %profile.uid, "Created proxy user");
        Ok(json!({ "user": profile, "uid": account.uid }))
    }
}
