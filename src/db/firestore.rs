// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing the document store seam.
//!
//! Every batch becomes one Firestore transaction, so a transition's whole
//! fan-out commits or fails together.

use crate::db::paths::{CollectionPath, DocPath};
use crate::db::store::{Document, DocumentStore, WriteBatch, WriteOp};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;
use serde_json::Value;

// Firestore limits batch/transaction writes to 500 operations.
const MAX_TRANSACTION_WRITES: usize = 500;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Path Helpers ────────────────────────────────────────────

    /// Resolve the Firestore parent path for documents of `segments`' last
    /// collection.
    fn parent_path(client: &firestore::FirestoreDb, segments: &[(String, String)]) -> Result<String> {
        let mut iter = segments.iter();
        let Some((collection, id)) = iter.next() else {
            return Ok(client.get_documents_path().to_string());
        };

        let mut builder = client
            .parent_path(collection, id)
            .map_err(|e| AppError::Database(format!("Invalid parent path: {}", e)))?;
        for (collection, id) in iter {
            builder = builder
                .at(collection, id)
                .map_err(|e| AppError::Database(format!("Invalid parent path: {}", e)))?;
        }

        Ok(builder.as_ref().to_string())
    }

    fn doc_parent(client: &firestore::FirestoreDb, path: &DocPath) -> Result<String> {
        let segments = path.segments();
        Self::parent_path(client, &segments[..segments.len().saturating_sub(1)])
    }
}

/// Drop the metadata fields the Firestore deserializer adds.
fn strip_metadata(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            map.retain(|key, _| !key.starts_with("_firestore_"));
            Value::Object(map)
        }
        other => other,
    }
}

fn map_commit_error(err: FirestoreError) -> AppError {
    match err {
        FirestoreError::DataNotFoundError(e) => {
            AppError::Conflict(format!("Document changed concurrently: {}", e))
        }
        FirestoreError::DataConflictError(e) => {
            AppError::Conflict(format!("Document changed concurrently: {}", e))
        }
        other => AppError::Database(format!("Transaction commit failed: {}", other)),
    }
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>> {
        let client = self.get_client()?;
        let parent = Self::doc_parent(client, path)?;

        let value: Option<Value> = client
            .fluent()
            .select()
            .by_id_in(path.collection_name())
            .parent(&parent)
            .obj()
            .one(path.id())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(value.map(strip_metadata))
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        let client = self.get_client()?;
        let parent = Self::parent_path(client, collection.parent().segments())?;

        let docs = client
            .fluent()
            .select()
            .from(collection.name())
            .parent(&parent)
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        docs.iter()
            .map(|doc| {
                let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();
                let data = firestore::FirestoreDb::deserialize_doc_to::<Value>(doc)
                    .map_err(|e| AppError::Database(format!("Failed to decode {}: {}", id, e)))?;
                Ok(Document {
                    id,
                    data: strip_metadata(data),
                })
            })
            .collect()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if batch.len() > MAX_TRANSACTION_WRITES {
            return Err(AppError::Database(format!(
                "Batch of {} writes exceeds the transaction limit",
                batch.len()
            )));
        }

        let client = self.get_client()?;
        let op_count = batch.len();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for op in batch.into_ops() {
            match op {
                WriteOp::Set { path, data } => {
                    let parent = Self::doc_parent(client, &path)?;
                    client
                        .fluent()
                        .update()
                        .in_col(path.collection_name())
                        .document_id(path.id())
                        .parent(&parent)
                        .object(&data)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add write of {} to transaction: {}",
                                path, e
                            ))
                        })?;
                }
                WriteOp::Merge { path, fields } => {
                    let parent = Self::doc_parent(client, &path)?;
                    let mask: Vec<String> = fields.keys().cloned().collect();
                    client
                        .fluent()
                        .update()
                        .fields(mask)
                        .in_col(path.collection_name())
                        .document_id(path.id())
                        .parent(&parent)
                        .object(&Value::Object(fields))
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add merge into {} to transaction: {}",
                                path, e
                            ))
                        })?;
                }
                WriteOp::Delete { path, must_exist } => {
                    let parent = Self::doc_parent(client, &path)?;
                    let delete = client
                        .fluent()
                        .delete()
                        .from(path.collection_name())
                        .document_id(path.id())
                        .parent(&parent);
                    let delete = if must_exist {
                        delete.precondition(FirestoreWritePrecondition::Exists(true))
                    } else {
                        delete
                    };
                    delete.add_to_transaction(&mut transaction).map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion of {} to transaction: {}",
                            path, e
                        ))
                    })?;
                }
            }
        }

        transaction.commit().await.map_err(map_commit_error)?;

        tracing::debug!(ops = op_count, "Committed write batch");
        Ok(())
    }
}
