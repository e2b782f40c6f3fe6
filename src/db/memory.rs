// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory document store for local development and tests.

use crate::db::paths::{CollectionPath, DocPath};
use crate::db::store::{Document, DocumentStore, WriteBatch, WriteOp};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Document store backed by an ordered map of full paths.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    /// Full paths of every stored document, in order.
    pub async fn paths(&self) -> Vec<String> {
        self.docs.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Value>> {
        Ok(self.docs.read().await.get(&path.to_string()).cloned())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        let prefix = format!("{collection}/");
        let docs = self.docs.read().await;
        Ok(docs
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, data)| {
                let id = &key[prefix.len()..];
                (!id.contains('/')).then(|| Document {
                    id: id.to_string(),
                    data: data.clone(),
                })
            })
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut docs = self.docs.write().await;

        // Check every precondition against the pre-batch state, then apply.
        for op in batch.ops() {
            if let WriteOp::Delete {
                path,
                must_exist: true,
            } = op
            {
                if !docs.contains_key(&path.to_string()) {
                    return Err(AppError::Conflict(format!(
                        "{} ({}) no longer exists",
                        path.collection_name(),
                        path.id()
                    )));
                }
            }
        }

        for op in batch.into_ops() {
            match op {
                WriteOp::Set { path, data } => {
                    docs.insert(path.to_string(), data);
                }
                WriteOp::Merge { path, fields } => {
                    let doc = docs
                        .entry(path.to_string())
                        .or_insert_with(|| Value::Object(Default::default()));
                    match doc {
                        Value::Object(existing) => existing.extend(fields),
                        other => *other = Value::Object(fields),
                    }
                }
                WriteOp::Delete { path, .. } => {
                    docs.remove(&path.to_string());
                }
            }
        }

        Ok(())
    }
}
