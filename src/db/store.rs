// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The document store seam.
//!
//! A transition builds one [`WriteBatch`] holding its whole fan-out and
//! commits it in a single call. Backends apply a batch atomically and in
//! order; a `must_exist` delete on a missing document fails the batch.
//! A merge writes only the named top-level fields and leaves the rest of
//! the document alone.

use crate::db::paths::{CollectionPath, DocPath};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Length of generated document IDs.
const DOCUMENT_ID_LEN: usize = 20;

/// Generate a fresh document ID.
pub fn new_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_ID_LEN)
        .map(char::from)
        .collect()
}

/// A document read from a collection listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// One write in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set { path: DocPath, data: Value },
    Merge { path: DocPath, fields: Map<String, Value> },
    Delete { path: DocPath, must_exist: bool },
}

impl WriteOp {
    pub fn path(&self) -> &DocPath {
        match self {
            WriteOp::Set { path, .. }
            | WriteOp::Merge { path, .. }
            | WriteOp::Delete { path, .. } => path,
        }
    }
}

/// Ordered set of writes applied as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `record` at `path`, replacing any existing document.
    pub fn set<T: Serialize>(&mut self, path: DocPath, record: &T) -> Result<&mut Self> {
        let data = serde_json::to_value(record)?;
        self.ops.push(WriteOp::Set { path, data });
        Ok(self)
    }

    /// Overwrite only the top-level fields of `fields`, creating the
    /// document if needed.
    pub fn merge(&mut self, path: DocPath, fields: Value) -> Result<&mut Self> {
        let Value::Object(fields) = fields else {
            return Err(AppError::Internal(anyhow::anyhow!("merge into {path} needs an object")));
        };
        if !fields.is_empty() {
            self.ops.push(WriteOp::Merge { path, fields });
        }
        Ok(self)
    }

    /// Write the same record to every projection.
    pub fn set_all<T: Serialize>(
        &mut self,
        paths: impl IntoIterator<Item = DocPath>,
        record: &T,
    ) -> Result<&mut Self> {
        let data = serde_json::to_value(record)?;
        for path in paths {
            self.ops.push(WriteOp::Set {
                path,
                data: data.clone(),
            });
        }
        Ok(self)
    }

    /// Delete a document that must currently exist.
    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            path,
            must_exist: true,
        });
        self
    }

    /// Delete a document if it exists.
    pub fn delete_if_exists(&mut self, path: DocPath) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            path,
            must_exist: false,
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Schemaless document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    async fn get(&self, path: &DocPath) -> Result<Option<Value>>;

    /// Read every document in a collection.
    async fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>>;

    /// Apply every op in `batch`, or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

impl dyn DocumentStore + '_ {
    /// Read and decode one document.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &DocPath) -> Result<Option<T>> {
        match self.get(path).await? {
            Some(value) => Ok(Some(decode(path, value)?)),
            None => Ok(None),
        }
    }

    /// Read a document that has to be there.
    pub async fn require<T: DeserializeOwned>(&self, path: &DocPath, what: &str) -> Result<T> {
        self.get_as(path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{what} ({})", path.id())))
    }

    pub async fn exists(&self, path: &DocPath) -> Result<bool> {
        Ok(self.get(path).await?.is_some())
    }

    /// List and decode a collection, keeping each document's ID.
    pub async fn list_as<T: DeserializeOwned>(
        &self,
        collection: &CollectionPath,
    ) -> Result<Vec<(String, T)>> {
        self.list(collection)
            .await?
            .into_iter()
            .map(|doc| {
                let record = decode(&collection.doc(&doc.id), doc.data)?;
                Ok((doc.id, record))
            })
            .collect()
    }
}

fn decode<T: DeserializeOwned>(path: &DocPath, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        tracing::error!(path = %path, error = %e, "Stored document has unexpected shape");
        AppError::Database(format!("Malformed document at {path}: {e}"))
    })
}
