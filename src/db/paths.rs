// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed document and collection paths.
//!
//! Every path is rooted at `partitions/{partition}` so live and test data
//! never mix.

use crate::db::collections;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level data partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    #[serde(rename = "default")]
    Live,
    Test,
}

impl Partition {
    /// Select the partition from the `test` / `sandbox` query flags.
    pub fn from_flags(test: bool, sandbox: bool) -> Self {
        if test || sandbox {
            Partition::Test
        } else {
            Partition::Live
        }
    }

    pub fn is_test(self) -> bool {
        self == Partition::Test
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Live => "default",
            Partition::Test => "test",
        }
    }

    fn root(self) -> DocPath {
        DocPath {
            segments: vec![(collections::PARTITIONS.to_string(), self.as_str().to_string())],
        }
    }

    /// `partitions/{p}/users/{uid}`
    pub fn user(self, uid: &str) -> DocPath {
        self.root().child(collections::USERS, uid)
    }

    /// `partitions/{p}/locations/{id}`
    pub fn location(self, id: &str) -> DocPath {
        self.root().child(collections::LOCATIONS, id)
    }

    /// `partitions/{p}/stripeCustomers/{uid}`
    pub fn gateway_customer(self, uid: &str) -> DocPath {
        self.root().child(collections::GATEWAY_CUSTOMERS, uid)
    }

    /// `partitions/{p}/stripeAccounts/{uid}`
    pub fn gateway_account(self, uid: &str) -> DocPath {
        self.root().child(collections::GATEWAY_ACCOUNTS, uid)
    }

    /// `partitions/{p}/locations`
    pub fn locations(self) -> CollectionPath {
        self.root().collection(collections::LOCATIONS)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path to a single document: alternating collection / id segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    segments: Vec<(String, String)>,
}

impl DocPath {
    /// Path of a document in a sub-collection of this document.
    pub fn child(&self, collection: &str, id: &str) -> DocPath {
        let mut segments = self.segments.clone();
        segments.push((collection.to_string(), id.to_string()));
        DocPath { segments }
    }

    /// A sub-collection of this document.
    pub fn collection(&self, name: &str) -> CollectionPath {
        CollectionPath {
            parent: self.clone(),
            name: name.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        self.segments.last().map(|(_, id)| id.as_str()).unwrap_or_default()
    }

    /// Name of the collection this document lives in.
    pub fn collection_name(&self) -> &str {
        self.segments.last().map(|(c, _)| c.as_str()).unwrap_or_default()
    }

    /// Path of the document owning this document's collection, if any.
    pub fn parent(&self) -> Option<DocPath> {
        (self.segments.len() > 1).then(|| DocPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn segments(&self) -> &[(String, String)] {
        &self.segments
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (collection, id) in &self.segments {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{collection}/{id}")?;
            first = false;
        }
        Ok(())
    }
}

/// Path to a collection under a parent document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    parent: DocPath,
    name: String,
}

impl CollectionPath {
    pub fn doc(&self, id: &str) -> DocPath {
        self.parent.child(&self.name, id)
    }

    pub fn parent(&self) -> &DocPath {
        &self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent, self.name)
    }
}
