//! Resource directory
//!
//! Owned, lock-protected registry of which addresses are registered under
//! which tag. Shared between actors as `Arc<Directory>`; every listing is a
//! snapshot taken under the lock, so readers never observe a half-applied
//! registration.

use sortie_core::Address;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Tag → addresses registry
#[derive(Debug, Default)]
pub struct Directory {
    tags: RwLock<BTreeMap<String, BTreeSet<Address>>>,
}

impl Directory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `address` under `tag` (idempotent)
    pub fn register(&self, address: Address, tag: impl Into<String>) {
        let tag = tag.into();
        let mut tags = self.tags.write().unwrap_or_else(PoisonError::into_inner);
        if tags.entry(tag.clone()).or_default().insert(address.clone()) {
            debug!(address = %address, tag = %tag, "Registered");
        }
    }

    /// Remove `address` from every tag
    pub fn unregister(&self, address: &Address) {
        let mut tags = self.tags.write().unwrap_or_else(PoisonError::into_inner);
        tags.retain(|_, members| {
            members.remove(address);
            !members.is_empty()
        });
    }

    /// Addresses registered under `tag`
    pub fn list_by_tag(&self, tag: &str) -> Vec<Address> {
        self.tags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every registered address, once
    pub fn list_all(&self) -> Vec<Address> {
        let tags = self.tags.read().unwrap_or_else(PoisonError::into_inner);
        let all: BTreeSet<&Address> = tags.values().flatten().collect();
        all.into_iter().cloned().collect()
    }

    /// Known tags
    pub fn tags(&self) -> Vec<String> {
        self.tags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
