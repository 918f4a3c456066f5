//! # Collection Cache & Identity Indirection
//!
//! Normalized store for collection entities with transparent identity
//! redirection. Optimistically created collections enter the cache under a
//! temporary id; once the backend confirms the create, the entry is
//! re-inserted under the real id and the temp entry becomes a tombstone
//! whose `moved_to` pointer redirects readers to its successor.
//!
//! ## Features
//!
//! - **Transparent redirects**: `get` and `resolve_id` follow `moved_to`
//!   chains so callers never observe the migration
//! - **Library membership**: per-user ordered list of owned collection
//!   ids, kept consistent through create/delete and their rollbacks
//! - **Replace or merge upserts**: matching the consumed contract of the
//!   normalized entity store
//!
//! ## Usage
//!
//! ```rust,no_run
//! use xfcollect::cache::CollectionCache;
//!
//! # async fn example(collection: xfcollect::types::Collection) {
//! let cache = CollectionCache::new();
//! cache.upsert(vec![collection.clone()]).await;
//!
//! // Reads resolve moved_to pointers transparently
//! let entity = cache.get(&collection.id).await;
//! # }
//! ```

use crate::types::{Collection, CollectionId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Bound on redirect-chain traversal; a longer chain indicates a cycle.
const MAX_REDIRECT_HOPS: usize = 8;

/// Normalized collection store with identity indirection.
#[derive(Debug, Default)]
pub struct CollectionCache {
    /// Collections keyed by id (temp or real).
    collections: RwLock<HashMap<CollectionId, Collection>>,
    /// Per-user ordered collection-id membership.
    libraries: RwLock<HashMap<String, Vec<CollectionId>>>,
}

impl CollectionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an id through `moved_to` pointers to its current identity.
    pub async fn resolve_id(&self, id: &str) -> CollectionId {
        let collections = self.collections.read().await;
        let mut current = id.to_string();
        for _ in 0..MAX_REDIRECT_HOPS {
            match collections.get(&current).and_then(|c| c.moved_to.clone()) {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// Read a collection, following redirects.
    pub async fn get(&self, id: &str) -> Option<Collection> {
        let resolved = self.resolve_id(id).await;
        let collections = self.collections.read().await;
        collections.get(&resolved).cloned()
    }

    /// Insert or overwrite collections under their own ids.
    pub async fn upsert(&self, entries: Vec<Collection>) {
        let mut collections = self.collections.write().await;
        for entry in entries {
            collections.insert(entry.id.clone(), entry);
        }
    }

    /// Remove collections from the cache entirely.
    pub async fn remove(&self, ids: &[CollectionId]) {
        let mut collections = self.collections.write().await;
        for id in ids {
            collections.remove(id);
        }
    }

    /// Apply an in-place mutation to the entity `id` resolves to.
    ///
    /// Returns `false` when no entity is cached under the resolved id.
    pub async fn update<F>(&self, id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut Collection),
    {
        let resolved = self.resolve_id(id).await;
        let mut collections = self.collections.write().await;
        match collections.get_mut(&resolved) {
            Some(entity) => {
                mutate(entity);
                true
            }
            None => false,
        }
    }

    /// Tombstone `from`, redirecting readers to `to`.
    pub async fn mark_moved(&self, from: &str, to: &str) {
        let mut collections = self.collections.write().await;
        if let Some(entity) = collections.get_mut(from) {
            entity.moved_to = Some(to.to_string());
        }
    }

    /// Ordered collection membership for a user.
    pub async fn library(&self, user_id: &str) -> Vec<CollectionId> {
        let libraries = self.libraries.read().await;
        libraries.get(user_id).cloned().unwrap_or_default()
    }

    /// Append a collection id to a user's library if absent.
    pub async fn library_add(&self, user_id: &str, collection_id: &str) {
        let mut libraries = self.libraries.write().await;
        let entries = libraries.entry(user_id.to_string()).or_default();
        if !entries.iter().any(|id| id == collection_id) {
            entries.push(collection_id.to_string());
        }
    }

    /// Remove a collection id from a user's library.
    pub async fn library_remove(&self, user_id: &str, collection_id: &str) {
        let mut libraries = self.libraries.write().await;
        if let Some(entries) = libraries.get_mut(user_id) {
            entries.retain(|id| id != collection_id);
        }
    }

    /// Replace `old_id` with `new_id` in a user's library, keeping its slot.
    pub async fn library_replace(&self, user_id: &str, old_id: &str, new_id: &str) {
        let mut libraries = self.libraries.write().await;
        if let Some(entries) = libraries.get_mut(user_id) {
            for entry in entries.iter_mut() {
                if entry == old_id {
                    *entry = new_id.to_string();
                }
            }
        }
    }

    /// Restore a user's library to a previous membership list.
    pub async fn library_restore(&self, user_id: &str, entries: Vec<CollectionId>) {
        let mut libraries = self.libraries.write().await;
        libraries.insert(user_id.to_string(), entries);
    }
}
