//! Core Data Types
//!
//! Defines the collection data model shared across the cache, queue, and
//! reconciler, plus the wire-level shapes returned by the remote write
//! service.
//!
//! # Identity
//!
//! A collection id is a plain string. Optimistically created collections
//! carry a temporary id (`temp_<uuid>`) until the backend confirms the
//! create and assigns the real id; the cache then tombstones the temp
//! entry with a `moved_to` pointer (see [`crate::cache`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Collection identifier (temporary or backend-assigned).
pub type CollectionId = String;

/// Content identifier referenced by collection items.
pub type ContentId = u64;

/// Prefix used for optimistic collection ids awaiting confirmation.
const TEMP_ID_PREFIX: &str = "temp_";

/// Prefix for confirmation-queue keys that serialize collection mutations.
const COLLECTION_KEY_PREFIX: &str = "COLLECTION:";

/// Generate a fresh temporary collection id.
pub fn temp_collection_id() -> CollectionId {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

/// Whether an id is a temporary (not yet confirmed) collection id.
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Confirmation-queue key for a collection id.
pub fn collection_key(id: &str) -> String {
    format!("{}{}", COLLECTION_KEY_PREFIX, id)
}

/// Extract the collection id from a confirmation-queue key.
///
/// Keys not produced by [`collection_key`] are returned unchanged so a
/// caller never loses the identity it was handed.
pub fn collection_id_from_key(key: &str) -> &str {
    key.strip_prefix(COLLECTION_KEY_PREFIX).unwrap_or(key)
}

/// Reference to the backend transaction that carried a write.
///
/// The finality checker polls for the presence of this block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRef {
    /// Block hash the write was included in.
    pub hash: String,
    /// Block number the write was included in.
    pub number: u64,
}

/// Result of a successful remote write call, prior to finality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteReceipt {
    /// Transaction reference to await finality on.
    pub tx_ref: TxRef,
    /// Backend-assigned id, present for creates.
    #[serde(default)]
    pub result_id: Option<String>,
}

/// One slot in a collection's ordered item sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    /// Content referenced by this slot.
    pub content_id: ContentId,
    /// When the item was added (client clock until confirmed).
    pub added_at: DateTime<Utc>,
    /// Stable per-slot handle assigned by the backend.
    ///
    /// Absent on optimistic entries; filled in when a confirmed snapshot
    /// is adopted.
    #[serde(default)]
    pub uid: Option<String>,
}

impl CollectionItem {
    /// Build an optimistic item for `content_id` stamped with the client clock.
    pub fn optimistic(content_id: ContentId) -> Self {
        Self {
            content_id,
            added_at: Utc::now(),
            uid: None,
        }
    }
}

/// Cached collection entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Temporary or backend-assigned id.
    pub id: CollectionId,
    /// Owning user.
    pub owner_id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Hidden from other users until published.
    pub is_private: bool,
    /// A publish confirmation is in flight.
    #[serde(default)]
    pub is_publishing: bool,
    /// Optimistically deleted, awaiting delete confirmation.
    #[serde(default)]
    pub marked_deleted: bool,
    /// Identity-indirection pointer; once set this entry is a tombstone
    /// redirecting readers to its successor id.
    #[serde(default)]
    pub moved_to: Option<CollectionId>,
    /// Ordered item sequence. Order is significant.
    pub items: Vec<CollectionItem>,
}

impl Collection {
    /// The item order as a content-id sequence.
    pub fn content_ids(&self) -> Vec<ContentId> {
        self.items.iter().map(|item| item.content_id).collect()
    }
}

/// Authoritative collection snapshot returned by backend reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub id: CollectionId,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_private: bool,
    pub items: Vec<SnapshotItem>,
}

/// Confirmed item entry inside a [`CollectionSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub content_id: ContentId,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub uid: Option<String>,
}

impl CollectionSnapshot {
    /// The confirmed item order as a content-id sequence.
    pub fn content_ids(&self) -> Vec<ContentId> {
        self.items.iter().map(|item| item.content_id).collect()
    }

    /// Convert the confirmed items into cacheable [`CollectionItem`]s.
    pub fn cache_items(&self) -> Vec<CollectionItem> {
        self.items
            .iter()
            .map(|item| CollectionItem {
                content_id: item.content_id,
                added_at: item.time,
                uid: item.uid.clone(),
            })
            .collect()
    }
}

/// Parameters for creating a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCollection {
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_private: bool,
    /// Items to seed the collection with, in order.
    #[serde(default)]
    pub initial_content_ids: Vec<ContentId>,
}

/// Metadata changes for an edit mutation. `None` fields are untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

/// Result of the server-side item-list validation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemValidation {
    /// Whether every item reference in the remote list is resolvable.
    pub is_valid: bool,
    /// Content ids the backend could not resolve.
    #[serde(default)]
    pub invalid_content_ids: Vec<ContentId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_id_roundtrip() {
        let id = temp_collection_id();
        assert!(is_temp_id(&id));
        assert!(!is_temp_id("12345"));
    }

    #[test]
    fn test_collection_key_roundtrip() {
        let key = collection_key("abc");
        assert_eq!(key, "COLLECTION:abc");
        assert_eq!(collection_id_from_key(&key), "abc");
        // Unprefixed keys pass through unchanged
        assert_eq!(collection_id_from_key("abc"), "abc");
    }

    #[test]
    fn test_content_id_order() {
        let collection = Collection {
            id: "c1".to_string(),
            owner_id: "u1".to_string(),
            name: "mix".to_string(),
            description: None,
            is_private: true,
            is_publishing: false,
            marked_deleted: false,
            moved_to: None,
            items: vec![
                CollectionItem::optimistic(3),
                CollectionItem::optimistic(1),
                CollectionItem::optimistic(2),
            ],
        };
        assert_eq!(collection.content_ids(), vec![3, 1, 2]);
    }

    #[test]
    fn test_snapshot_cache_items_preserve_uid() {
        let snapshot = CollectionSnapshot {
            id: "c1".to_string(),
            owner_id: "u1".to_string(),
            name: "mix".to_string(),
            description: None,
            is_private: false,
            items: vec![SnapshotItem {
                content_id: 7,
                time: Utc::now(),
                uid: Some("slot-7".to_string()),
            }],
        };
        let items = snapshot.cache_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].uid.as_deref(), Some("slot-7"));
    }
}
