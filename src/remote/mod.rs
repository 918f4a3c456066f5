//! # Remote Write Service Contract
//!
//! Trait-abstracted contract for the backend that accepts collection
//! mutations, exposes authoritative snapshots, and offers validation plus
//! privileged repair of corrupted item lists.
//!
//! Every mutation call returns a [`WriteReceipt`] whose transaction
//! reference is then awaited for finality; the engine never treats an
//! accepted call as durable on its own. The abstraction decouples the
//! reconciler from any specific transport, which is what lets the test
//! suite drive the full engine against an in-memory backend.

pub mod http;

pub use http::{HttpBlockObserver, HttpCollectionService};

use crate::error::RemoteError;
use crate::types::{
    CollectionSnapshot, CollectionUpdate, ContentId, ItemValidation, NewCollection, WriteReceipt,
};
use async_trait::async_trait;

/// Remote collection write service.
#[async_trait]
pub trait CollectionService: Send + Sync {
    /// Create a collection; the receipt carries the backend-assigned id.
    async fn create_collection(&self, params: &NewCollection) -> Result<WriteReceipt, RemoteError>;

    /// Overwrite collection metadata.
    async fn update_collection(
        &self,
        collection_id: &str,
        update: &CollectionUpdate,
    ) -> Result<WriteReceipt, RemoteError>;

    /// Append an item to the collection.
    async fn add_item(
        &self,
        collection_id: &str,
        content_id: ContentId,
    ) -> Result<WriteReceipt, RemoteError>;

    /// Remove one occurrence of an item from the collection.
    async fn remove_item(
        &self,
        collection_id: &str,
        content_id: ContentId,
    ) -> Result<WriteReceipt, RemoteError>;

    /// Rewrite the collection's item order.
    async fn set_order(
        &self,
        collection_id: &str,
        content_ids: &[ContentId],
    ) -> Result<WriteReceipt, RemoteError>;

    /// Make the collection public.
    async fn publish_collection(&self, collection_id: &str) -> Result<WriteReceipt, RemoteError>;

    /// Delete the collection.
    async fn delete_collection(&self, collection_id: &str) -> Result<WriteReceipt, RemoteError>;

    /// Read the authoritative collection snapshot, `None` when absent.
    async fn fetch_collection(
        &self,
        collection_id: &str,
    ) -> Result<Option<CollectionSnapshot>, RemoteError>;

    /// Ask the backend to validate the collection's item references.
    async fn validate_items(&self, collection_id: &str) -> Result<ItemValidation, RemoteError>;

    /// Privileged repair: write an explicit full item order unconditionally.
    async fn force_set_order(
        &self,
        collection_id: &str,
        content_ids: &[ContentId],
    ) -> Result<WriteReceipt, RemoteError>;
}
