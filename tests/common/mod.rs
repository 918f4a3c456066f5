//! Shared test helpers: an in-memory collection backend with
//! programmable failures and a call log, plus finality stubs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use xfcollect::error::RemoteError;
use xfcollect::finality::FinalityChecker;
use xfcollect::remote::CollectionService;
use xfcollect::types::{
    CollectionSnapshot, CollectionUpdate, ContentId, ItemValidation, NewCollection, SnapshotItem,
    TxRef, WriteReceipt,
};

/// Install a test log subscriber once so `RUST_LOG` surfaces engine logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Finality checker that confirms every write immediately.
pub struct InstantFinality;

#[async_trait]
impl FinalityChecker for InstantFinality {
    async fn await_finality(&self, _tx_ref: &TxRef, _timeout: Duration) -> bool {
        true
    }
}

/// Finality checker that never observes a block.
pub struct NeverFinality;

#[async_trait]
impl FinalityChecker for NeverFinality {
    async fn await_finality(&self, _tx_ref: &TxRef, _timeout: Duration) -> bool {
        false
    }
}

#[derive(Default)]
struct MockState {
    collections: HashMap<String, CollectionSnapshot>,
    next_id: u64,
    next_block: u64,
    next_uid: u64,
    calls: Vec<String>,
    fail_remove: u32,
    fail_set_order: u32,
    fail_delete: u32,
    fail_update: u32,
    fail_publish: u32,
    invalid_content_ids: Vec<ContentId>,
    latency: Option<Duration>,
}

impl MockState {
    fn receipt(&mut self, result_id: Option<String>) -> WriteReceipt {
        self.next_block += 1;
        WriteReceipt {
            tx_ref: TxRef {
                hash: format!("0x{:08x}", self.next_block),
                number: self.next_block,
            },
            result_id,
        }
    }

    fn item(&mut self, content_id: ContentId) -> SnapshotItem {
        self.next_uid += 1;
        SnapshotItem {
            content_id,
            time: chrono::Utc::now(),
            uid: Some(format!("uid-{}", self.next_uid)),
        }
    }
}

/// In-memory stand-in for the remote collection service.
#[derive(Default)]
pub struct MockCollectionService {
    state: Mutex<MockState>,
}

impl MockCollectionService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call made against the mock, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// The backend's confirmed item order for a collection.
    pub fn server_order(&self, collection_id: &str) -> Option<Vec<ContentId>> {
        let state = self.state.lock().unwrap();
        state
            .collections
            .get(collection_id)
            .map(CollectionSnapshot::content_ids)
    }

    /// Overwrite the backend's item list directly, bypassing the engine.
    pub fn set_server_items(&self, collection_id: &str, content_ids: &[ContentId]) {
        let mut state = self.state.lock().unwrap();
        let items: Vec<SnapshotItem> = content_ids.iter().map(|id| state.item(*id)).collect();
        if let Some(snapshot) = state.collections.get_mut(collection_id) {
            snapshot.items = items;
        }
    }

    pub fn fail_next_remove(&self, count: u32) {
        self.state.lock().unwrap().fail_remove = count;
    }

    pub fn fail_next_set_order(&self, count: u32) {
        self.state.lock().unwrap().fail_set_order = count;
    }

    pub fn fail_next_delete(&self, count: u32) {
        self.state.lock().unwrap().fail_delete = count;
    }

    pub fn fail_next_update(&self, count: u32) {
        self.state.lock().unwrap().fail_update = count;
    }

    pub fn fail_next_publish(&self, count: u32) {
        self.state.lock().unwrap().fail_publish = count;
    }

    /// Content ids the validation call will report as unresolvable.
    pub fn set_invalid_content_ids(&self, content_ids: Vec<ContentId>) {
        self.state.lock().unwrap().invalid_content_ids = content_ids;
    }

    /// Delay every mutation call, keeping requests observably in flight.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = Some(latency);
    }

    async fn pause(&self) {
        let latency = self.state.lock().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CollectionService for MockCollectionService {
    async fn create_collection(&self, params: &NewCollection) -> Result<WriteReceipt, RemoteError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("col_{}", state.next_id);
        state.calls.push(format!("create:{}", id));
        let items: Vec<SnapshotItem> = params
            .initial_content_ids
            .iter()
            .map(|content_id| state.item(*content_id))
            .collect();
        state.collections.insert(
            id.clone(),
            CollectionSnapshot {
                id: id.clone(),
                owner_id: params.owner_id.clone(),
                name: params.name.clone(),
                description: params.description.clone(),
                is_private: params.is_private,
                items,
            },
        );
        Ok(state.receipt(Some(id)))
    }

    async fn update_collection(
        &self,
        collection_id: &str,
        update: &CollectionUpdate,
    ) -> Result<WriteReceipt, RemoteError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update:{}", collection_id));
        if state.fail_update > 0 {
            state.fail_update -= 1;
            return Err(RemoteError::Rejected("update rejected".to_string()));
        }
        let Some(snapshot) = state.collections.get_mut(collection_id) else {
            return Err(RemoteError::NotFound(collection_id.to_string()));
        };
        if let Some(name) = &update.name {
            snapshot.name = name.clone();
        }
        if let Some(description) = &update.description {
            snapshot.description = Some(description.clone());
        }
        if let Some(is_private) = update.is_private {
            snapshot.is_private = is_private;
        }
        Ok(state.receipt(None))
    }

    async fn add_item(
        &self,
        collection_id: &str,
        content_id: ContentId,
    ) -> Result<WriteReceipt, RemoteError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("add:{}:{}", collection_id, content_id));
        let item = state.item(content_id);
        let Some(snapshot) = state.collections.get_mut(collection_id) else {
            return Err(RemoteError::NotFound(collection_id.to_string()));
        };
        snapshot.items.push(item);
        Ok(state.receipt(None))
    }

    async fn remove_item(
        &self,
        collection_id: &str,
        content_id: ContentId,
    ) -> Result<WriteReceipt, RemoteError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("remove:{}:{}", collection_id, content_id));
        if state.fail_remove > 0 {
            state.fail_remove -= 1;
            return Err(RemoteError::Rejected("remove rejected".to_string()));
        }
        let Some(snapshot) = state.collections.get_mut(collection_id) else {
            return Err(RemoteError::NotFound(collection_id.to_string()));
        };
        if let Some(position) = snapshot
            .items
            .iter()
            .position(|item| item.content_id == content_id)
        {
            snapshot.items.remove(position);
        }
        Ok(state.receipt(None))
    }

    async fn set_order(
        &self,
        collection_id: &str,
        content_ids: &[ContentId],
    ) -> Result<WriteReceipt, RemoteError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("set_order:{}:{:?}", collection_id, content_ids));
        if state.fail_set_order > 0 {
            state.fail_set_order -= 1;
            return Err(RemoteError::Rejected("order rejected".to_string()));
        }
        let items: Vec<SnapshotItem> = content_ids.iter().map(|id| state.item(*id)).collect();
        let Some(snapshot) = state.collections.get_mut(collection_id) else {
            return Err(RemoteError::NotFound(collection_id.to_string()));
        };
        snapshot.items = items;
        Ok(state.receipt(None))
    }

    async fn publish_collection(&self, collection_id: &str) -> Result<WriteReceipt, RemoteError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("publish:{}", collection_id));
        if state.fail_publish > 0 {
            state.fail_publish -= 1;
            return Err(RemoteError::Rejected("publish rejected".to_string()));
        }
        let Some(snapshot) = state.collections.get_mut(collection_id) else {
            return Err(RemoteError::NotFound(collection_id.to_string()));
        };
        snapshot.is_private = false;
        Ok(state.receipt(None))
    }

    async fn delete_collection(&self, collection_id: &str) -> Result<WriteReceipt, RemoteError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete:{}", collection_id));
        if state.fail_delete > 0 {
            state.fail_delete -= 1;
            return Err(RemoteError::Rejected("delete rejected".to_string()));
        }
        state.collections.remove(collection_id);
        Ok(state.receipt(None))
    }

    async fn fetch_collection(
        &self,
        collection_id: &str,
    ) -> Result<Option<CollectionSnapshot>, RemoteError> {
        let state = self.state.lock().unwrap();
        Ok(state.collections.get(collection_id).cloned())
    }

    async fn validate_items(&self, collection_id: &str) -> Result<ItemValidation, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("validate:{}", collection_id));
        let invalid = state.invalid_content_ids.clone();
        Ok(ItemValidation {
            is_valid: invalid.is_empty(),
            invalid_content_ids: invalid,
        })
    }

    async fn force_set_order(
        &self,
        collection_id: &str,
        content_ids: &[ContentId],
    ) -> Result<WriteReceipt, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("force_order:{}:{:?}", collection_id, content_ids));
        let items: Vec<SnapshotItem> = content_ids.iter().map(|id| state.item(*id)).collect();
        let Some(snapshot) = state.collections.get_mut(collection_id) else {
            return Err(RemoteError::NotFound(collection_id.to_string()));
        };
        snapshot.items = items;
        // Forced writes also clear the corruption they stripped.
        state.invalid_content_ids.clear();
        Ok(state.receipt(None))
    }
}

/// Wait for the engine's confirmation queue to drain.
pub async fn wait_idle(engine: &xfcollect::CollectionEngine) {
    for _ in 0..400 {
        if engine.is_idle().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("engine did not reach idle");
}
