//! # Collection Mutation Reconciler
//!
//! Coordinates optimistic collection mutations against the confirmation
//! queue and the entity cache. Every mutation follows the same template:
//!
//! 1. **Optimistic phase**: mutate the cached collection immediately so
//!    the UI reflects intent before any network traffic
//! 2. **Submit** a confirmation request under the collection's key
//! 3. **Success phase**: re-fetch the authoritative collection and
//!    reconcile (identity migration, drift repair, confirmed adoption)
//! 4. **Fail phase**: emit a typed failure signal; roll back optimistic
//!    state for the mutation classes where partial application is unsafe
//!    to leave visible (create, edit, publish, delete)
//!
//! ## Key Components
//!
//! - `drift.rs`: intended-vs-confirmed order comparison and adoption
//! - `repair.rs`: bounded self-healing of corrupted remote item lists
//!
//! ## Usage
//!
//! ```rust,no_run
//! use xfcollect::config::EngineConfig;
//! use xfcollect::reconciler::CollectionEngine;
//! use xfcollect::types::NewCollection;
//!
//! # async fn example() {
//! let (engine, mut failures) = CollectionEngine::over_http(EngineConfig::default());
//!
//! let temp_id = engine
//!     .create_collection(NewCollection {
//!         owner_id: "user-1".to_string(),
//!         name: "road trip".to_string(),
//!         description: None,
//!         is_private: true,
//!         initial_content_ids: vec![],
//!     })
//!     .await;
//!
//! // The temp id is renderable immediately; outcomes arrive later via
//! // cache updates or the failure channel.
//! engine.add_item(&temp_id, 42).await;
//! if let Some(failure) = failures.recv().await {
//!     tracing::warn!("mutation failed: {:?}", failure);
//! }
//! # }
//! ```

pub mod drift;
pub(crate) mod repair;

use crate::cache::CollectionCache;
use crate::config::EngineConfig;
use crate::error::{ConfirmationFailure, MutationFailure, MutationKind};
use crate::finality::{FinalityChecker, PollingFinalityChecker};
use crate::queue::{ConfirmationQueue, ConfirmationRequest, OperationId, QueueStats};
use crate::remote::{CollectionService, HttpBlockObserver, HttpCollectionService};
use crate::types::{
    collection_id_from_key, collection_key, temp_collection_id, Collection, CollectionItem,
    CollectionUpdate, ContentId, NewCollection,
};
use repair::RepairOp;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

struct EngineInner {
    cache: CollectionCache,
    service: Arc<dyn CollectionService>,
    queue: ConfirmationQueue,
    failures: mpsc::UnboundedSender<MutationFailure>,
}

/// Collection mutation engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CollectionEngine {
    inner: Arc<EngineInner>,
}

impl CollectionEngine {
    /// Create an engine over an arbitrary service and finality checker.
    ///
    /// Returns the engine together with the receiver for mutation-failure
    /// signals.
    pub fn new(
        service: Arc<dyn CollectionService>,
        finality: Arc<dyn FinalityChecker>,
        config: EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<MutationFailure>) {
        let (failures, receiver) = mpsc::unbounded_channel();
        let queue = ConfirmationQueue::new(finality, config.finality_timeout);
        let engine = Self {
            inner: Arc::new(EngineInner {
                cache: CollectionCache::new(),
                service,
                queue,
                failures,
            }),
        };
        (engine, receiver)
    }

    /// Create an engine bound to the HTTP service and block observer.
    pub fn over_http(config: EngineConfig) -> (Self, mpsc::UnboundedReceiver<MutationFailure>) {
        let service = Arc::new(HttpCollectionService::new(config.clone()));
        let observer = Arc::new(HttpBlockObserver::new(config.clone()));
        let finality = Arc::new(PollingFinalityChecker::new(observer, config.poll_interval));
        Self::new(service, finality, config)
    }

    /// Read access to the entity cache for UI rendering.
    pub fn cache(&self) -> &CollectionCache {
        &self.inner.cache
    }

    /// Current confirmation-queue occupancy.
    pub async fn queue_stats(&self) -> QueueStats {
        self.inner.queue.stats().await
    }

    /// Whether no mutation is queued or in flight.
    pub async fn is_idle(&self) -> bool {
        self.inner.queue.is_idle().await
    }

    /// Create a collection optimistically under a temporary id.
    ///
    /// Returns the temp id; on confirmation the entity is re-inserted
    /// under the backend-assigned id and the temp entry becomes a
    /// redirecting tombstone, so the returned id stays valid for reads.
    pub async fn create_collection(&self, params: NewCollection) -> String {
        let temp_id = temp_collection_id();
        let owner_id = params.owner_id.clone();

        let collection = Collection {
            id: temp_id.clone(),
            owner_id: owner_id.clone(),
            name: params.name.clone(),
            description: params.description.clone(),
            is_private: params.is_private,
            is_publishing: false,
            marked_deleted: false,
            moved_to: None,
            items: params
                .initial_content_ids
                .iter()
                .map(|id| CollectionItem::optimistic(*id))
                .collect(),
        };
        self.inner.cache.upsert(vec![collection]).await;
        self.inner.cache.library_add(&owner_id, &temp_id).await;

        let perform_engine = self.clone();
        let perform_params = params.clone();
        let success_engine = self.clone();
        let success_temp = temp_id.clone();
        let success_owner = owner_id.clone();
        let fail_engine = self.clone();
        let fail_temp = temp_id.clone();

        let request = ConfirmationRequest::new(
            collection_key(&temp_id),
            OperationId::Create,
            move |_key| async move {
                perform_engine
                    .inner
                    .service
                    .create_collection(&perform_params)
                    .await
            },
        )
        .resolve_key(|receipt| {
            receipt
                .result_id
                .as_ref()
                .map(|real_id| collection_key(real_id))
        })
        .on_success(move |_key, receipt| async move {
            let Some(real_id) = receipt.result_id else {
                tracing::error!("create confirmed without a backend id");
                return;
            };
            success_engine
                .finish_create(&success_temp, &real_id, &success_owner)
                .await;
        })
        .on_fail(move |detail| async move {
            // Creation failed outright; drop the optimistic entity.
            let owner = fail_engine
                .inner
                .cache
                .get(&fail_temp)
                .await
                .map(|c| c.owner_id);
            fail_engine.inner.cache.remove(&[fail_temp.clone()]).await;
            if let Some(owner) = owner {
                fail_engine
                    .inner
                    .cache
                    .library_remove(&owner, &fail_temp)
                    .await;
            }
            fail_engine.signal_failure(
                MutationKind::Create,
                fail_temp,
                json!({ "name": params.name }),
                detail,
            );
        });

        self.inner.queue.submit(request).await;
        temp_id
    }

    /// Migrate a confirmed create from its temp id to the real id.
    async fn finish_create(&self, temp_id: &str, real_id: &str, owner_id: &str) {
        // The temp entry has accumulated every optimistic write made
        // while the create was in flight; carry them all to the real id.
        let Some(mut entity) = self.inner.cache.get(temp_id).await else {
            tracing::warn!("confirmed create {} has no cached temp entry", temp_id);
            return;
        };
        entity.id = real_id.to_string();

        match self.inner.service.fetch_collection(real_id).await {
            Ok(Some(snapshot)) => drift::adopt_confirmed_items(&mut entity, &snapshot),
            Ok(None) => tracing::warn!("confirmed collection {} not readable yet", real_id),
            Err(error) => tracing::warn!("post-create fetch of {} failed: {}", real_id, error),
        }

        self.inner.cache.upsert(vec![entity]).await;
        self.inner.cache.mark_moved(temp_id, real_id).await;
        self.inner
            .cache
            .library_replace(owner_id, temp_id, real_id)
            .await;
        tracing::info!("collection {} confirmed as {}", temp_id, real_id);
    }

    /// Edit collection metadata.
    pub async fn edit_collection(&self, collection_id: &str, update: CollectionUpdate) {
        let resolved = self.inner.cache.resolve_id(collection_id).await;
        let prior = self.inner.cache.get(&resolved).await;

        let applied = update.clone();
        self.inner
            .cache
            .update(&resolved, |collection| {
                if let Some(name) = applied.name {
                    collection.name = name;
                }
                if let Some(description) = applied.description {
                    collection.description = Some(description);
                }
                if let Some(is_private) = applied.is_private {
                    collection.is_private = is_private;
                }
            })
            .await;

        let perform_engine = self.clone();
        let perform_update = update.clone();
        let success_engine = self.clone();
        let fail_engine = self.clone();
        let fail_id = resolved.clone();
        let params = serde_json::to_value(&update).unwrap_or(serde_json::Value::Null);

        let request = ConfirmationRequest::new(
            collection_key(&resolved),
            OperationId::Edit,
            move |key| async move {
                let id = collection_id_from_key(&key).to_string();
                perform_engine
                    .inner
                    .service
                    .update_collection(&id, &perform_update)
                    .await
            },
        )
        .on_success(move |key, _receipt| async move {
            let id = collection_id_from_key(&key).to_string();
            success_engine.adopt_confirmed_metadata(&id).await;
        })
        .on_fail(move |detail| async move {
            if let Some(prior) = prior {
                fail_engine
                    .inner
                    .cache
                    .update(&fail_id, |collection| {
                        collection.name = prior.name;
                        collection.description = prior.description;
                        collection.is_private = prior.is_private;
                    })
                    .await;
            }
            fail_engine.signal_failure(MutationKind::Edit, fail_id, params, detail);
        });

        self.inner.queue.submit(request).await;
    }

    /// Append an item to a collection.
    pub async fn add_item(&self, collection_id: &str, content_id: ContentId) {
        let resolved = self.inner.cache.resolve_id(collection_id).await;
        self.inner
            .cache
            .update(&resolved, |collection| {
                collection.items.push(CollectionItem::optimistic(content_id));
            })
            .await;

        let perform_engine = self.clone();
        let success_engine = self.clone();
        let fail_engine = self.clone();
        let fail_id = resolved.clone();

        let request = ConfirmationRequest::new(
            collection_key(&resolved),
            OperationId::AddItem,
            move |key| async move {
                let id = collection_id_from_key(&key).to_string();
                perform_engine.inner.service.add_item(&id, content_id).await
            },
        )
        .parallelizable()
        .use_only_last_success()
        .on_success(move |key, _receipt| async move {
            let id = collection_id_from_key(&key).to_string();
            success_engine.reconcile_after_item_mutation(&id).await;
        })
        .on_fail(move |detail| async move {
            // Partial success is acceptable for item edits; the
            // optimistic entry stays until the next resync.
            fail_engine.signal_failure(
                MutationKind::AddItem,
                fail_id,
                json!({ "content_id": content_id }),
                detail,
            );
        });

        self.inner.queue.submit(request).await;
    }

    /// Remove one occurrence of an item from a collection.
    pub async fn remove_item(&self, collection_id: &str, content_id: ContentId) {
        let resolved = self.inner.cache.resolve_id(collection_id).await;
        // The pre-removal order is the repair intent if the remote list
        // turns out to be corrupted.
        let prior_order = self
            .inner
            .cache
            .get(&resolved)
            .await
            .map(|collection| collection.content_ids())
            .unwrap_or_default();

        self.inner
            .cache
            .update(&resolved, |collection| {
                if let Some(position) = collection
                    .items
                    .iter()
                    .position(|item| item.content_id == content_id)
                {
                    collection.items.remove(position);
                }
            })
            .await;

        let perform_engine = self.clone();
        let success_engine = self.clone();
        let fail_engine = self.clone();
        let fail_id = resolved.clone();

        let request = ConfirmationRequest::new(
            collection_key(&resolved),
            OperationId::RemoveItem,
            move |key| async move {
                let id = collection_id_from_key(&key).to_string();
                repair::run_with_repair(
                    perform_engine.inner.service.clone(),
                    id,
                    prior_order,
                    RepairOp::RemoveItem { content_id },
                )
                .await
            },
        )
        .parallelizable()
        .use_only_last_success()
        .on_success(move |key, _receipt| async move {
            let id = collection_id_from_key(&key).to_string();
            success_engine.reconcile_after_item_mutation(&id).await;
        })
        .on_fail(move |detail| async move {
            fail_engine.signal_failure(
                MutationKind::RemoveItem,
                fail_id,
                json!({ "content_id": content_id }),
                detail,
            );
        });

        self.inner.queue.submit(request).await;
    }

    /// Rewrite a collection's item order.
    pub async fn reorder(&self, collection_id: &str, target: Vec<ContentId>) {
        let resolved = self.inner.cache.resolve_id(collection_id).await;
        let optimistic_target = target.clone();
        self.inner
            .cache
            .update(&resolved, |collection| {
                let items = std::mem::take(&mut collection.items);
                collection.items = drift::reorder_items(items, &optimistic_target);
            })
            .await;

        self.submit_reorder_request(resolved, target).await;
    }

    /// Make a collection public.
    pub async fn publish_collection(&self, collection_id: &str) {
        let resolved = self.inner.cache.resolve_id(collection_id).await;
        self.inner
            .cache
            .update(&resolved, |collection| {
                collection.is_publishing = true;
            })
            .await;

        let perform_engine = self.clone();
        let success_engine = self.clone();
        let fail_engine = self.clone();
        let fail_id = resolved.clone();

        let request = ConfirmationRequest::new(
            collection_key(&resolved),
            OperationId::Publish,
            move |key| async move {
                let id = collection_id_from_key(&key).to_string();
                perform_engine.inner.service.publish_collection(&id).await
            },
        )
        .on_success(move |key, _receipt| async move {
            let id = collection_id_from_key(&key).to_string();
            success_engine
                .inner
                .cache
                .update(&id, |collection| {
                    collection.is_publishing = false;
                    collection.is_private = false;
                })
                .await;
        })
        .on_fail(move |detail| async move {
            fail_engine
                .inner
                .cache
                .update(&fail_id, |collection| {
                    collection.is_publishing = false;
                })
                .await;
            fail_engine.signal_failure(MutationKind::Publish, fail_id, json!({}), detail);
        });

        self.inner.queue.submit(request).await;
    }

    /// Delete a collection.
    pub async fn delete_collection(&self, collection_id: &str) {
        let resolved = self.inner.cache.resolve_id(collection_id).await;
        let prior = self.inner.cache.get(&resolved).await;
        let prior_library = match &prior {
            Some(collection) => Some((
                collection.owner_id.clone(),
                self.inner.cache.library(&collection.owner_id).await,
            )),
            None => None,
        };

        self.inner
            .cache
            .update(&resolved, |collection| {
                collection.marked_deleted = true;
            })
            .await;
        if let Some(collection) = &prior {
            self.inner
                .cache
                .library_remove(&collection.owner_id, &resolved)
                .await;
        }

        let perform_engine = self.clone();
        let success_engine = self.clone();
        let fail_engine = self.clone();
        let fail_id = resolved.clone();

        let request = ConfirmationRequest::new(
            collection_key(&resolved),
            OperationId::Delete,
            move |key| async move {
                let id = collection_id_from_key(&key).to_string();
                perform_engine.inner.service.delete_collection(&id).await
            },
        )
        .on_success(move |key, _receipt| async move {
            let id = collection_id_from_key(&key).to_string();
            success_engine.inner.cache.remove(&[id]).await;
        })
        .on_fail(move |detail| async move {
            // A failed delete restores every optimistic tombstone marker.
            if let Some(prior) = prior {
                tracing::info!("rolling back failed delete of {}", prior.id);
                fail_engine.inner.cache.upsert(vec![prior]).await;
            }
            if let Some((owner, library)) = prior_library {
                fail_engine.inner.cache.library_restore(&owner, library).await;
            }
            fail_engine.signal_failure(MutationKind::Delete, fail_id, json!({}), detail);
        });

        self.inner.queue.submit(request).await;
    }

    /// Drift reconciliation after a confirmed add/remove item mutation.
    async fn reconcile_after_item_mutation(&self, collection_id: &str) {
        let snapshot = match self.inner.service.fetch_collection(collection_id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::warn!("confirmed collection {} not readable", collection_id);
                return;
            }
            Err(error) => {
                tracing::warn!("reconciliation fetch of {} failed: {}", collection_id, error);
                return;
            }
        };
        let Some(cached) = self.inner.cache.get(collection_id).await else {
            return;
        };

        let intended = cached.content_ids();
        match drift::check_drift(&snapshot.content_ids(), &intended) {
            drift::DriftCheck::InSync => {
                self.inner
                    .cache
                    .update(collection_id, |collection| {
                        drift::adopt_confirmed_items(collection, &snapshot);
                    })
                    .await;
            }
            drift::DriftCheck::OrderDrift => {
                tracing::info!(
                    "collection {} drifted from intended order; issuing corrective reorder",
                    collection_id
                );
                self.submit_reorder_request(collection_id.to_string(), intended)
                    .await;
            }
            drift::DriftCheck::CountMismatch => {
                // A sibling add/remove is still outstanding; its own
                // success phase will reconcile.
                tracing::debug!("deferring reconciliation of {}: counts differ", collection_id);
            }
        }
    }

    /// Submit a squashable reorder request targeting `target`.
    ///
    /// Shared by the public reorder operation and corrective reorders
    /// from drift reconciliation; the latter skip the optimistic phase
    /// because the cache already holds the intended order.
    async fn submit_reorder_request(&self, collection_id: String, target: Vec<ContentId>) {
        let perform_engine = self.clone();
        let perform_target = target.clone();
        let success_engine = self.clone();
        let fail_engine = self.clone();
        let fail_id = collection_id.clone();
        let params = json!({ "target": target });

        let request = ConfirmationRequest::new(
            collection_key(&collection_id),
            OperationId::Reorder,
            move |key| async move {
                let id = collection_id_from_key(&key).to_string();
                repair::run_with_repair(
                    perform_engine.inner.service.clone(),
                    id,
                    perform_target,
                    RepairOp::SetOrder,
                )
                .await
            },
        )
        .squashable()
        .on_success(move |key, _receipt| async move {
            let id = collection_id_from_key(&key).to_string();
            success_engine.adopt_confirmed_order(&id).await;
        })
        .on_fail(move |detail| async move {
            fail_engine.signal_failure(MutationKind::Reorder, fail_id, params, detail);
        });

        self.inner.queue.submit(request).await;
    }

    /// Overwrite the cached order with the confirmed order.
    async fn adopt_confirmed_order(&self, collection_id: &str) {
        match self.inner.service.fetch_collection(collection_id).await {
            Ok(Some(snapshot)) => {
                self.inner
                    .cache
                    .update(collection_id, |collection| {
                        collection.items = snapshot.cache_items();
                    })
                    .await;
            }
            Ok(None) => tracing::warn!("confirmed collection {} not readable", collection_id),
            Err(error) => {
                tracing::warn!("post-reorder fetch of {} failed: {}", collection_id, error);
            }
        }
    }

    /// Overwrite cached metadata with the confirmed metadata, keeping
    /// optimistic items that the backend has not reflected yet.
    async fn adopt_confirmed_metadata(&self, collection_id: &str) {
        match self.inner.service.fetch_collection(collection_id).await {
            Ok(Some(snapshot)) => {
                self.inner
                    .cache
                    .update(collection_id, |collection| {
                        collection.name = snapshot.name.clone();
                        collection.description = snapshot.description.clone();
                        collection.is_private = snapshot.is_private;
                        drift::adopt_confirmed_items(collection, &snapshot);
                    })
                    .await;
            }
            Ok(None) => tracing::warn!("confirmed collection {} not readable", collection_id),
            Err(error) => {
                tracing::warn!("post-edit fetch of {} failed: {}", collection_id, error);
            }
        }
    }

    /// Emit a typed failure signal.
    fn signal_failure(
        &self,
        mutation: MutationKind,
        collection_id: String,
        params: serde_json::Value,
        detail: ConfirmationFailure,
    ) {
        tracing::error!(
            "{:?} mutation for {} failed (timed_out: {}): {}",
            mutation,
            collection_id,
            detail.timed_out,
            detail.message
        );
        let failure = MutationFailure {
            mutation,
            collection_id,
            params,
            error: detail.message,
            timed_out: detail.timed_out,
        };
        if self.inner.failures.send(failure).is_err() {
            tracing::debug!("failure receiver dropped; signal discarded");
        }
    }
}
