//! HTTP bindings for the remote write service and block observer.
//!
//! JSON-over-HTTP implementation of [`CollectionService`] plus the block
//! presence endpoint the finality checker polls. Error mapping: transport
//! failures become [`RemoteError::Network`], 404 becomes
//! [`RemoteError::NotFound`], any other non-success status becomes
//! [`RemoteError::Rejected`] carrying the response body.

use crate::config::EngineConfig;
use crate::error::RemoteError;
use crate::finality::BlockObserver;
use crate::remote::CollectionService;
use crate::types::{
    CollectionSnapshot, CollectionUpdate, ContentId, ItemValidation, NewCollection, TxRef,
    WriteReceipt,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// HTTP client for the collection write service.
pub struct HttpCollectionService {
    client: Client,
    config: EngineConfig,
}

impl HttpCollectionService {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn check(&self, response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| status.to_string());
        if status == StatusCode::NOT_FOUND {
            Err(RemoteError::NotFound(body))
        } else {
            Err(RemoteError::Rejected(format!("{}: {}", status, body)))
        }
    }

    async fn receipt(&self, response: Response) -> Result<WriteReceipt, RemoteError> {
        let response = self.check(response).await?;
        response
            .json::<WriteReceipt>()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }
}

/// Body for order-rewriting calls.
#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    content_ids: &'a [ContentId],
}

/// Body for item add/remove calls.
#[derive(Debug, Serialize)]
struct ItemBody {
    content_id: ContentId,
}

#[async_trait]
impl CollectionService for HttpCollectionService {
    async fn create_collection(&self, params: &NewCollection) -> Result<WriteReceipt, RemoteError> {
        let response = self
            .client
            .post(self.config.api_url("/collections"))
            .json(params)
            .send()
            .await
            .map_err(RemoteError::network)?;
        self.receipt(response).await
    }

    async fn update_collection(
        &self,
        collection_id: &str,
        update: &CollectionUpdate,
    ) -> Result<WriteReceipt, RemoteError> {
        let response = self
            .client
            .patch(self.config.api_url(&format!("/collections/{collection_id}")))
            .json(update)
            .send()
            .await
            .map_err(RemoteError::network)?;
        self.receipt(response).await
    }

    async fn add_item(
        &self,
        collection_id: &str,
        content_id: ContentId,
    ) -> Result<WriteReceipt, RemoteError> {
        let response = self
            .client
            .post(self.config.api_url(&format!("/collections/{collection_id}/items")))
            .json(&ItemBody { content_id })
            .send()
            .await
            .map_err(RemoteError::network)?;
        self.receipt(response).await
    }

    async fn remove_item(
        &self,
        collection_id: &str,
        content_id: ContentId,
    ) -> Result<WriteReceipt, RemoteError> {
        let url = self
            .config
            .api_url(&format!("/collections/{collection_id}/items/{content_id}"));
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(RemoteError::network)?;
        self.receipt(response).await
    }

    async fn set_order(
        &self,
        collection_id: &str,
        content_ids: &[ContentId],
    ) -> Result<WriteReceipt, RemoteError> {
        let response = self
            .client
            .put(self.config.api_url(&format!("/collections/{collection_id}/order")))
            .json(&OrderBody { content_ids })
            .send()
            .await
            .map_err(RemoteError::network)?;
        self.receipt(response).await
    }

    async fn publish_collection(&self, collection_id: &str) -> Result<WriteReceipt, RemoteError> {
        let response = self
            .client
            .post(self.config.api_url(&format!("/collections/{collection_id}/publish")))
            .send()
            .await
            .map_err(RemoteError::network)?;
        self.receipt(response).await
    }

    async fn delete_collection(&self, collection_id: &str) -> Result<WriteReceipt, RemoteError> {
        let response = self
            .client
            .delete(self.config.api_url(&format!("/collections/{collection_id}")))
            .send()
            .await
            .map_err(RemoteError::network)?;
        self.receipt(response).await
    }

    async fn fetch_collection(
        &self,
        collection_id: &str,
    ) -> Result<Option<CollectionSnapshot>, RemoteError> {
        let response = self
            .client
            .get(self.config.api_url(&format!("/collections/{collection_id}")))
            .send()
            .await
            .map_err(RemoteError::network)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.check(response).await?;
        let snapshot = response
            .json::<CollectionSnapshot>()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        Ok(Some(snapshot))
    }

    async fn validate_items(&self, collection_id: &str) -> Result<ItemValidation, RemoteError> {
        let response = self
            .client
            .get(self.config.api_url(&format!("/collections/{collection_id}/validate")))
            .send()
            .await
            .map_err(RemoteError::network)?;
        let response = self.check(response).await?;
        response
            .json::<ItemValidation>()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    async fn force_set_order(
        &self,
        collection_id: &str,
        content_ids: &[ContentId],
    ) -> Result<WriteReceipt, RemoteError> {
        let url = self
            .config
            .api_url(&format!("/collections/{collection_id}/order/force"));
        let response = self
            .client
            .put(url)
            .json(&OrderBody { content_ids })
            .send()
            .await
            .map_err(RemoteError::network)?;
        self.receipt(response).await
    }
}

/// Block-presence response from the backend.
#[derive(Debug, Deserialize)]
struct BlockSeenResponse {
    seen: bool,
}

/// HTTP block observer backing [`crate::finality::PollingFinalityChecker`].
pub struct HttpBlockObserver {
    client: Client,
    config: EngineConfig,
}

impl HttpBlockObserver {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl BlockObserver for HttpBlockObserver {
    async fn block_seen(&self, tx_ref: &TxRef) -> Result<bool, RemoteError> {
        let url = self
            .config
            .api_url(&format!("/blocks/{}?number={}", tx_ref.hash, tx_ref.number));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(RemoteError::network)?;
        // The block simply not existing yet is a normal poll outcome.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(RemoteError::Rejected(response.status().to_string()));
        }
        let body = response
            .json::<BlockSeenResponse>()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        Ok(body.seen)
    }
}
