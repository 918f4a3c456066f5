//! Bounded self-healing for corrupted remote item lists.
//!
//! Remove-item and reorder writes can fail because the backend's item
//! list contains references no client could have produced. The repair
//! path is strictly bounded: one validation read, one privileged forced
//! order write stripping the invalid references, and at most one retry of
//! the original call. When the forced write already achieves the intent
//! (the item being removed was itself invalid, or the cleaned order is
//! the target), the retry is skipped and the forced receipt stands.

use crate::error::RemoteError;
use crate::remote::CollectionService;
use crate::types::{ContentId, WriteReceipt};
use std::sync::Arc;

/// The direct call being repaired.
#[derive(Debug, Clone)]
pub(crate) enum RepairOp {
    /// `remove_item(content_id)`; `intended` is the pre-removal order.
    RemoveItem { content_id: ContentId },
    /// `set_order(intended)`.
    SetOrder,
}

/// Run `op` against the backend, self-healing a corrupted remote item
/// list with at most one forced-order repair and one retry.
pub(crate) async fn run_with_repair(
    service: Arc<dyn CollectionService>,
    collection_id: String,
    intended: Vec<ContentId>,
    op: RepairOp,
) -> Result<WriteReceipt, RemoteError> {
    let first = direct_call(&*service, &collection_id, &intended, &op).await;
    let first_err = match first {
        Ok(receipt) => return Ok(receipt),
        Err(error) => error,
    };

    let validation = service.validate_items(&collection_id).await?;
    if validation.is_valid {
        // The remote list is fine; the failure was not repairable.
        return Err(first_err);
    }

    tracing::warn!(
        "collection {} holds invalid item refs {:?}; forcing repaired order",
        collection_id,
        validation.invalid_content_ids
    );
    let repaired: Vec<ContentId> = intended
        .iter()
        .copied()
        .filter(|id| !validation.invalid_content_ids.contains(id))
        .collect();
    let forced = service.force_set_order(&collection_id, &repaired).await?;

    match op {
        RepairOp::RemoveItem { content_id }
            if validation.invalid_content_ids.contains(&content_id) =>
        {
            // The forced write already evicted the item.
            Ok(forced)
        }
        RepairOp::RemoveItem { content_id } => {
            service.remove_item(&collection_id, content_id).await
        }
        RepairOp::SetOrder => Ok(forced),
    }
}

async fn direct_call(
    service: &dyn CollectionService,
    collection_id: &str,
    intended: &[ContentId],
    op: &RepairOp,
) -> Result<WriteReceipt, RemoteError> {
    match op {
        RepairOp::RemoveItem { content_id } => {
            service.remove_item(collection_id, *content_id).await
        }
        RepairOp::SetOrder => service.set_order(collection_id, intended).await,
    }
}
