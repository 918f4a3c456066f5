//! Drift detection between the cached intended item order and the
//! backend's confirmed order.
//!
//! Add-item and remove-item requests are parallelizable, so the backend
//! may finalize them in a different order than they were submitted.
//! After each one's success phase the confirmed list is compared against
//! the cache's intended list:
//!
//! - equal counts, equal sequence: adopt the confirmed list (picks up
//!   server-assigned uids and timestamps)
//! - equal counts, different sequence: issue a corrective squashable
//!   reorder targeting the *intended* order, rather than trusting the
//!   server's incidental order
//! - different counts: a sibling mutation is still outstanding;
//!   reconciliation is deferred to its success phase

use crate::types::{Collection, CollectionItem, CollectionSnapshot, ContentId};

/// Relation between the confirmed and intended item sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftCheck {
    /// Same length, same sequence.
    InSync,
    /// Same length, different sequence: order has drifted.
    OrderDrift,
    /// Different lengths: a sibling add/remove is still in flight.
    CountMismatch,
}

/// Compare the confirmed order against the intended order.
pub fn check_drift(confirmed: &[ContentId], intended: &[ContentId]) -> DriftCheck {
    if confirmed.len() != intended.len() {
        DriftCheck::CountMismatch
    } else if confirmed == intended {
        DriftCheck::InSync
    } else {
        DriftCheck::OrderDrift
    }
}

/// Adopt a confirmed snapshot's items when they match the cached intent,
/// pulling in server-assigned uids and timestamps.
pub(crate) fn adopt_confirmed_items(entity: &mut Collection, snapshot: &CollectionSnapshot) {
    if entity.content_ids() == snapshot.content_ids() {
        entity.items = snapshot.cache_items();
    }
}

/// Rearrange `items` to follow `target` content-id order, preserving each
/// slot's metadata. Duplicate ids match first-available; items absent
/// from `target` keep their relative order at the tail.
pub fn reorder_items(items: Vec<CollectionItem>, target: &[ContentId]) -> Vec<CollectionItem> {
    let mut remaining = items;
    let mut ordered = Vec::with_capacity(remaining.len());
    for content_id in target {
        if let Some(position) = remaining
            .iter()
            .position(|item| item.content_id == *content_id)
        {
            ordered.push(remaining.remove(position));
        }
    }
    ordered.extend(remaining);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_check_drift_in_sync() {
        assert_eq!(check_drift(&[1, 2, 3], &[1, 2, 3]), DriftCheck::InSync);
    }

    #[test]
    fn test_check_drift_order() {
        assert_eq!(check_drift(&[2, 1, 3], &[1, 2, 3]), DriftCheck::OrderDrift);
    }

    #[test]
    fn test_check_drift_count() {
        assert_eq!(check_drift(&[1, 2], &[1, 2, 3]), DriftCheck::CountMismatch);
        assert_eq!(check_drift(&[1, 2, 3, 4], &[1, 2, 3]), DriftCheck::CountMismatch);
    }

    #[test]
    fn test_reorder_items_preserves_metadata() {
        let mut items = vec![
            CollectionItem::optimistic(1),
            CollectionItem::optimistic(2),
            CollectionItem::optimistic(3),
        ];
        items[1].uid = Some("slot-2".to_string());

        let ordered = reorder_items(items, &[2, 3, 1]);
        assert_eq!(
            ordered.iter().map(|i| i.content_id).collect::<Vec<_>>(),
            vec![2, 3, 1]
        );
        assert_eq!(ordered[0].uid.as_deref(), Some("slot-2"));
    }

    #[test]
    fn test_reorder_items_duplicates_and_leftovers() {
        let items = vec![
            CollectionItem::optimistic(1),
            CollectionItem::optimistic(1),
            CollectionItem::optimistic(2),
            CollectionItem::optimistic(9),
        ];
        // Target names one copy of 1; the other copy and 9 trail behind.
        let ordered = reorder_items(items, &[2, 1]);
        assert_eq!(
            ordered.iter().map(|i| i.content_id).collect::<Vec<_>>(),
            vec![2, 1, 1, 9]
        );
    }

    #[test]
    fn test_adopt_confirmed_items_requires_matching_order() {
        let mut entity = Collection {
            id: "c1".to_string(),
            owner_id: "u1".to_string(),
            name: "mix".to_string(),
            description: None,
            is_private: true,
            is_publishing: false,
            marked_deleted: false,
            moved_to: None,
            items: vec![CollectionItem::optimistic(1), CollectionItem::optimistic(2)],
        };
        let snapshot = CollectionSnapshot {
            id: "c1".to_string(),
            owner_id: "u1".to_string(),
            name: "mix".to_string(),
            description: None,
            is_private: true,
            items: vec![
                crate::types::SnapshotItem {
                    content_id: 1,
                    time: Utc::now(),
                    uid: Some("a".to_string()),
                },
                crate::types::SnapshotItem {
                    content_id: 2,
                    time: Utc::now(),
                    uid: Some("b".to_string()),
                },
            ],
        };

        adopt_confirmed_items(&mut entity, &snapshot);
        assert_eq!(entity.items[0].uid.as_deref(), Some("a"));

        // A drifted snapshot is not adopted
        let mut drifted = entity.clone();
        drifted.items = vec![CollectionItem::optimistic(2), CollectionItem::optimistic(1)];
        adopt_confirmed_items(&mut drifted, &snapshot);
        assert_eq!(drifted.content_ids(), vec![2, 1]);
    }
}
