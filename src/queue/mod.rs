//! # Confirmation Queue
//!
//! Owns one FIFO of confirmation requests per entity key and drives each
//! request through its three-phase lifecycle: remote write, finality
//! wait, then the success or fail phase supplied by the submitter.
//!
//! ## Scheduling
//!
//! - Requests for a key always *start* in submission order; parallelism
//!   means overlap, never reordering. The front request starts when the
//!   key has nothing in flight, or when both it and everything in flight
//!   are parallelizable.
//! - A submitted request supersedes a queued-but-unstarted request with
//!   the same `(key, operation_id)` when either side is squashable; the
//!   superseded request is dropped without running.
//! - With `use_only_last_success`, a completing request skips its success
//!   phase when a later-submitted request of the same `(key, operation_id)`
//!   has already run its own, so an in-flight straggler cannot overwrite
//!   shared state with stale data.
//! - A request's `resolve_key` hook can migrate the whole group to a new
//!   key (temporary id confirmed as a real id); queued requests drain
//!   under the new key and later submissions against the old key follow
//!   the alias.
//!
//! Outcomes surface exclusively through each request's own phases; the
//! queue never reports back to the submitter directly.

pub mod request;

pub use request::{ConfirmationRequest, OperationId};

use crate::error::ConfirmationFailure;
use crate::finality::FinalityChecker;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Bound on alias-chain traversal; longer chains indicate a cycle.
const MAX_ALIAS_HOPS: usize = 8;

/// Snapshot of queue occupancy, for progress indicators and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Requests queued but not started.
    pub pending: usize,
    /// Requests currently executing their lifecycle.
    pub in_flight: usize,
}

/// A pending request together with its enqueue sequence number.
struct QueuedRequest {
    seq: u64,
    request: ConfirmationRequest,
}

/// Bookkeeping for one executing request.
struct InFlight {
    seq: u64,
    parallelizable: bool,
}

/// Per-key scheduling state.
#[derive(Default)]
struct Group {
    pending: VecDeque<QueuedRequest>,
    in_flight: Vec<InFlight>,
    /// Highest enqueue sequence whose success phase ran, per operation.
    last_success_seq: HashMap<OperationId, u64>,
}

impl Group {
    fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

#[derive(Default)]
struct QueueState {
    groups: HashMap<String, Group>,
    /// Old key → successor key mappings installed by identity migration.
    aliases: HashMap<String, String>,
    next_seq: u64,
}

impl QueueState {
    /// Follow alias chains to a key's current identity.
    fn resolve_key(&self, key: &str) -> String {
        let mut current = key.to_string();
        for _ in 0..MAX_ALIAS_HOPS {
            match self.aliases.get(&current) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    finality: Arc<dyn FinalityChecker>,
    default_timeout: Duration,
}

/// Per-entity confirmation queue. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConfirmationQueue {
    inner: Arc<QueueInner>,
}

impl ConfirmationQueue {
    /// Create a queue confirming writes through `finality`.
    ///
    /// `default_timeout` bounds the finality wait of requests that do not
    /// carry their own budget.
    pub fn new(finality: Arc<dyn FinalityChecker>, default_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                finality,
                default_timeout,
            }),
        }
    }

    /// Enqueue a request. Outcomes surface through the request's own
    /// success/fail phases.
    pub async fn submit(&self, request: ConfirmationRequest) {
        let mut state = self.inner.state.lock().await;
        let key = state.resolve_key(&request.key);
        let seq = state.next_seq;
        state.next_seq += 1;

        let group = state.groups.entry(key.clone()).or_default();
        let superseded = group.pending.iter().position(|queued| {
            queued.request.operation_id == request.operation_id
                && (queued.request.squashable || request.squashable)
        });
        match superseded {
            Some(position) => {
                tracing::debug!(
                    "squashing queued {:?} request for {}",
                    request.operation_id,
                    key
                );
                group.pending[position] = QueuedRequest { seq, request };
            }
            None => group.pending.push_back(QueuedRequest { seq, request }),
        }

        self.pump_locked(&mut state, &key);
    }

    /// Current queue occupancy across all keys.
    pub async fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock().await;
        let mut stats = QueueStats {
            pending: 0,
            in_flight: 0,
        };
        for group in state.groups.values() {
            stats.pending += group.pending.len();
            stats.in_flight += group.in_flight.len();
        }
        stats
    }

    /// Whether no request is queued or in flight anywhere.
    pub async fn is_idle(&self) -> bool {
        let state = self.inner.state.lock().await;
        state.groups.values().all(Group::is_empty)
    }

    /// Start every eligible request at the front of `key`'s queue.
    fn pump_locked(&self, state: &mut QueueState, key: &str) {
        let Some(group) = state.groups.get_mut(key) else {
            return;
        };
        loop {
            let startable = match group.pending.front() {
                Some(front) => {
                    group.in_flight.is_empty()
                        || (front.request.parallelizable
                            && group.in_flight.iter().all(|flight| flight.parallelizable))
                }
                None => false,
            };
            if !startable {
                break;
            }
            let Some(queued) = group.pending.pop_front() else {
                break;
            };
            group.in_flight.push(InFlight {
                seq: queued.seq,
                parallelizable: queued.request.parallelizable,
            });
            let queue = self.clone();
            let key = key.to_string();
            tokio::spawn(queue.run_request(key, queued));
        }
    }

    /// Drive one request through perform → finality → success/fail.
    async fn run_request(self, submitted_key: String, queued: QueuedRequest) {
        let QueuedRequest { seq, request } = queued;
        let ConfirmationRequest {
            operation_id,
            use_only_last_success,
            timeout,
            perform,
            on_success,
            on_fail,
            resolve_key,
            ..
        } = request;

        let resolved = {
            let state = self.inner.state.lock().await;
            state.resolve_key(&submitted_key)
        };
        tracing::debug!("performing {:?} for {}", operation_id, resolved);

        match perform(resolved.clone()).await {
            Ok(receipt) => {
                let mut current_key = resolved;
                if let Some(resolver) = resolve_key {
                    if let Some(new_key) = resolver(&receipt) {
                        if new_key != current_key {
                            self.migrate_key(&current_key, &new_key).await;
                            current_key = new_key;
                        }
                    }
                }

                let budget = timeout.unwrap_or(self.inner.default_timeout);
                let confirmed = self
                    .inner
                    .finality
                    .await_finality(&receipt.tx_ref, budget)
                    .await;
                if confirmed {
                    let run_success = if use_only_last_success {
                        let mut state = self.inner.state.lock().await;
                        let group_key = state.resolve_key(&current_key);
                        let group = state.groups.entry(group_key).or_default();
                        let last = group.last_success_seq.get(&operation_id).copied();
                        if last.is_some_and(|last| last > seq) {
                            false
                        } else {
                            group.last_success_seq.insert(operation_id, seq);
                            true
                        }
                    } else {
                        true
                    };
                    if run_success {
                        on_success(current_key, receipt).await;
                    } else {
                        tracing::debug!(
                            "suppressing stale {:?} success for {}",
                            operation_id,
                            current_key
                        );
                    }
                } else {
                    on_fail(ConfirmationFailure::timeout()).await;
                }
            }
            Err(error) => {
                tracing::warn!("{:?} for {} failed: {}", operation_id, resolved, error);
                on_fail(ConfirmationFailure::remote(error.to_string())).await;
            }
        }

        self.release(&submitted_key, seq).await;
    }

    /// Merge `from`'s group into `to` and alias future submissions.
    async fn migrate_key(&self, from: &str, to: &str) {
        let mut state = self.inner.state.lock().await;
        let from = state.resolve_key(from);
        let to = state.resolve_key(to);
        if from == to {
            return;
        }
        tracing::debug!("migrating confirmation group {} -> {}", from, to);

        let old = state.groups.remove(&from).unwrap_or_default();
        let target = state.groups.entry(to.clone()).or_default();
        target.pending.extend(old.pending);
        target.in_flight.extend(old.in_flight);
        for (operation_id, seq) in old.last_success_seq {
            let entry = target.last_success_seq.entry(operation_id).or_insert(seq);
            *entry = (*entry).max(seq);
        }
        state.aliases.insert(from, to.clone());

        self.pump_locked(&mut state, &to);
    }

    /// Release a completed request's slot and start whatever is next.
    async fn release(&self, submitted_key: &str, seq: u64) {
        let mut state = self.inner.state.lock().await;
        let key = state.resolve_key(submitted_key);
        if let Some(group) = state.groups.get_mut(&key) {
            group.in_flight.retain(|flight| flight.seq != seq);
        }
        self.pump_locked(&mut state, &key);
        let drained = state.groups.get(&key).is_some_and(Group::is_empty);
        if drained {
            state.groups.remove(&key);
        }
    }
}
