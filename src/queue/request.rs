//! # Confirmation Request
//!
//! One unit of work submitted to the confirmation queue: a remote write
//! (`perform`), the success/fail phases run after finality, and the
//! scheduling metadata the queue needs (parallelism, squashing, staleness
//! gating, timeout, identity resolution).
//!
//! All three phases live on a single value object rather than as free
//! callbacks closing over shared mutable state, so requests can be
//! coalesced or re-keyed without hidden captures going stale.

use crate::error::{ConfirmationFailure, RemoteError};
use crate::types::WriteReceipt;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::time::Duration;

/// Logical category of mutation within a confirmation group.
///
/// Squashing and parallel grouping both operate on `(key, OperationId)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationId {
    Create,
    Edit,
    AddItem,
    RemoveItem,
    Reorder,
    Publish,
    Delete,
}

/// Remote write phase. Receives the group's current (alias-resolved) key.
pub type PerformFn =
    Box<dyn FnOnce(String) -> BoxFuture<'static, Result<WriteReceipt, RemoteError>> + Send>;

/// Success phase. Receives the resolved key and the write receipt.
pub type SuccessFn = Box<dyn FnOnce(String, WriteReceipt) -> BoxFuture<'static, ()> + Send>;

/// Fail phase. Receives the remote-error or timeout detail.
pub type FailFn = Box<dyn FnOnce(ConfirmationFailure) -> BoxFuture<'static, ()> + Send>;

/// Maps a write receipt to the identity the group should use going
/// forward. Returning a new key migrates the whole group (temp → real id).
pub type ResolveKeyFn = Box<dyn FnOnce(&WriteReceipt) -> Option<String> + Send>;

/// A mutation's full perform / confirm / react cycle plus scheduling
/// metadata, processed uniformly by [`crate::queue::ConfirmationQueue`].
pub struct ConfirmationRequest {
    pub(crate) key: String,
    pub(crate) operation_id: OperationId,
    pub(crate) parallelizable: bool,
    pub(crate) squashable: bool,
    pub(crate) use_only_last_success: bool,
    pub(crate) timeout: Option<Duration>,
    pub(crate) perform: PerformFn,
    pub(crate) on_success: SuccessFn,
    pub(crate) on_fail: FailFn,
    pub(crate) resolve_key: Option<ResolveKeyFn>,
}

impl ConfirmationRequest {
    /// Create a request for `key` with the given remote write phase.
    ///
    /// Success and fail phases default to no-ops; scheduling flags default
    /// to strictly serialized execution.
    pub fn new<F, Fut>(key: impl Into<String>, operation_id: OperationId, perform: F) -> Self
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<WriteReceipt, RemoteError>> + Send + 'static,
    {
        Self {
            key: key.into(),
            operation_id,
            parallelizable: false,
            squashable: false,
            use_only_last_success: false,
            timeout: None,
            perform: Box::new(move |resolved_key| Box::pin(perform(resolved_key))),
            on_success: Box::new(|_, _| Box::pin(async {})),
            on_fail: Box::new(|_| Box::pin(async {})),
            resolve_key: None,
        }
    }

    /// Set the success phase.
    pub fn on_success<F, Fut>(mut self, on_success: F) -> Self
    where
        F: FnOnce(String, WriteReceipt) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_success = Box::new(move |key, receipt| Box::pin(on_success(key, receipt)));
        self
    }

    /// Set the fail phase.
    pub fn on_fail<F, Fut>(mut self, on_fail: F) -> Self
    where
        F: FnOnce(ConfirmationFailure) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_fail = Box::new(move |failure| Box::pin(on_fail(failure)));
        self
    }

    /// Set the identity-resolution hook run after a successful perform.
    pub fn resolve_key<F>(mut self, resolve: F) -> Self
    where
        F: FnOnce(&WriteReceipt) -> Option<String> + Send + 'static,
    {
        self.resolve_key = Some(Box::new(resolve));
        self
    }

    /// Allow this request to overlap with other parallelizable requests
    /// under the same key.
    pub fn parallelizable(mut self) -> Self {
        self.parallelizable = true;
        self
    }

    /// Allow this request to supersede (or be superseded by) queued
    /// requests sharing `(key, operation_id)` that have not started yet.
    pub fn squashable(mut self) -> Self {
        self.squashable = true;
        self
    }

    /// Suppress this request's success phase if a later-submitted request
    /// with the same `(key, operation_id)` has already run its own.
    pub fn use_only_last_success(mut self) -> Self {
        self.use_only_last_success = true;
        self
    }

    /// Override the finality wait budget for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for ConfirmationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationRequest")
            .field("key", &self.key)
            .field("operation_id", &self.operation_id)
            .field("parallelizable", &self.parallelizable)
            .field("squashable", &self.squashable)
            .field("use_only_last_success", &self.use_only_last_success)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
