//! XFCollect - Optimistic Collection Mutation Engine
//!
//! XFCollect lets clients optimistically mutate server-confirmed ordered
//! collections (add/remove/reorder items, create/edit/publish/delete)
//! while the authoritative write happens asynchronously against a slow,
//! eventually-consistent backend that finalizes writes in blocks.
//!
//! # Overview
//!
//! The engine guarantees three things:
//!
//! - The UI reflects the optimistic result immediately
//! - Competing mutations targeting the same collection never corrupt
//!   shared state, however they race
//! - When the backend's confirmed item order drifts from the client's
//!   intended order, the engine detects and repairs the divergence
//!   automatically
//!
//! # Module Structure
//!
//! - **`queue`** - Per-entity confirmation queue: serializes or
//!   selectively parallelizes competing requests and drives each through
//!   perform → finality wait → success/fail
//! - **`reconciler`** - The mutation surface: optimistic phases, success
//!   reconciliation, drift repair, rollbacks, failure signals
//! - **`finality`** - Block-presence polling that decides when a write is
//!   durably confirmed
//! - **`cache`** - Normalized collection store with transparent
//!   temp-id → real-id identity indirection
//! - **`remote`** - The consumed backend contract plus its HTTP bindings
//! - **`config`**, **`error`**, **`types`** - Configuration, the error
//!   taxonomy and failure signals, and the shared data model
//!
//! # Usage
//!
//! ```rust,no_run
//! use xfcollect::config::EngineConfig;
//! use xfcollect::reconciler::CollectionEngine;
//!
//! # async fn example() {
//! let config = EngineConfig::builder()
//!     .server_url("https://api.example.test")
//!     .build()
//!     .expect("valid config");
//! let (engine, mut failures) = CollectionEngine::over_http(config);
//!
//! tokio::spawn(async move {
//!     while let Some(failure) = failures.recv().await {
//!         tracing::warn!("mutation failed: {:?}", failure);
//!     }
//! });
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod finality;
pub mod queue;
pub mod reconciler;
pub mod remote;
pub mod types;

pub use cache::CollectionCache;
pub use config::EngineConfig;
pub use error::{ConfirmationFailure, MutationFailure, MutationKind, RemoteError};
pub use finality::{BlockObserver, FinalityChecker, PollingFinalityChecker};
pub use queue::{ConfirmationQueue, ConfirmationRequest, OperationId, QueueStats};
pub use reconciler::CollectionEngine;
pub use remote::CollectionService;
