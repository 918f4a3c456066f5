//! # Transaction Finality Checker
//!
//! Determines when a backend write is durably confirmed. Writes land in
//! blocks that the backend exposes some time after accepting the call;
//! the checker polls for the block's presence until it is observed or the
//! caller's budget expires.
//!
//! The checker is trait-abstracted so the confirmation queue can be
//! exercised in tests without a network (instant or never-confirming
//! stubs), mirroring the transport abstraction used for the remote
//! service itself.

use crate::types::TxRef;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Awaits durable confirmation of a write.
#[async_trait]
pub trait FinalityChecker: Send + Sync {
    /// Await finality of `tx_ref`, giving up after `timeout`.
    ///
    /// Returns `true` once the carrying block is observed, `false` when
    /// the budget expires first.
    async fn await_finality(&self, tx_ref: &TxRef, timeout: Duration) -> bool;
}

/// Source of block-presence observations.
#[async_trait]
pub trait BlockObserver: Send + Sync {
    /// Whether the block carrying `tx_ref` has been observed.
    ///
    /// Errors are treated by the poller as "not seen yet"; the caller's
    /// timeout bounds how long a persistently failing observer is polled.
    async fn block_seen(&self, tx_ref: &TxRef) -> Result<bool, crate::error::RemoteError>;
}

/// Finality checker that polls a [`BlockObserver`] at a fixed interval.
pub struct PollingFinalityChecker {
    observer: Arc<dyn BlockObserver>,
    poll_interval: Duration,
}

impl PollingFinalityChecker {
    /// Create a checker polling `observer` every `poll_interval`.
    pub fn new(observer: Arc<dyn BlockObserver>, poll_interval: Duration) -> Self {
        Self {
            observer,
            poll_interval,
        }
    }
}

#[async_trait]
impl FinalityChecker for PollingFinalityChecker {
    async fn await_finality(&self, tx_ref: &TxRef, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.observer.block_seen(tx_ref).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(error) => {
                    tracing::debug!("block observation failed for {}: {}", tx_ref.hash, error);
                }
            }
            if Instant::now() + self.poll_interval > deadline {
                tracing::warn!(
                    "finality wait timed out for block {} ({})",
                    tx_ref.number,
                    tx_ref.hash
                );
                return false;
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Observer that reports the block seen after a fixed number of polls.
    struct DelayedObserver {
        polls_until_seen: u32,
        polls: AtomicU32,
    }

    #[async_trait]
    impl BlockObserver for DelayedObserver {
        async fn block_seen(&self, _tx_ref: &TxRef) -> Result<bool, RemoteError> {
            let count = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(count > self.polls_until_seen)
        }
    }

    fn tx_ref() -> TxRef {
        TxRef {
            hash: "0xabc".to_string(),
            number: 42,
        }
    }

    #[tokio::test]
    async fn test_confirms_after_delay() {
        let observer = Arc::new(DelayedObserver {
            polls_until_seen: 3,
            polls: AtomicU32::new(0),
        });
        let checker = PollingFinalityChecker::new(observer.clone(), Duration::from_millis(5));

        let confirmed = checker
            .await_finality(&tx_ref(), Duration::from_secs(2))
            .await;
        assert!(confirmed);
        assert_eq!(observer.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_times_out_when_never_seen() {
        let observer = Arc::new(DelayedObserver {
            polls_until_seen: u32::MAX,
            polls: AtomicU32::new(0),
        });
        let checker = PollingFinalityChecker::new(observer, Duration::from_millis(5));

        let confirmed = checker
            .await_finality(&tx_ref(), Duration::from_millis(30))
            .await;
        assert!(!confirmed);
    }

    #[tokio::test]
    async fn test_observer_errors_do_not_abort_wait() {
        struct FlakyObserver {
            polls: AtomicU32,
        }

        #[async_trait]
        impl BlockObserver for FlakyObserver {
            async fn block_seen(&self, _tx_ref: &TxRef) -> Result<bool, RemoteError> {
                let count = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
                if count < 3 {
                    Err(RemoteError::Network("socket closed".to_string()))
                } else {
                    Ok(true)
                }
            }
        }

        let checker = PollingFinalityChecker::new(
            Arc::new(FlakyObserver {
                polls: AtomicU32::new(0),
            }),
            Duration::from_millis(5),
        );
        let confirmed = checker
            .await_finality(&tx_ref(), Duration::from_secs(2))
            .await;
        assert!(confirmed);
    }
}
