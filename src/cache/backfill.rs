//! Background backfill writes.
//!
//! Batch lookups warm the tiers that missed without making the caller wait.
//! Writes run as detached tokio tasks so they finish even if the caller's
//! request is cancelled, but the orchestrator keeps their handles:
//! [`Backfiller::drain`] waits for everything outstanding (tests, graceful
//! shutdown) and an optional limit caps how many writes run at once.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::error::CacheError;

/// Counters for background writes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillStats {
    pub total_scheduled: u64,
    pub total_completed: u64,
    pub total_failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    scheduled: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Owner of in-flight backfill tasks.
pub struct Backfiller {
    handles: Mutex<Vec<JoinHandle<()>>>,

    /// Caps concurrent writes; waiting happens inside the task, never in the caller.
    limit: Option<Arc<Semaphore>>,

    counters: Arc<Counters>,
}

impl Backfiller {
    /// `limit` of `None` or `Some(0)` means unbounded.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            limit: limit.filter(|n| *n > 0).map(|n| Arc::new(Semaphore::new(n))),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Start a write in the background. Must be called within a tokio runtime.
    pub fn spawn<F>(&self, write: F)
    where
        F: Future<Output = Result<(), CacheError>> + Send + 'static,
    {
        let limit = self.limit.clone();
        let counters = Arc::clone(&self.counters);

        let handle = tokio::spawn(async move {
            let _permit = match limit {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            match write.await {
                Ok(()) => counters.completed.fetch_add(1, Ordering::Relaxed),
                Err(_) => counters.failed.fetch_add(1, Ordering::Relaxed),
            };
        });

        self.counters.scheduled.fetch_add(1, Ordering::Relaxed);

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Wait until every write scheduled so far (and any scheduled meanwhile) is done.
    ///
    /// Cancelling the returned future leaves the remaining writes running.
    pub async fn drain(&self) {
        loop {
            let pending = std::mem::take(
                &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() {
                break;
            }

            debug!(pending = pending.len(), "Draining backfill writes");
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!("Backfill task ended abnormally: {e}");
                }
            }
        }
    }

    /// Writes scheduled but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub fn stats(&self) -> BackfillStats {
        BackfillStats {
            total_scheduled: self.counters.scheduled.load(Ordering::Relaxed),
            total_completed: self.counters.completed.load(Ordering::Relaxed),
            total_failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Backfiller {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_waits_and_counts() {
        let backfiller = Backfiller::new(None);

        backfiller.spawn(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        });
        backfiller.spawn(async { Err(CacheError::SourceUndefined) });

        backfiller.drain().await;

        assert_eq!(backfiller.in_flight(), 0);
        assert_eq!(
            backfiller.stats(),
            BackfillStats {
                total_scheduled: 2,
                total_completed: 1,
                total_failed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_limit_bounds_concurrency() {
        let backfiller = Backfiller::new(Some(2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            backfiller.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        backfiller.drain().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(backfiller.stats().total_completed, 8);
    }

    #[tokio::test]
    async fn test_drain_empty_returns() {
        Backfiller::default().drain().await;
    }
}
