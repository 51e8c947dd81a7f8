//! Per-order serialization and side-effect tracking.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, OwnedMutexGuard};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// OrderLocks
// ---------------------------------------------------------------------------

/// One async mutex per order id. Holders of the guard are the only writer for
/// that order; requests for different orders never wait on each other.
#[derive(Default)]
pub struct OrderLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `order_id`. The guard is owned so it can
    /// travel into a spawned task.
    pub async fn acquire(&self, order_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            // Entries nobody holds or waits on are dropped.
            map.retain(|id, m| *id == order_id || Arc::strong_count(m) > 1);
            map.entry(order_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of order ids currently tracked.
    pub fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

// ---------------------------------------------------------------------------
// EffectTracker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TrackerInner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Counts spawned side-effect tasks so shutdown (and tests) can wait for them.
#[derive(Clone, Default)]
pub struct EffectTracker {
    inner: Arc<TrackerInner>,
}

struct InFlight(Arc<TrackerInner>);

impl InFlight {
    fn new(inner: Arc<TrackerInner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl EffectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` on the runtime. The count drops when it finishes or panics.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = InFlight::new(self.inner.clone());
        tokio::spawn(async move {
            let _token = token;
            fut.await;
        });
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once no tracked task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_order_is_serialized() {
        let locks = Arc::new(OrderLocks::new());
        let id = Uuid::new_v4();

        let g = locks.acquire(id).await;
        let l2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = l2.acquire(id).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "second writer must wait");
        drop(g);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter proceeds once released")
            .unwrap();
    }

    #[tokio::test]
    async fn different_orders_do_not_block() {
        let locks = OrderLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire(Uuid::new_v4())).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = OrderLocks::new();
        for _ in 0..5 {
            let _g = locks.acquire(Uuid::new_v4()).await;
        }
        let _g = locks.acquire(Uuid::new_v4()).await;
        assert_eq!(locks.tracked(), 1);
    }

    #[tokio::test]
    async fn wait_idle_waits_for_spawned_work() {
        let tracker = EffectTracker::new();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let d = done.clone();
            tracker.spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                d.fetch_add(1, Ordering::SeqCst);
            });
        }
        tracker.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_nothing_runs() {
        tokio::time::timeout(Duration::from_millis(100), EffectTracker::new().wait_idle())
            .await
            .expect("idle tracker resolves at once");
    }
}
