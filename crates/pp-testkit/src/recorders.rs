use anyhow::{anyhow, Result};
use pp_db::MemoryStore;
use pp_lifecycle::{NotificationRequest, Notifier, PackingSlipSeed, PackingSlipService};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

/// Records every delivered notification. Can be told to fail or to take a
/// while, to exercise failure isolation and ordering.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationRequest>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Delivered notification types, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent().iter().map(|r| r.kind.as_str()).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, req: &NotificationRequest) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("notification relay unavailable"));
        }
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(req.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingPackingSlips
// ---------------------------------------------------------------------------

/// Packing-slip service over a `MemoryStore` that also records each seed it
/// was called with.
pub struct RecordingPackingSlips {
    store: Arc<MemoryStore>,
    seeds: Mutex<Vec<PackingSlipSeed>>,
    fail: AtomicBool,
}

impl RecordingPackingSlips {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            seeds: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }

    /// Seeds passed to `create`, including calls that found a slip already.
    pub fn seeds(&self) -> Vec<PackingSlipSeed> {
        self.seeds.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl PackingSlipService for RecordingPackingSlips {
    async fn create(&self, seed: &PackingSlipSeed) -> Result<bool> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("packing slip renderer unavailable"));
        }
        self.seeds
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(seed.clone());
        self.store.create(seed).await
    }
}
