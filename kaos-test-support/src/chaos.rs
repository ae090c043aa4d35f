//! Chaos backend: random latency and failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kaos_ranking::backend::{BackendPage, BackendResult, RankingBackend};
use kaos_ranking::BackendError;
use rand::Rng;

/// Injects random delays and failures in front of a backend.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use kaos_ranking::MemoryBackend;
/// use kaos_test_support::ChaosBackend;
///
/// let backend = ChaosBackend::new(Arc::new(MemoryBackend::new()))
///     .with_delay_probability(0.2)
///     .with_failure_probability(0.05);
/// ```
pub struct ChaosBackend {
    inner: Arc<dyn RankingBackend>,
    delay_probability: f64,
    delay_min_ms: u64,
    delay_max_ms: u64,
    failure_probability: f64,
    events_triggered: AtomicUsize,
}

impl ChaosBackend {
    pub fn new(inner: Arc<dyn RankingBackend>) -> Self {
        Self {
            inner,
            delay_probability: 0.0,
            delay_min_ms: 10,
            delay_max_ms: 500,
            failure_probability: 0.0,
            events_triggered: AtomicUsize::new(0),
        }
    }

    /// Frequent slow calls and occasional failures.
    pub fn aggressive(inner: Arc<dyn RankingBackend>) -> Self {
        Self::new(inner)
            .with_delay_probability(0.3)
            .with_failure_probability(0.1)
    }

    pub fn mild(inner: Arc<dyn RankingBackend>) -> Self {
        Self::new(inner)
            .with_delay_probability(0.05)
            .with_failure_probability(0.01)
    }

    pub fn with_delay_probability(mut self, prob: f64) -> Self {
        self.delay_probability = prob.clamp(0.0, 1.0);
        self
    }

    pub fn with_delay_range(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.delay_min_ms = min_ms;
        self.delay_max_ms = max_ms.max(min_ms);
        self
    }

    pub fn with_failure_probability(mut self, prob: f64) -> Self {
        self.failure_probability = prob.clamp(0.0, 1.0);
        self
    }

    pub fn events_triggered(&self) -> usize {
        self.events_triggered.load(Ordering::Relaxed)
    }

    async fn disturb(&self) -> BackendResult<()> {
        // ThreadRng is not Send; draw everything before awaiting.
        let (delay, fail) = {
            let mut rng = rand::thread_rng();
            let delay = (rng.gen::<f64>() < self.delay_probability)
                .then(|| rng.gen_range(self.delay_min_ms..=self.delay_max_ms));
            (delay, rng.gen::<f64>() < self.failure_probability)
        };

        if let Some(ms) = delay {
            self.events_triggered.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if fail {
            self.events_triggered.fetch_add(1, Ordering::Relaxed);
            return Err(BackendError::unavailable("chaos"));
        }
        Ok(())
    }
}

#[async_trait]
impl RankingBackend for ChaosBackend {
    async fn submit(&self, table_id: &str, player_id: &str, score: i64) -> BackendResult<()> {
        self.disturb().await?;
        self.inner.submit(table_id, player_id, score).await
    }

    async fn fetch_page(&self, table_id: &str, offset: u32, limit: u32) -> BackendResult<BackendPage> {
        self.disturb().await?;
        self.inner.fetch_page(table_id, offset, limit).await
    }

    async fn fetch_player_rank(&self, table_id: &str, player_id: &str) -> BackendResult<Option<u32>> {
        self.disturb().await?;
        self.inner.fetch_player_rank(table_id, player_id).await
    }
}
