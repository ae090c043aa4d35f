//! Deterministic fault injection for backend calls.
//!
//! A [`FaultInjector`] decides per call whether it passes, fails or hangs.
//! [`FaultyBackend`] applies those decisions in front of a real backend.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use kaos_ranking::backend::{BackendPage, BackendResult, RankingBackend};
use kaos_ranking::BackendError;
use parking_lot::Mutex;
use rand::Rng;

/// What happens to one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDecision {
    Pass,
    Fail,
    /// Never complete; the caller's timeout has to fire.
    Hang,
}

/// Which calls go wrong.
#[derive(Debug, Clone)]
pub enum FaultPattern {
    /// Everything passes.
    None,
    /// Every call fails.
    Offline,
    /// Every Nth call fails, counting from 1.
    Periodic { every_n: usize },
    /// Calls fail with the given probability (0.0-1.0).
    Random { probability: f64 },
    /// Calls touching these tables fail.
    Tables { tables: HashSet<String> },
    /// Every call hangs.
    Hang,
    /// First matching pattern wins.
    Combined(Vec<FaultPattern>),
}

/// Stateful evaluator of a [`FaultPattern`].
///
/// # Example
///
/// ```
/// use kaos_test_support::faults::{FaultDecision, FaultInjector};
///
/// let mut faults = FaultInjector::periodic(3);
/// let decisions: Vec<_> = (0..6).map(|_| faults.decide("t")).collect();
/// assert_eq!(decisions[2], FaultDecision::Fail);
/// assert_eq!(decisions[5], FaultDecision::Fail);
/// ```
#[derive(Debug, Clone)]
pub struct FaultInjector {
    pattern: FaultPattern,
    call_count: usize,
    faults: usize,
}

impl FaultInjector {
    pub fn new(pattern: FaultPattern) -> Self {
        Self {
            pattern,
            call_count: 0,
            faults: 0,
        }
    }

    pub fn none() -> Self {
        Self::new(FaultPattern::None)
    }

    pub fn offline() -> Self {
        Self::new(FaultPattern::Offline)
    }

    pub fn periodic(every_n: usize) -> Self {
        Self::new(FaultPattern::Periodic { every_n })
    }

    pub fn random(probability: f64) -> Self {
        Self::new(FaultPattern::Random {
            probability: probability.clamp(0.0, 1.0),
        })
    }

    pub fn tables<S: Into<String>>(tables: impl IntoIterator<Item = S>) -> Self {
        Self::new(FaultPattern::Tables {
            tables: tables.into_iter().map(Into::into).collect(),
        })
    }

    pub fn hang() -> Self {
        Self::new(FaultPattern::Hang)
    }

    /// Decide the fate of the next call against `table_id`.
    pub fn decide(&mut self, table_id: &str) -> FaultDecision {
        self.call_count += 1;
        let decision = self.check_pattern(table_id, &self.pattern);
        if decision != FaultDecision::Pass {
            self.faults += 1;
        }
        decision
    }

    fn check_pattern(&self, table_id: &str, pattern: &FaultPattern) -> FaultDecision {
        match pattern {
            FaultPattern::None => FaultDecision::Pass,
            FaultPattern::Offline => FaultDecision::Fail,
            FaultPattern::Hang => FaultDecision::Hang,

            FaultPattern::Periodic { every_n } => {
                if *every_n > 0 && self.call_count % *every_n == 0 {
                    FaultDecision::Fail
                } else {
                    FaultDecision::Pass
                }
            }

            FaultPattern::Random { probability } => {
                if rand::thread_rng().gen::<f64>() < *probability {
                    FaultDecision::Fail
                } else {
                    FaultDecision::Pass
                }
            }

            FaultPattern::Tables { tables } => {
                if tables.contains(table_id) {
                    FaultDecision::Fail
                } else {
                    FaultDecision::Pass
                }
            }

            FaultPattern::Combined(patterns) => patterns
                .iter()
                .map(|p| self.check_pattern(table_id, p))
                .find(|d| *d != FaultDecision::Pass)
                .unwrap_or(FaultDecision::Pass),
        }
    }

    pub fn stats(&self) -> FaultStats {
        FaultStats {
            total_calls: self.call_count,
            faults: self.faults,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultStats {
    pub total_calls: usize,
    pub faults: usize,
}

/// Backend wrapper failing calls according to a swappable pattern.
pub struct FaultyBackend {
    inner: Arc<dyn RankingBackend>,
    injector: Mutex<FaultInjector>,
    passed: AtomicUsize,
}

impl FaultyBackend {
    pub fn new(inner: Arc<dyn RankingBackend>, pattern: FaultPattern) -> Self {
        Self {
            inner,
            injector: Mutex::new(FaultInjector::new(pattern)),
            passed: AtomicUsize::new(0),
        }
    }

    /// Replace the pattern; call counting restarts.
    pub fn set_pattern(&self, pattern: FaultPattern) {
        *self.injector.lock() = FaultInjector::new(pattern);
    }

    pub fn go_offline(&self) {
        self.set_pattern(FaultPattern::Offline);
    }

    pub fn restore(&self) {
        self.set_pattern(FaultPattern::None);
    }

    pub fn stats(&self) -> FaultStats {
        self.injector.lock().stats()
    }

    /// Calls that reached the inner backend.
    pub fn passed(&self) -> usize {
        self.passed.load(Ordering::SeqCst)
    }

    async fn gate(&self, table_id: &str) -> BackendResult<()> {
        let decision = self.injector.lock().decide(table_id);
        match decision {
            FaultDecision::Pass => {
                self.passed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            FaultDecision::Fail => Err(BackendError::unavailable(format!("injected fault on {table_id}"))),
            FaultDecision::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl RankingBackend for FaultyBackend {
    async fn submit(&self, table_id: &str, player_id: &str, score: i64) -> BackendResult<()> {
        self.gate(table_id).await?;
        self.inner.submit(table_id, player_id, score).await
    }

    async fn fetch_page(&self, table_id: &str, offset: u32, limit: u32) -> BackendResult<BackendPage> {
        self.gate(table_id).await?;
        self.inner.fetch_page(table_id, offset, limit).await
    }

    async fn fetch_player_rank(&self, table_id: &str, player_id: &str) -> BackendResult<Option<u32>> {
        self.gate(table_id).await?;
        self.inner.fetch_player_rank(table_id, player_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaos_ranking::MemoryBackend;
    use std::time::Duration;

    #[test]
    fn test_none_passes() {
        let mut faults = FaultInjector::none();
        for _ in 0..100 {
            assert_eq!(faults.decide("t"), FaultDecision::Pass);
        }
        assert_eq!(faults.stats().faults, 0);
    }

    #[test]
    fn test_periodic() {
        let mut faults = FaultInjector::periodic(10);
        let failed = (0..100)
            .filter(|_| faults.decide("t") == FaultDecision::Fail)
            .count();
        assert_eq!(failed, 10);
        assert_eq!(faults.stats().total_calls, 100);
    }

    #[test]
    fn test_tables() {
        let mut faults = FaultInjector::tables(["weekly"]);
        assert_eq!(faults.decide("weekly"), FaultDecision::Fail);
        assert_eq!(faults.decide("all_time"), FaultDecision::Pass);
    }

    #[test]
    fn test_combined_first_fault_wins() {
        let mut faults = FaultInjector::new(FaultPattern::Combined(vec![
            FaultPattern::Tables {
                tables: HashSet::from(["a".to_string()]),
            },
            FaultPattern::Hang,
        ]));
        assert_eq!(faults.decide("a"), FaultDecision::Fail);
        assert_eq!(faults.decide("b"), FaultDecision::Hang);
    }

    #[test]
    fn test_random() {
        let mut faults = FaultInjector::random(0.1);
        let failed = (0..10_000)
            .filter(|_| faults.decide("t") == FaultDecision::Fail)
            .count();
        assert!(failed > 800 && failed < 1200, "failed = {}", failed);
    }

    #[tokio::test]
    async fn test_backend_offline_and_restore() {
        let backend = FaultyBackend::new(Arc::new(MemoryBackend::new()), FaultPattern::None);
        backend.submit("t", "p1", 1).await.unwrap();

        backend.go_offline();
        assert!(matches!(
            backend.fetch_page("t", 0, 10).await,
            Err(BackendError::Unavailable(_))
        ));

        backend.restore();
        assert_eq!(backend.fetch_page("t", 0, 10).await.unwrap().total, 1);
        assert_eq!(backend.passed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_never_completes() {
        let backend = FaultyBackend::new(Arc::new(MemoryBackend::new()), FaultPattern::Hang);
        let call = backend.fetch_player_rank("t", "p1");
        assert!(tokio::time::timeout(Duration::from_secs(30), call).await.is_err());
    }
}
