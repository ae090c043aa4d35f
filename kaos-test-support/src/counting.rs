//! Call-counting backend wrapper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use kaos_ranking::backend::{BackendPage, BackendResult, RankingBackend};
use parking_lot::Mutex;

/// Forwards every call to `inner` and counts it.
pub struct CountingBackend {
    inner: Arc<dyn RankingBackend>,
    submits: AtomicUsize,
    page_fetches: AtomicUsize,
    rank_lookups: AtomicUsize,
    submits_by_table: Mutex<HashMap<String, usize>>,
}

impl CountingBackend {
    pub fn new(inner: Arc<dyn RankingBackend>) -> Self {
        Self {
            inner,
            submits: AtomicUsize::new(0),
            page_fetches: AtomicUsize::new(0),
            rank_lookups: AtomicUsize::new(0),
            submits_by_table: Mutex::new(HashMap::new()),
        }
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }

    pub fn rank_lookups(&self) -> usize {
        self.rank_lookups.load(Ordering::SeqCst)
    }

    /// All calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.submits() + self.page_fetches() + self.rank_lookups()
    }

    pub fn submits_to(&self, table_id: &str) -> usize {
        self.submits_by_table
            .lock()
            .get(table_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset(&self) {
        self.submits.store(0, Ordering::SeqCst);
        self.page_fetches.store(0, Ordering::SeqCst);
        self.rank_lookups.store(0, Ordering::SeqCst);
        self.submits_by_table.lock().clear();
    }
}

#[async_trait]
impl RankingBackend for CountingBackend {
    async fn submit(&self, table_id: &str, player_id: &str, score: i64) -> BackendResult<()> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        *self
            .submits_by_table
            .lock()
            .entry(table_id.to_string())
            .or_insert(0) += 1;
        self.inner.submit(table_id, player_id, score).await
    }

    async fn fetch_page(&self, table_id: &str, offset: u32, limit: u32) -> BackendResult<BackendPage> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_page(table_id, offset, limit).await
    }

    async fn fetch_player_rank(&self, table_id: &str, player_id: &str) -> BackendResult<Option<u32>> {
        self.rank_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_player_rank(table_id, player_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaos_ranking::MemoryBackend;

    #[tokio::test]
    async fn test_counts_per_operation() {
        let backend = CountingBackend::new(Arc::new(MemoryBackend::new()));
        backend.submit("a", "p1", 1).await.unwrap();
        backend.submit("a", "p2", 2).await.unwrap();
        backend.submit("b", "p1", 3).await.unwrap();
        backend.fetch_page("a", 0, 10).await.unwrap();
        backend.fetch_player_rank("a", "p1").await.unwrap();

        assert_eq!(backend.submits(), 3);
        assert_eq!(backend.submits_to("a"), 2);
        assert_eq!(backend.submits_to("c"), 0);
        assert_eq!(backend.page_fetches(), 1);
        assert_eq!(backend.rank_lookups(), 1);
        assert_eq!(backend.total_calls(), 5);

        backend.reset();
        assert_eq!(backend.total_calls(), 0);
    }
}
