//! In-process ranking store.
//!
//! Keeps every table as a sorted index plus per-player records, the same
//! shape a real ranking service uses. Useful for development builds,
//! offline play and tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::{BackendEntry, BackendPage, BackendResult, RankingBackend};
use crate::definition::SortOrder;
use crate::registry::LeaderboardDefinitionRegistry;
use crate::stats::Aggregation;

/// How to handle multiple score submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOperator {
    /// Keep the best score.
    Best,
    /// Always use the latest score.
    Latest,
}

#[derive(Debug, Clone)]
struct Record {
    score: i64,
    sequence: u64,
    previous_rank: u32,
    updated_at: i64,
}

/// Sort key for ordered storage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    score: i64,
    // submission order breaks ties
    sequence: u64,
    player_id: String,
}

struct Table {
    sort_order: SortOrder,
    operator: ScoreOperator,
    by_player: HashMap<String, Record>,
    sorted: BTreeMap<SortKey, ()>,
}

impl Table {
    fn new(sort_order: SortOrder, operator: ScoreOperator) -> Self {
        Self {
            sort_order,
            operator,
            by_player: HashMap::new(),
            sorted: BTreeMap::new(),
        }
    }

    fn key(&self, player_id: &str, record: &Record) -> SortKey {
        SortKey {
            score: match self.sort_order {
                SortOrder::Descending => -record.score,
                SortOrder::Ascending => record.score,
            },
            sequence: record.sequence,
            player_id: player_id.to_string(),
        }
    }

    fn rank_of(&self, player_id: &str) -> Option<u32> {
        self.sorted
            .keys()
            .position(|k| k.player_id == player_id)
            .map(|idx| idx as u32 + 1)
    }

    fn is_better(&self, candidate: i64, current: i64) -> bool {
        match self.sort_order {
            SortOrder::Descending => candidate > current,
            SortOrder::Ascending => candidate < current,
        }
    }
}

#[derive(Debug, Clone)]
struct Profile {
    display_name: String,
    level: u32,
}

/// In-memory [`RankingBackend`].
pub struct MemoryBackend {
    tables: DashMap<String, Arc<RwLock<Table>>>,
    profiles: DashMap<String, Profile>,
    friends: RwLock<HashSet<String>>,
    sequence: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            profiles: DashMap::new(),
            friends: RwLock::new(HashSet::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// One table per definition, ordered and aggregated like its statistic.
    pub fn from_registry(registry: &LeaderboardDefinitionRegistry) -> Self {
        let backend = Self::new();
        for def in registry.iter() {
            let operator = match def.statistic.aggregation() {
                Aggregation::Best => ScoreOperator::Best,
                Aggregation::Replace => ScoreOperator::Latest,
            };
            backend.create_table(def.id.as_str(), def.sort_order, operator);
        }
        backend
    }

    /// Create (or reset) a table.
    pub fn create_table(&self, table_id: &str, sort_order: SortOrder, operator: ScoreOperator) {
        self.tables.insert(
            table_id.to_string(),
            Arc::new(RwLock::new(Table::new(sort_order, operator))),
        );
    }

    pub fn register_player(&self, player_id: &str, display_name: &str, level: u32) {
        self.profiles.insert(
            player_id.to_string(),
            Profile {
                display_name: display_name.to_string(),
                level,
            },
        );
    }

    /// Mark `player_id` as a friend of the viewing player.
    pub fn add_friend(&self, player_id: &str) {
        self.friends.write().insert(player_id.to_string());
    }

    /// Number of ranked players in a table.
    pub fn count(&self, table_id: &str) -> usize {
        self.tables
            .get(table_id)
            .map(|t| t.read().by_player.len())
            .unwrap_or(0)
    }

    /// Stored score of a player.
    pub fn score_of(&self, table_id: &str, player_id: &str) -> Option<i64> {
        let table = self.tables.get(table_id)?;
        let table = table.read();
        table.by_player.get(player_id).map(|r| r.score)
    }

    fn table(&self, table_id: &str) -> Arc<RwLock<Table>> {
        self.tables
            .entry(table_id.to_string())
            .or_insert_with(|| {
                Arc::new(RwLock::new(Table::new(SortOrder::Descending, ScoreOperator::Latest)))
            })
            .clone()
    }

    fn submit_sync(&self, table_id: &str, player_id: &str, score: i64) {
        let table = self.table(table_id);
        let mut table = table.write();

        let existing = table.by_player.get(player_id).cloned();
        let new_score = match (table.operator, &existing) {
            (ScoreOperator::Best, Some(current)) if !table.is_better(score, current.score) => {
                current.score
            }
            _ => score,
        };

        // Unchanged scores keep their position so resubmission is idempotent.
        if let Some(current) = &existing {
            if current.score == new_score {
                return;
            }
        }

        let previous_rank = table.rank_of(player_id).unwrap_or(0);
        if let Some(current) = &existing {
            let old_key = table.key(player_id, current);
            table.sorted.remove(&old_key);
        }

        let record = Record {
            score: new_score,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            previous_rank,
            updated_at: crate::now_millis(),
        };
        let key = table.key(player_id, &record);
        table.sorted.insert(key, ());
        table.by_player.insert(player_id.to_string(), record);
    }

    fn page_sync(&self, table_id: &str, offset: u32, limit: u32) -> BackendPage {
        let Some(table) = self.tables.get(table_id).map(|t| t.clone()) else {
            return BackendPage::default();
        };
        let table = table.read();
        let friends = self.friends.read();

        let entries = table
            .sorted
            .keys()
            .enumerate()
            .skip(offset as usize)
            .take(limit as usize)
            .filter_map(|(idx, key)| {
                let record = table.by_player.get(&key.player_id)?;
                let profile = self.profiles.get(&key.player_id);
                Some(BackendEntry {
                    player_id: key.player_id.clone(),
                    display_name: profile
                        .as_ref()
                        .map(|p| p.display_name.clone())
                        .unwrap_or_else(|| key.player_id.clone()),
                    level: profile.as_ref().map(|p| p.level).unwrap_or(1),
                    rank: idx as u32 + 1,
                    previous_rank: record.previous_rank,
                    score: record.score,
                    updated_at: record.updated_at,
                    is_friend: friends.contains(&key.player_id),
                })
            })
            .collect();

        BackendPage {
            entries,
            total: table.sorted.len() as u64,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RankingBackend for MemoryBackend {
    async fn submit(&self, table_id: &str, player_id: &str, score: i64) -> BackendResult<()> {
        self.submit_sync(table_id, player_id, score);
        Ok(())
    }

    async fn fetch_page(&self, table_id: &str, offset: u32, limit: u32) -> BackendResult<BackendPage> {
        Ok(self.page_sync(table_id, offset, limit))
    }

    async fn fetch_player_rank(&self, table_id: &str, player_id: &str) -> BackendResult<Option<u32>> {
        Ok(self
            .tables
            .get(table_id)
            .and_then(|t| t.read().rank_of(player_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_and_rank() {
        let backend = MemoryBackend::new();
        backend.create_table("highscores", SortOrder::Descending, ScoreOperator::Best);
        backend.register_player("user2", "Bob", 12);

        backend.submit("highscores", "user1", 100).await.unwrap();
        backend.submit("highscores", "user2", 200).await.unwrap();
        backend.submit("highscores", "user3", 150).await.unwrap();

        let page = backend.fetch_page("highscores", 0, 10).await.unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.entries.iter().map(|e| e.player_id.as_str()).collect();
        assert_eq!(ids, vec!["user2", "user3", "user1"]);
        assert_eq!(page.entries[0].display_name, "Bob");
        assert_eq!(page.entries[0].level, 12);
        assert_eq!(page.entries[2].display_name, "user1");

        assert_eq!(backend.fetch_player_rank("highscores", "user3").await.unwrap(), Some(2));
        assert_eq!(backend.fetch_player_rank("highscores", "ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_best_operator_keeps_best() {
        let backend = MemoryBackend::new();
        backend.create_table("best", SortOrder::Descending, ScoreOperator::Best);

        backend.submit("best", "user1", 100).await.unwrap();
        backend.submit("best", "user1", 50).await.unwrap();
        assert_eq!(backend.score_of("best", "user1"), Some(100));

        backend.submit("best", "user1", 150).await.unwrap();
        assert_eq!(backend.score_of("best", "user1"), Some(150));
    }

    #[tokio::test]
    async fn test_ascending_order() {
        let backend = MemoryBackend::new();
        backend.create_table("speedrun", SortOrder::Ascending, ScoreOperator::Best);

        backend.submit("speedrun", "alice", 120).await.unwrap();
        backend.submit("speedrun", "bob", 90).await.unwrap();
        backend.submit("speedrun", "carol", 150).await.unwrap();

        let page = backend.fetch_page("speedrun", 0, 10).await.unwrap();
        let ids: Vec<_> = page.entries.iter().map(|e| e.player_id.as_str()).collect();
        assert_eq!(ids, vec!["bob", "alice", "carol"]);
    }

    #[tokio::test]
    async fn test_ties_keep_submission_order() {
        let backend = MemoryBackend::new();
        backend.submit("t", "first", 10).await.unwrap();
        backend.submit("t", "second", 10).await.unwrap();
        // Idempotent resubmission does not move the player.
        backend.submit("t", "first", 10).await.unwrap();

        let page = backend.fetch_page("t", 0, 10).await.unwrap();
        assert_eq!(page.entries[0].player_id, "first");
        assert_eq!(page.entries[1].player_id, "second");
    }

    #[tokio::test]
    async fn test_previous_rank_and_friends() {
        let backend = MemoryBackend::new();
        backend.add_friend("b");
        backend.submit("t", "a", 10).await.unwrap();
        backend.submit("t", "b", 5).await.unwrap();
        backend.submit("t", "b", 20).await.unwrap();

        let page = backend.fetch_page("t", 0, 10).await.unwrap();
        assert_eq!(page.entries[0].player_id, "b");
        assert_eq!(page.entries[0].previous_rank, 2);
        assert!(page.entries[0].is_friend);
        assert_eq!(page.entries[1].previous_rank, 0);
        assert!(!page.entries[1].is_friend);
    }

    #[tokio::test]
    async fn test_paging_past_end_is_empty() {
        let backend = MemoryBackend::new();
        for i in 0..5 {
            backend.submit("t", &format!("p{i}"), i).await.unwrap();
        }
        let page = backend.fetch_page("t", 20, 10).await.unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(page.total, 5);

        let unknown = backend.fetch_page("missing", 0, 10).await.unwrap();
        assert_eq!(unknown, BackendPage::default());
    }
}
