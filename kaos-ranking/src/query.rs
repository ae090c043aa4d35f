//! Ranked reads: paged, player-centered and friends-only.
//!
//! Every read goes through the cache first. A miss fetches from the backend
//! through [`PageLoader`], stores the page and hands it out. When the backend
//! cannot be reached, a stale page is preferred over an error.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::backend::{BackendClient, BackendEntry};
use crate::cache::{PageSource, RankedResultCache};
use crate::definition::{DefinitionKey, LeaderboardDefinition, Scope};
use crate::error::{RankingError, Result};
use crate::events::{EventBus, LeaderboardEvent};
use crate::registry::LeaderboardDefinitionRegistry;
use crate::types::{LeaderboardEntry, LeaderboardResultPage, PageSlot};

/// Turns backend rows into presentation pages for one player.
pub struct PageLoader {
    backend: BackendClient,
    registry: Arc<LeaderboardDefinitionRegistry>,
    player_id: String,
}

impl PageLoader {
    pub fn new(
        backend: BackendClient,
        registry: Arc<LeaderboardDefinitionRegistry>,
        player_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            registry,
            player_id: player_id.into(),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    /// Fetch the window `slot` of `def` from the backend.
    pub async fn load_window(
        &self,
        def: &LeaderboardDefinition,
        slot: PageSlot,
    ) -> Result<LeaderboardResultPage> {
        if slot.friends_only {
            self.load_friends(def, slot).await
        } else {
            self.load_ranked(def, slot).await
        }
    }

    async fn load_ranked(
        &self,
        def: &LeaderboardDefinition,
        slot: PageSlot,
    ) -> Result<LeaderboardResultPage> {
        let fetched = self
            .backend
            .fetch_page(def.id.as_str(), slot.offset, slot.limit)
            .await?;

        let entries = fetched
            .entries
            .into_iter()
            .map(|row| self.entry(def, row))
            .collect();
        let mut page = self.page(def, slot.offset, entries, fetched.total);

        if !page.contains_player(&self.player_id) {
            page.self_entry = self.own_row(def).await;
        }
        Ok(page)
    }

    async fn load_friends(
        &self,
        def: &LeaderboardDefinition,
        slot: PageSlot,
    ) -> Result<LeaderboardResultPage> {
        let fetched = self
            .backend
            .fetch_page(def.id.as_str(), 0, def.max_entries)
            .await?;

        let circle: Vec<LeaderboardEntry> = fetched
            .entries
            .into_iter()
            .filter(|row| row.is_friend || row.player_id == self.player_id)
            .enumerate()
            .map(|(idx, row)| {
                let mut entry = self.entry(def, row);
                entry.rank = idx as u32 + 1;
                entry
            })
            .collect();

        let total = circle.len() as u64;
        let entries = circle
            .into_iter()
            .skip(slot.offset as usize)
            .take(slot.limit as usize)
            .collect();
        Ok(self.page(def, slot.offset, entries, total))
    }

    /// The player's row looked up on its own; lookup failures leave it out.
    async fn own_row(&self, def: &LeaderboardDefinition) -> Option<LeaderboardEntry> {
        let table = def.id.as_str();
        let rank = match self.backend.fetch_player_rank(table, &self.player_id).await {
            Ok(rank) => rank?,
            Err(e) => {
                debug!(definition = table, error = %e, "own rank lookup failed");
                return None;
            }
        };

        match self.backend.fetch_page(table, rank.saturating_sub(1), 1).await {
            Ok(page) => page
                .entries
                .into_iter()
                .find(|row| row.player_id == self.player_id)
                .map(|row| self.entry(def, row)),
            Err(e) => {
                debug!(definition = table, error = %e, "own row lookup failed");
                None
            }
        }
    }

    fn entry(&self, def: &LeaderboardDefinition, row: BackendEntry) -> LeaderboardEntry {
        let decimal = def.statistic.decimal_from_backend(row.score);
        LeaderboardEntry {
            is_self: row.player_id == self.player_id,
            formatted_score: def.format.format(row.score, decimal),
            decimal_score: decimal,
            player_id: row.player_id,
            display_name: row.display_name,
            level: row.level,
            rank: row.rank,
            previous_rank: row.previous_rank,
            score: row.score,
            updated_at: row.updated_at,
            is_friend: row.is_friend,
            category: def.category.clone(),
        }
    }

    fn page(
        &self,
        def: &LeaderboardDefinition,
        offset: u32,
        entries: Vec<LeaderboardEntry>,
        total_entries: u64,
    ) -> LeaderboardResultPage {
        let now = crate::now_millis();
        LeaderboardResultPage {
            definition: def.id.clone(),
            offset,
            entries,
            total_entries,
            refreshed_at: now,
            next_reset_at: def.next_reset_at(now),
            self_entry: None,
        }
    }
}

#[async_trait]
impl PageSource for PageLoader {
    async fn load(&self, key: &DefinitionKey, slot: PageSlot) -> Result<LeaderboardResultPage> {
        let def = self
            .registry
            .find_by_id(key.as_str())
            .ok_or_else(|| RankingError::unknown_definition(key.as_str()))?;
        self.load_window(def, slot).await
    }
}

/// Cache-first query façade over the definitions of one registry.
pub struct RankQueryEngine {
    registry: Arc<LeaderboardDefinitionRegistry>,
    cache: Arc<RankedResultCache>,
    loader: Arc<PageLoader>,
    events: EventBus,
    last_ranks: DashMap<DefinitionKey, i64>,
}

impl RankQueryEngine {
    pub fn new(
        registry: Arc<LeaderboardDefinitionRegistry>,
        cache: Arc<RankedResultCache>,
        loader: Arc<PageLoader>,
        events: EventBus,
    ) -> Self {
        Self {
            registry,
            cache,
            loader,
            events,
            last_ranks: DashMap::new(),
        }
    }

    /// Zero-based page `page` of `id`. A `page_size` of 0 means the
    /// definition's own page size. Unknown definitions yield `None`.
    pub async fn fetch_page(
        &self,
        id: &str,
        page: u32,
        page_size: u32,
        force_refresh: bool,
    ) -> Result<Option<Arc<LeaderboardResultPage>>> {
        let Some(def) = self.registry.find_by_id(id) else {
            return Ok(None);
        };
        let size = effective_size(def, page_size);
        let mut slot = PageSlot::page(page, size);
        if def.scope == Scope::Friends {
            slot = slot.friends();
        }
        self.fetch_slot(def, slot, force_refresh).await.map(Some)
    }

    /// The player's 1-based rank on `id`, `None` when unranked or unknown.
    pub async fn fetch_player_rank(&self, id: &str) -> Result<Option<u32>> {
        let Some(def) = self.registry.find_by_id(id) else {
            return Ok(None);
        };

        let rank = if def.scope == Scope::Friends {
            let view = self.fetch_slot(def, friends_slot(def), false).await?;
            view.own_entry().map(|e| e.rank)
        } else {
            match self.cache.find_self_entry(id) {
                Some(entry) => Some(entry.rank),
                None => {
                    self.loader
                        .backend()
                        .fetch_player_rank(id, self.loader.player_id())
                        .await?
                }
            }
        };

        self.observe_rank(&def.id, rank);
        Ok(rank)
    }

    /// A window of `2 * range + 1` entries around the player. Falls back to
    /// the top page when the player is unranked.
    pub async fn fetch_around_player(
        &self,
        id: &str,
        range: u32,
    ) -> Result<Option<Arc<LeaderboardResultPage>>> {
        let Some(def) = self.registry.find_by_id(id) else {
            return Ok(None);
        };

        let mut slot = match self.fetch_player_rank(id).await? {
            Some(rank) => {
                let offset = rank.saturating_sub(range).saturating_sub(1);
                let limit = range.saturating_mul(2).saturating_add(1).min(def.max_entries.max(1));
                PageSlot::new(offset, limit)
            }
            None => PageSlot::page(0, effective_size(def, 0)),
        };
        if def.scope == Scope::Friends {
            slot = slot.friends();
        }
        self.fetch_slot(def, slot, false).await.map(Some)
    }

    /// Friend and self rows of `id`, densely re-ranked from 1.
    pub async fn fetch_friends_view(&self, id: &str) -> Result<Option<Arc<LeaderboardResultPage>>> {
        let Some(def) = self.registry.find_by_id(id) else {
            return Ok(None);
        };
        self.fetch_slot(def, friends_slot(def), false).await.map(Some)
    }

    /// Forget observed ranks so the next lookup starts fresh.
    pub fn forget_ranks(&self) {
        self.last_ranks.clear();
    }

    async fn fetch_slot(
        &self,
        def: &LeaderboardDefinition,
        slot: PageSlot,
        force_refresh: bool,
    ) -> Result<Arc<LeaderboardResultPage>> {
        let key = def.id.as_str();

        if !force_refresh {
            if let Some(record) = self.cache.get(key, slot) {
                debug!(definition = key, offset = slot.offset, limit = slot.limit, "cache hit");
                return Ok(self.served(record.page, true));
            }
        }
        debug!(definition = key, offset = slot.offset, limit = slot.limit, force_refresh, "cache miss");

        let ticket = self.cache.ticket(key);
        match self.loader.load_window(def, slot).await {
            Ok(page) => {
                let page = Arc::new(page);
                if !self.cache.put_if_current(&def.id, slot, Arc::clone(&page), ticket) {
                    debug!(definition = key, "definition invalidated during fetch, not caching");
                }
                Ok(self.served(page, false))
            }
            Err(e) => match self.cache.peek(key, slot) {
                Some(stale) => {
                    warn!(definition = key, error = %e, "backend unavailable, serving stale page");
                    Ok(self.served(stale.page, true))
                }
                None => {
                    warn!(definition = key, error = %e, "page fetch failed");
                    Err(e)
                }
            },
        }
    }

    fn served(&self, page: Arc<LeaderboardResultPage>, from_cache: bool) -> Arc<LeaderboardResultPage> {
        self.events.emit(LeaderboardEvent::PageFetched {
            page: Arc::clone(&page),
            from_cache,
        });
        page
    }

    fn observe_rank(&self, key: &DefinitionKey, rank: Option<u32>) {
        let new_rank = rank.map(i64::from).unwrap_or(-1);
        let previous = self.last_ranks.insert(key.clone(), new_rank);
        let changed = match previous {
            Some(previous) => previous != new_rank,
            None => new_rank >= 0,
        };
        if changed {
            debug!(definition = %key, ?previous, new_rank, "rank changed");
            self.events.emit(LeaderboardEvent::RankChanged {
                definition: key.clone(),
                new_rank,
            });
        }
    }
}

fn effective_size(def: &LeaderboardDefinition, requested: u32) -> u32 {
    let size = if requested == 0 { def.page_size } else { requested };
    size.min(def.max_entries).max(1)
}

fn friends_slot(def: &LeaderboardDefinition) -> PageSlot {
    PageSlot::new(0, def.max_entries).friends()
}
