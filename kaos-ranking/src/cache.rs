//! Time-bounded cache of ranked result pages.
//!
//! Pages are grouped per definition and keyed by their [`PageSlot`]. A record
//! is served while its age is strictly below the TTL. Invalidation drops every
//! page of a definition at once.
//!
//! A background task periodically re-fetches every page that was read within
//! the last TTL. Pages nobody read for a whole TTL are evicted by that pass
//! instead of being refreshed forever. Failed refreshes keep the previous
//! record, so readers may see stale pages while the backend is down.
//!
//! Every mutation bumps a per-definition generation. Writers that fetched
//! before an invalidation hold an outdated [`CacheTicket`] and their page is
//! discarded instead of resurrecting pre-submission data.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::definition::DefinitionKey;
use crate::error::Result;
use crate::types::{LeaderboardEntry, LeaderboardResultPage, PageSlot};

/// A cached page, the instant it was fetched and the instant it was last read.
#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub page: Arc<LeaderboardResultPage>,
    pub fetched_at: Instant,
    pub last_used: Instant,
}

impl CacheRecord {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) < ttl
    }

    /// Whether a reader asked for this page within the last `ttl`.
    pub fn in_use(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_used) < ttl
    }
}

/// Snapshot of a definition's generation, taken before a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTicket {
    epoch: u64,
    generation: u64,
}

#[derive(Default)]
struct CacheState {
    records: HashMap<DefinitionKey, HashMap<PageSlot, CacheRecord>>,
    generations: HashMap<DefinitionKey, u64>,
    // bumped by clear()
    epoch: u64,
}

impl CacheState {
    fn ticket(&self, key: &str) -> CacheTicket {
        CacheTicket {
            epoch: self.epoch,
            generation: self.generations.get(key).copied().unwrap_or(0),
        }
    }
}

/// Loads a single page from the backend; used by the refresh task.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn load(&self, key: &DefinitionKey, slot: PageSlot) -> Result<LeaderboardResultPage>;
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub refreshed: usize,
    pub failed: usize,
    /// Pages dropped because nobody read them for a whole TTL.
    pub evicted: usize,
    /// Pages dropped because their definition was invalidated mid-fetch.
    pub discarded: usize,
}

/// TTL cache from definition identity to its fetched pages.
pub struct RankedResultCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl RankedResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh record for `slot` of `key`, if any.
    pub fn get(&self, key: &str, slot: PageSlot) -> Option<CacheRecord> {
        self.get_at(key, slot, Instant::now())
    }

    pub fn get_at(&self, key: &str, slot: PageSlot, now: Instant) -> Option<CacheRecord> {
        let mut state = self.state.lock();
        let record = state
            .records
            .get_mut(key)
            .and_then(|pages| pages.get_mut(&slot))
            .filter(|record| record.is_fresh(now, self.ttl))?;
        record.last_used = now;
        Some(record.clone())
    }

    /// Record for `slot` of `key` regardless of age.
    pub fn peek(&self, key: &str, slot: PageSlot) -> Option<CacheRecord> {
        let state = self.state.lock();
        state
            .records
            .get(key)
            .and_then(|pages| pages.get(&slot))
            .cloned()
    }

    /// Store `page`, overwriting any prior record for the slot.
    pub fn put(&self, key: &DefinitionKey, slot: PageSlot, page: Arc<LeaderboardResultPage>) {
        self.put_at(key, slot, page, Instant::now());
    }

    pub fn put_at(
        &self,
        key: &DefinitionKey,
        slot: PageSlot,
        page: Arc<LeaderboardResultPage>,
        now: Instant,
    ) {
        let mut state = self.state.lock();
        insert(&mut state, key, slot, page, now, now);
    }

    /// Generation snapshot to pair with a later [`put_if_current`](Self::put_if_current).
    pub fn ticket(&self, key: &str) -> CacheTicket {
        self.state.lock().ticket(key)
    }

    /// Store `page` unless `key` was invalidated or the cache cleared since `ticket`.
    pub fn put_if_current(
        &self,
        key: &DefinitionKey,
        slot: PageSlot,
        page: Arc<LeaderboardResultPage>,
        ticket: CacheTicket,
    ) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.ticket(key.as_str()) != ticket {
            return false;
        }
        insert(&mut state, key, slot, page, now, now);
        true
    }

    /// Like [`put_if_current`](Self::put_if_current) but keeps the slot's
    /// last read instant. Returns `false` when the slot is gone.
    fn refresh_if_current(
        &self,
        key: &DefinitionKey,
        slot: PageSlot,
        page: Arc<LeaderboardResultPage>,
        ticket: CacheTicket,
    ) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.ticket(key.as_str()) != ticket {
            return false;
        }
        match state
            .records
            .get_mut(key.as_str())
            .and_then(|pages| pages.get_mut(&slot))
        {
            Some(record) => {
                record.page = page;
                record.fetched_at = now;
                true
            }
            None => false,
        }
    }

    /// Drop every page of `key`. Returns whether anything was cached.
    ///
    /// The generation moves even when nothing is cached, so a fetch that
    /// started before this call cannot store its page afterwards.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        *state
            .generations
            .entry(DefinitionKey::from_id(key))
            .or_insert(0) += 1;
        let removed = state.records.remove(key).is_some();
        if removed {
            debug!(definition = key, "cache invalidated");
        }
        removed
    }

    /// Drop everything, e.g. on sign-out.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.generations.clear();
        state.epoch += 1;
    }

    /// The player's own row from any fresh ranked page of `key`.
    /// Friends-only windows carry re-ranked rows and are skipped.
    pub fn find_self_entry(&self, key: &str) -> Option<LeaderboardEntry> {
        let now = Instant::now();
        let state = self.state.lock();
        state.records.get(key).and_then(|pages| {
            pages
                .iter()
                .filter(|(slot, record)| !slot.friends_only && record.is_fresh(now, self.ttl))
                .find_map(|(_, record)| record.page.own_entry().cloned())
        })
    }

    /// Every cached `(definition, slot)` pair.
    pub fn slots(&self) -> Vec<(DefinitionKey, PageSlot)> {
        let state = self.state.lock();
        state
            .records
            .iter()
            .flat_map(|(key, pages)| pages.keys().map(move |slot| (key.clone(), *slot)))
            .collect()
    }

    /// Number of cached pages.
    pub fn len(&self) -> usize {
        self.state.lock().records.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop pages nobody read within the last TTL. Returns how many went.
    pub fn evict_unused(&self) -> usize {
        self.evict_unused_at(Instant::now())
    }

    pub fn evict_unused_at(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut state = self.state.lock();
        let mut evicted = 0;
        state.records.retain(|_, pages| {
            let before = pages.len();
            pages.retain(|_, record| record.in_use(now, ttl));
            evicted += before - pages.len();
            !pages.is_empty()
        });
        evicted
    }

    /// Evict unused pages, then re-fetch every remaining page once.
    pub async fn refresh_all(&self, source: &dyn PageSource) -> RefreshStats {
        let evicted = self.evict_unused();
        let targets: Vec<_> = {
            let state = self.state.lock();
            state
                .records
                .iter()
                .flat_map(|(key, pages)| {
                    let ticket = state.ticket(key.as_str());
                    pages.keys().map(move |slot| (key.clone(), *slot, ticket))
                })
                .collect()
        };

        let mut stats = RefreshStats {
            evicted,
            ..RefreshStats::default()
        };
        for (key, slot, ticket) in targets {
            match source.load(&key, slot).await {
                Ok(page) => {
                    if self.refresh_if_current(&key, slot, Arc::new(page), ticket) {
                        stats.refreshed += 1;
                    } else {
                        stats.discarded += 1;
                    }
                }
                Err(e) => {
                    warn!(definition = %key, offset = slot.offset, error = %e, "refresh failed, keeping stale page");
                    stats.failed += 1;
                }
            }
        }
        stats
    }

    /// Start the periodic refresh task. The first pass runs one `interval` from now.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        source: Arc<dyn PageSource>,
        interval: Duration,
    ) -> RefreshHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = cache.refresh_all(source.as_ref()).await;
                        debug!(
                            refreshed = stats.refreshed,
                            failed = stats.failed,
                            discarded = stats.discarded,
                            evicted = stats.evicted,
                            "cache refresh tick"
                        );
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("cache refresh stopped");
        });

        RefreshHandle { shutdown, task }
    }
}

fn insert(
    state: &mut CacheState,
    key: &DefinitionKey,
    slot: PageSlot,
    page: Arc<LeaderboardResultPage>,
    fetched_at: Instant,
    last_used: Instant,
) {
    state.records.entry(key.clone()).or_default().insert(
        slot,
        CacheRecord {
            page,
            fetched_at,
            last_used,
        },
    );
}

/// Owner of the background refresh task.
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the task and wait for it to finish its current pass.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
