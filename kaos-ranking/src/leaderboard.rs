//! The explicitly constructed core instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::backend::{BackendClient, RankingBackend};
use crate::cache::{PageSource, RankedResultCache, RefreshHandle};
use crate::config::RankingConfig;
use crate::coordinator::{BatchOutcome, SubmissionCoordinator, SubmissionOutcome};
use crate::error::Result;
use crate::events::{EventBus, LeaderboardEvent};
use crate::query::{PageLoader, RankQueryEngine};
use crate::ratelimit::SubmissionRateLimiter;
use crate::registry::LeaderboardDefinitionRegistry;
use crate::stats::{MatchReport, PlayerStats, PlayerStatsAggregator, ScoreInput, StatisticKind};
use crate::types::LeaderboardResultPage;
use crate::validator::ScoreValidator;

/// Leaderboard core for one signed-in player.
///
/// Owns the cache, the submission pipeline and the query engine. The
/// background refresh runs between [`start`](Self::start) and
/// [`shutdown`](Self::shutdown).
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use kaos_ranking::{LeaderboardCore, LeaderboardDefinitionRegistry, RankingConfig, StatisticKind};
/// use kaos_ranking::backend::MemoryBackend;
///
/// # async fn run() -> kaos_ranking::Result<()> {
/// let registry = LeaderboardDefinitionRegistry::builtin();
/// let backend = Arc::new(MemoryBackend::from_registry(&registry));
/// let core = LeaderboardCore::new(RankingConfig::new("player-1"), registry, backend)?;
/// core.start();
///
/// let outcome = core.submit_score(StatisticKind::TotalWins, 5, 5.0).await;
/// assert!(outcome.is_success());
/// let top = core.fetch_leaderboard("global_total_wins_all_time", 0, 20, false).await?;
///
/// core.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct LeaderboardCore {
    config: RankingConfig,
    registry: Arc<LeaderboardDefinitionRegistry>,
    cache: Arc<RankedResultCache>,
    stats: Arc<PlayerStatsAggregator>,
    loader: Arc<PageLoader>,
    coordinator: SubmissionCoordinator,
    queries: RankQueryEngine,
    events: EventBus,
    refresh: Mutex<Option<RefreshHandle>>,
}

impl LeaderboardCore {
    pub fn new(
        config: RankingConfig,
        registry: LeaderboardDefinitionRegistry,
        backend: Arc<dyn RankingBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(registry);
        let client = BackendClient::new(backend, config.backend_timeout());
        let cache = Arc::new(RankedResultCache::new(config.cache_ttl()));
        let stats = Arc::new(PlayerStatsAggregator::new());
        let events = EventBus::new(config.event_capacity);

        let loader = Arc::new(PageLoader::new(
            client.clone(),
            Arc::clone(&registry),
            config.player_id.clone(),
        ));
        let coordinator = SubmissionCoordinator::new(
            Arc::clone(&registry),
            ScoreValidator::new(config.validation.clone()),
            SubmissionRateLimiter::new(config.rate_limit.clone()),
            Arc::clone(&stats),
            client,
            Arc::clone(&cache),
            events.clone(),
            config.player_id.clone(),
        );
        let queries = RankQueryEngine::new(
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&loader),
            events.clone(),
        );

        info!(
            player = %config.player_id,
            definitions = registry.len(),
            ttl_secs = config.cache_ttl_secs,
            "leaderboard core created"
        );

        Ok(Self {
            config,
            registry,
            cache,
            stats,
            loader,
            coordinator,
            queries,
            events,
            refresh: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn registry(&self) -> &LeaderboardDefinitionRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &RankedResultCache {
        &self.cache
    }

    /// Start the background refresh. Must be called inside a tokio runtime;
    /// calling it again while running is a no-op.
    pub fn start(&self) {
        let Some(interval) = self.config.refresh_interval() else {
            debug!("background refresh disabled");
            return;
        };

        let mut refresh = self.refresh.lock();
        if refresh.as_ref().is_some_and(RefreshHandle::is_running) {
            return;
        }
        let source: Arc<dyn PageSource> = self.loader.clone();
        *refresh = Some(self.cache.spawn_refresh(source, interval));
        info!(interval_secs = interval.as_secs(), "background refresh started");
    }

    pub fn is_running(&self) -> bool {
        self.refresh
            .lock()
            .as_ref()
            .is_some_and(RefreshHandle::is_running)
    }

    /// Stop the background refresh and wait for it to exit.
    pub async fn shutdown(&self) {
        let handle = self.refresh.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
            info!("background refresh stopped");
        }
    }

    pub async fn submit_score(&self, kind: StatisticKind, raw: i64, decimal: f64) -> SubmissionOutcome {
        self.coordinator.submit(kind, raw, decimal).await
    }

    pub async fn submit_batch(&self, scores: &BTreeMap<StatisticKind, ScoreInput>) -> BatchOutcome {
        self.coordinator.submit_batch(scores).await
    }

    /// Fold a finished match into the player's statistics and submit them.
    pub async fn record_match(&self, report: &MatchReport) -> BatchOutcome {
        self.coordinator.submit_match(report).await
    }

    pub async fn fetch_leaderboard(
        &self,
        id: &str,
        page: u32,
        page_size: u32,
        force_refresh: bool,
    ) -> Result<Option<Arc<LeaderboardResultPage>>> {
        self.queries.fetch_page(id, page, page_size, force_refresh).await
    }

    /// 1-based rank, or -1 when unranked or the definition is unknown.
    pub async fn fetch_player_rank(&self, id: &str) -> Result<i64> {
        let rank = self.queries.fetch_player_rank(id).await?;
        Ok(rank.map(i64::from).unwrap_or(-1))
    }

    pub async fn fetch_around_player(
        &self,
        id: &str,
        range: u32,
    ) -> Result<Option<Arc<LeaderboardResultPage>>> {
        self.queries.fetch_around_player(id, range).await
    }

    pub async fn fetch_friends_view(&self, id: &str) -> Result<Option<Arc<LeaderboardResultPage>>> {
        self.queries.fetch_friends_view(id).await
    }

    pub fn player_stats(&self) -> PlayerStats {
        self.stats.snapshot()
    }

    /// Seed local statistics, e.g. from a saved checkpoint.
    pub fn restore_player_stats(&self, snapshot: PlayerStats) {
        self.stats.restore(snapshot);
    }

    pub fn remaining_submissions(&self) -> u32 {
        self.coordinator.remaining_submissions()
    }

    /// Drop cached pages, observed ranks, statistics and rate budget.
    pub fn sign_out(&self) {
        self.cache.clear();
        self.queries.forget_ranks();
        self.stats.restore(PlayerStats::default());
        self.coordinator.reset_rate_limit();
        info!(player = %self.config.player_id, "signed out");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LeaderboardEvent> {
        self.events.subscribe()
    }
}
