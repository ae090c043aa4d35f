//! # kaos-ranking
//!
//! Client-side leaderboard core for games: validates and rate-limits score
//! submissions, fans them out to every ranking table that tracks the
//! statistic, and serves ranked pages from a TTL cache that a background
//! task keeps warm.
//!
//! ## Features
//!
//! - **Submission pipeline**: plausibility checks, sliding-window rate limit,
//!   concurrent per-table upserts with per-table results
//! - **Ranked queries**: paged, player-centered and friends-only views
//! - **Caching**: per-page TTL records, invalidated on the player's own
//!   submissions, refreshed in the background
//! - **Local statistics**: rolling totals, win rate, streaks, personal bests
//! - **Events**: broadcast channel of submissions, page loads and rank changes
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kaos_ranking::{LeaderboardCore, LeaderboardDefinitionRegistry, MatchReport, RankingConfig};
//! use kaos_ranking::backend::HttpBackend;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = HttpBackend::builder().host("ranking.example.com").use_ssl(true).port(443).build()?;
//! let core = LeaderboardCore::new(
//!     RankingConfig::new("player-1"),
//!     LeaderboardDefinitionRegistry::builtin(),
//!     Arc::new(backend),
//! )?;
//! core.start();
//!
//! core.record_match(&MatchReport { won: true, duration_secs: 312.0, ..Default::default() }).await;
//! let around = core.fetch_around_player("global_total_wins_all_time", 5).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod definition;
pub mod error;
pub mod events;
pub mod format;
pub mod leaderboard;
pub mod query;
pub mod ratelimit;
pub mod registry;
pub mod stats;
pub mod types;
pub mod validator;

#[cfg(feature = "telemetry")]
pub mod telemetry;

// Re-exports
pub use backend::{BackendClient, MemoryBackend, RankingBackend};
pub use cache::{RankedResultCache, RefreshHandle};
pub use config::RankingConfig;
pub use coordinator::{BatchOutcome, BatchStatus, SubmissionCoordinator, SubmissionOutcome};
pub use definition::{DefinitionKey, LeaderboardDefinition, Scope, SortOrder, TimeFrame};
pub use error::{BackendError, RankingError, Result};
pub use events::{EventBus, LeaderboardEvent};
pub use format::ScoreFormat;
pub use leaderboard::LeaderboardCore;
pub use query::RankQueryEngine;
pub use ratelimit::{RateLimitConfig, SubmissionRateLimiter};
pub use registry::LeaderboardDefinitionRegistry;
pub use stats::{MatchReport, PlayerStats, PlayerStatsAggregator, StatValue, StatisticKind};
pub use types::{LeaderboardEntry, LeaderboardResultPage, PageSlot};
pub use validator::{ScoreValidator, ValidationError, ValidationLimits};

#[cfg(feature = "http")]
pub use backend::HttpBackend;

/// Wall-clock unix millis.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
