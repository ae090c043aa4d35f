//! Score submission pipeline.
//!
//! One submission runs: rate limit, validation, local rollup, concurrent
//! upsert into every definition ranking the statistic, then invalidation of
//! the definitions that accepted it. Each definition succeeds or fails on its
//! own; local statistics are never rolled back.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::BackendClient;
use crate::cache::RankedResultCache;
use crate::definition::DefinitionKey;
use crate::error::RankingError;
use crate::events::{EventBus, LeaderboardEvent};
use crate::ratelimit::SubmissionRateLimiter;
use crate::registry::LeaderboardDefinitionRegistry;
use crate::stats::{MatchReport, PlayerStatsAggregator, ScoreInput, StatValue, StatisticKind};
use crate::validator::ScoreValidator;

/// Outcome of the upsert into one definition.
#[derive(Debug)]
pub struct DefinitionResult {
    pub definition: DefinitionKey,
    pub error: Option<RankingError>,
}

impl DefinitionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of submitting one statistic.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub kind: StatisticKind,
    /// Integer sent to the backend.
    pub score: i64,
    /// Rejection before any backend call (rate limit, validation).
    pub error: Option<RankingError>,
    /// Local value after the rollup; `None` when rejected.
    pub stored: Option<StatValue>,
    pub results: Vec<DefinitionResult>,
}

impl SubmissionOutcome {
    fn rejected(kind: StatisticKind, score: i64, error: RankingError) -> Self {
        Self {
            kind,
            score,
            error: Some(error),
            stored: None,
            results: Vec::new(),
        }
    }

    /// At least one definition accepted the score.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.results.iter().any(DefinitionResult::is_success)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &DefinitionKey> {
        self.results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| &r.definition)
    }

    pub fn failed(&self) -> impl Iterator<Item = &DefinitionResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Complete,
    Partial,
    Failed,
}

/// Outcomes of a batch, in statistic order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub outcomes: Vec<SubmissionOutcome>,
}

impl BatchOutcome {
    pub fn status(&self) -> BatchStatus {
        let succeeded = self.outcomes.iter().filter(|o| o.is_success()).count();
        if succeeded == self.outcomes.len() {
            BatchStatus::Complete
        } else if succeeded == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }

    /// Every entry succeeded.
    pub fn is_success(&self) -> bool {
        self.status() == BatchStatus::Complete
    }

    pub fn get(&self, kind: StatisticKind) -> Option<&SubmissionOutcome> {
        self.outcomes.iter().find(|o| o.kind == kind)
    }
}

/// Drives submissions from the game to the ranking backend.
pub struct SubmissionCoordinator {
    registry: Arc<LeaderboardDefinitionRegistry>,
    validator: ScoreValidator,
    limiter: SubmissionRateLimiter,
    stats: Arc<PlayerStatsAggregator>,
    backend: BackendClient,
    cache: Arc<RankedResultCache>,
    events: EventBus,
    player_id: String,
}

impl SubmissionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<LeaderboardDefinitionRegistry>,
        validator: ScoreValidator,
        limiter: SubmissionRateLimiter,
        stats: Arc<PlayerStatsAggregator>,
        backend: BackendClient,
        cache: Arc<RankedResultCache>,
        events: EventBus,
        player_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            validator,
            limiter,
            stats,
            backend,
            cache,
            events,
            player_id: player_id.into(),
        }
    }

    /// Submit one statistic to every definition that ranks it.
    pub async fn submit(&self, kind: StatisticKind, raw: i64, decimal: f64) -> SubmissionOutcome {
        let score = kind.backend_score(raw, decimal);

        let limit = self.limiter.check_with_info(Instant::now());
        if !limit.allowed {
            warn!(%kind, retry_after_ms = limit.retry_after.as_millis() as u64, "submission rate limited");
            return SubmissionOutcome::rejected(
                kind,
                score,
                RankingError::RateLimited {
                    retry_after_ms: limit.retry_after.as_millis() as u64,
                },
            );
        }

        self.submit_admitted(kind, raw, decimal, limit.remaining).await
    }

    /// The pipeline after the rate limit admitted the submission.
    async fn submit_admitted(
        &self,
        kind: StatisticKind,
        raw: i64,
        decimal: f64,
        remaining: u32,
    ) -> SubmissionOutcome {
        let score = kind.backend_score(raw, decimal);

        if let Err(reason) = self.validator.validate(kind, raw, decimal) {
            warn!(%kind, raw, decimal, %reason, "score rejected");
            return SubmissionOutcome::rejected(kind, score, RankingError::invalid_score(kind, reason));
        }

        let stored = self.stats.apply(kind, raw, decimal, crate::now_millis());

        let definitions = self.registry.all_for_statistic(kind);
        if definitions.is_empty() {
            warn!(%kind, "no leaderboard ranks this statistic");
        }

        let calls = definitions.iter().map(|def| async move {
            let result = self
                .backend
                .submit(def.id.as_str(), &self.player_id, score)
                .await;
            (def.id.clone(), result)
        });

        let mut results = Vec::with_capacity(definitions.len());
        for (definition, result) in join_all(calls).await {
            let error = match result {
                Ok(()) => {
                    self.cache.invalidate(definition.as_str());
                    None
                }
                Err(e) => {
                    warn!(%kind, definition = %definition, error = %e, "submission failed");
                    Some(RankingError::from(e))
                }
            };
            results.push(DefinitionResult { definition, error });
        }

        let outcome = SubmissionOutcome {
            kind,
            score,
            error: None,
            stored: Some(stored),
            results,
        };

        if outcome.is_success() {
            info!(
                %kind,
                score,
                definitions = outcome.succeeded().count(),
                remaining,
                "score submitted"
            );
            self.events
                .emit(LeaderboardEvent::ScoreSubmitted { kind, score });
        }
        outcome
    }

    /// Submit each entry in statistic order. Earlier successes stand when
    /// later entries fail.
    pub async fn submit_batch(&self, scores: &BTreeMap<StatisticKind, ScoreInput>) -> BatchOutcome {
        let mut outcomes = Vec::with_capacity(scores.len());
        for (&kind, &(raw, decimal)) in scores {
            outcomes.push(self.submit(kind, raw, decimal).await);
        }
        let batch = BatchOutcome { outcomes };
        debug!(entries = scores.len(), status = ?batch.status(), "batch submitted");
        batch
    }

    /// Derive the submissions of one finished match and send them.
    ///
    /// The match is rate limited as a unit: either every planned submission
    /// fits in the window, or nothing is submitted and local statistics stay
    /// untouched, so the same report can be retried later.
    pub async fn submit_match(&self, report: &MatchReport) -> BatchOutcome {
        let plan = self.stats.plan_match(report);
        let count = plan.submissions.len() as u32;

        let limit = self.limiter.check_many(count, Instant::now());
        if !limit.allowed {
            let retry_after_ms = limit.retry_after.as_millis() as u64;
            warn!(submissions = count, retry_after_ms, "match rate limited");
            let outcomes = plan
                .submissions
                .iter()
                .map(|(&kind, &(raw, decimal))| {
                    SubmissionOutcome::rejected(
                        kind,
                        kind.backend_score(raw, decimal),
                        RankingError::RateLimited { retry_after_ms },
                    )
                })
                .collect();
            return BatchOutcome { outcomes };
        }

        self.stats.set_current_streak(plan.current_win_streak);
        let mut outcomes = Vec::with_capacity(plan.submissions.len());
        for (&kind, &(raw, decimal)) in &plan.submissions {
            outcomes.push(self.submit_admitted(kind, raw, decimal, limit.remaining).await);
        }
        let batch = BatchOutcome { outcomes };
        debug!(submissions = count, status = ?batch.status(), "match submitted");
        batch
    }

    /// Submissions still allowed in the current window.
    pub fn remaining_submissions(&self) -> u32 {
        self.limiter.remaining(Instant::now())
    }

    pub fn reset_rate_limit(&self) {
        self.limiter.reset();
    }
}
