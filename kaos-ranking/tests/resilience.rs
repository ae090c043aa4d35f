//! Behaviour when the ranking service is slow, flaky or gone.

use std::sync::Arc;
use std::time::Duration;

use kaos_ranking::{
    BackendError, LeaderboardCore, LeaderboardDefinitionRegistry, MemoryBackend, PageSlot,
    RankingBackend, RankingConfig, RankingError, RateLimitConfig, StatisticKind,
};
use kaos_test_support::{fixtures, ChaosBackend, FaultPattern, FaultyBackend};

const WINS: &str = "global_total_wins_all_time";
const TOP: PageSlot = PageSlot::page(0, 20);

struct Harness {
    core: LeaderboardCore,
    memory: Arc<MemoryBackend>,
    faulty: Arc<FaultyBackend>,
}

async fn harness(config: RankingConfig, players: u32) -> Harness {
    let registry = LeaderboardDefinitionRegistry::builtin();
    let memory = Arc::new(MemoryBackend::from_registry(&registry));
    fixtures::seed_table(memory.as_ref(), WINS, players, 10_000)
        .await
        .unwrap();
    let faulty = Arc::new(FaultyBackend::new(memory.clone(), FaultPattern::None));
    let core = LeaderboardCore::new(config, registry, faulty.clone()).unwrap();
    Harness {
        core,
        memory,
        faulty,
    }
}

#[tokio::test(start_paused = true)]
async fn hung_backend_surfaces_timeout() {
    let config = RankingConfig::new("me").with_backend_timeout(Duration::from_secs(2));
    let h = harness(config, 10).await;
    h.faulty.set_pattern(FaultPattern::Hang);

    let started = tokio::time::Instant::now();
    let err = h.core.fetch_leaderboard(WINS, 0, 20, false).await.unwrap_err();
    assert!(matches!(err, RankingError::BackendUnavailable(BackendError::Timeout)));
    assert!(started.elapsed() >= Duration::from_secs(2));

    let outcome = h.core.submit_score(StatisticKind::TotalWins, 1, 1.0).await;
    assert!(!outcome.is_success());
    assert!(outcome.results.iter().all(|r| matches!(
        r.error,
        Some(RankingError::BackendUnavailable(BackendError::Timeout))
    )));
}

#[tokio::test(start_paused = true)]
async fn stale_page_served_while_offline() {
    let h = harness(RankingConfig::new("me"), 30).await;
    let fresh = h.core.fetch_leaderboard(WINS, 0, 20, false).await.unwrap().unwrap();

    h.faulty.go_offline();
    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(h.core.cache().get(WINS, TOP).is_none());

    let stale = h.core.fetch_leaderboard(WINS, 0, 20, false).await.unwrap().unwrap();
    assert_eq!(stale.entries, fresh.entries);

    let forced = h.core.fetch_leaderboard(WINS, 0, 20, true).await.unwrap().unwrap();
    assert_eq!(forced.entries, fresh.entries);

    // Nothing cached for page 2, so the failure surfaces.
    let err = h.core.fetch_leaderboard(WINS, 1, 20, false).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test(start_paused = true)]
async fn failed_submission_keeps_local_stats() {
    let h = harness(RankingConfig::new("me"), 0).await;
    h.faulty
        .set_pattern(FaultPattern::Tables {
            tables: [WINS.to_string()].into(),
        });

    let outcome = h.core.submit_score(StatisticKind::TotalWins, 3, 3.0).await;
    // The weekly and friends tables still accepted it.
    assert!(outcome.is_success());
    assert_eq!(outcome.failed().count(), 1);
    assert_eq!(h.memory.score_of(WINS, "me"), None);
    assert_eq!(h.memory.score_of("global_total_wins_weekly", "me"), Some(3));

    h.faulty.go_offline();
    let outcome = h.core.submit_score(StatisticKind::TotalWins, 4, 4.0).await;
    assert!(!outcome.is_success());
    assert_eq!(h.core.player_stats().raw(StatisticKind::TotalWins), 4);
}

#[tokio::test(start_paused = true)]
async fn background_refresh_picks_up_remote_changes() {
    let h = harness(RankingConfig::new("me"), 10).await;
    h.core.start();
    h.core.fetch_leaderboard(WINS, 0, 20, false).await.unwrap();

    // Another player climbs without this client submitting anything.
    h.memory.submit(WINS, "rival", 99_999).await.unwrap();
    tokio::time::sleep(Duration::from_secs(61)).await;

    let page = h.core.cache().get(WINS, TOP).unwrap().page;
    assert_eq!(page.entries[0].player_id, "rival");
    assert_eq!(page.total_entries, 11);
    assert_eq!(h.core.remaining_submissions(), 10);

    h.core.shutdown().await;
    assert!(!h.core.is_running());
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_keeps_stale_record() {
    let h = harness(RankingConfig::new("me"), 10).await;
    h.core.start();
    let cached = h.core.fetch_leaderboard(WINS, 0, 20, false).await.unwrap().unwrap();

    h.faulty.go_offline();
    tokio::time::sleep(Duration::from_secs(125)).await;

    let record = h.core.cache().peek(WINS, TOP).unwrap();
    assert!(Arc::ptr_eq(&record.page, &cached));
    assert!(h.faulty.stats().faults >= 2);

    h.faulty.restore();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!Arc::ptr_eq(&h.core.cache().peek(WINS, TOP).unwrap().page, &cached));

    h.core.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn chaos_never_corrupts_results() {
    let registry = LeaderboardDefinitionRegistry::builtin();
    let memory = Arc::new(MemoryBackend::from_registry(&registry));
    fixtures::seed_table(memory.as_ref(), WINS, 200, 10_000)
        .await
        .unwrap();
    let chaos = Arc::new(
        ChaosBackend::aggressive(memory.clone()).with_delay_range(50, 3_000),
    );
    let config = RankingConfig::new("me")
        .with_backend_timeout(Duration::from_secs(2))
        .with_rate_limit(RateLimitConfig::new(1_000));
    let core = LeaderboardCore::new(config, registry, chaos.clone()).unwrap();

    for wins in 1..=50 {
        let outcome = core.submit_score(StatisticKind::TotalWins, wins, wins as f64).await;
        for result in &outcome.results {
            if let Some(err) = &result.error {
                assert!(err.is_transient(), "unexpected {err}");
            }
        }

        match core.fetch_leaderboard(WINS, 0, 20, wins % 5 == 0).await {
            Ok(page) => {
                let page = page.unwrap();
                let ranks: Vec<u32> = page.entries.iter().map(|e| e.rank).collect();
                assert!(ranks.windows(2).all(|w| w[0] < w[1]));
            }
            Err(err) => assert!(err.is_transient()),
        }
    }

    assert_eq!(core.player_stats().raw(StatisticKind::TotalWins), 50);
    assert!(chaos.events_triggered() > 0);
}
