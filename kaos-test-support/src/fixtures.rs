//! Seed data for ranking tests.

use kaos_ranking::backend::RankingBackend;
use kaos_ranking::{BackendError, MemoryBackend};

/// Id of the `n`th seeded player, 1-based.
pub fn player_id(n: u32) -> String {
    format!("player-{n:04}")
}

/// Fill `table_id` with `count` players ranked in id order: `player-0001`
/// first with the highest score, one point apart.
pub async fn seed_table(
    backend: &dyn RankingBackend,
    table_id: &str,
    count: u32,
    top_score: i64,
) -> Result<(), BackendError> {
    for n in 1..=count {
        backend
            .submit(table_id, &player_id(n), top_score - i64::from(n) + 1)
            .await?;
    }
    Ok(())
}

/// Give every seeded player a display name and a level.
pub fn register_players(backend: &MemoryBackend, count: u32) {
    for n in 1..=count {
        backend.register_player(&player_id(n), &format!("Player {n}"), 1 + n % 50);
    }
}
