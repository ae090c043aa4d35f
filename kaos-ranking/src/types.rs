//! Ranked result types handed to the presentation layer.

use serde::{Deserialize, Serialize};

use crate::definition::DefinitionKey;

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player_id: String,
    pub display_name: String,
    pub level: u32,
    /// 1-based position in the table.
    pub rank: u32,
    /// Rank before the player's last update, 0 when newly ranked.
    pub previous_rank: u32,
    pub score: i64,
    /// Percentage or seconds for decimal statistics, otherwise the score.
    pub decimal_score: f64,
    pub formatted_score: String,
    /// Unix millis.
    pub updated_at: i64,
    pub is_friend: bool,
    pub is_self: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl LeaderboardEntry {
    /// Positive when the player climbed, negative when they dropped.
    pub fn rank_delta(&self) -> Option<i64> {
        if self.previous_rank == 0 {
            None
        } else {
            Some(i64::from(self.previous_rank) - i64::from(self.rank))
        }
    }

    pub fn is_new(&self) -> bool {
        self.previous_rank == 0
    }
}

/// A window of ranked entries from one definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardResultPage {
    pub definition: DefinitionKey,
    /// Zero-based offset of the first entry within the table.
    pub offset: u32,
    pub entries: Vec<LeaderboardEntry>,
    /// Entries across the whole table.
    pub total_entries: u64,
    /// Unix millis of the backend fetch.
    pub refreshed_at: i64,
    pub next_reset_at: Option<i64>,
    /// The player's own row when it is not part of `entries`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_entry: Option<LeaderboardEntry>,
}

impl LeaderboardResultPage {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The player's row, whether inside the window or attached separately.
    pub fn own_entry(&self) -> Option<&LeaderboardEntry> {
        self.entries
            .iter()
            .find(|e| e.is_self)
            .or(self.self_entry.as_ref())
    }

    pub fn contains_player(&self, player_id: &str) -> bool {
        self.entries.iter().any(|e| e.player_id == player_id)
    }
}

/// The `(offset, limit)` window a page was fetched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageSlot {
    pub offset: u32,
    pub limit: u32,
    /// Window over friend and self rows only, re-ranked from 1.
    pub friends_only: bool,
}

impl PageSlot {
    pub const fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit,
            friends_only: false,
        }
    }

    /// Slot of zero-based page `page` with `page_size` entries.
    pub const fn page(page: u32, page_size: u32) -> Self {
        Self::new(page.saturating_mul(page_size), page_size)
    }

    pub const fn friends(self) -> Self {
        Self {
            friends_only: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: u32, previous_rank: u32) -> LeaderboardEntry {
        LeaderboardEntry {
            player_id: format!("p{rank}"),
            display_name: format!("Player {rank}"),
            level: 1,
            rank,
            previous_rank,
            score: 0,
            decimal_score: 0.0,
            formatted_score: "0".into(),
            updated_at: 0,
            is_friend: false,
            is_self: false,
            category: None,
        }
    }

    #[test]
    fn test_rank_delta() {
        assert_eq!(entry(3, 7).rank_delta(), Some(4));
        assert_eq!(entry(7, 3).rank_delta(), Some(-4));
        assert_eq!(entry(5, 0).rank_delta(), None);
        assert!(entry(5, 0).is_new());
    }

    #[test]
    fn test_page_slot() {
        assert_eq!(PageSlot::page(0, 20), PageSlot::new(0, 20));
        assert_eq!(PageSlot::page(3, 20), PageSlot::new(60, 20));
        assert_ne!(PageSlot::page(0, 20).friends(), PageSlot::page(0, 20));
    }

    #[test]
    fn test_own_entry_prefers_window() {
        let mut mine = entry(40, 0);
        mine.is_self = true;
        let page = LeaderboardResultPage {
            definition: crate::definition::DefinitionKey::derive(
                crate::definition::Scope::Global,
                crate::stats::StatisticKind::TotalWins,
                crate::definition::TimeFrame::AllTime,
                None,
            ),
            offset: 0,
            entries: vec![entry(1, 1), entry(2, 2)],
            total_entries: 50,
            refreshed_at: 0,
            next_reset_at: None,
            self_entry: Some(mine.clone()),
        };
        assert_eq!(page.own_entry(), Some(&mine));
        assert!(page.contains_player("p1"));
        assert!(!page.contains_player("p40"));
    }
}
