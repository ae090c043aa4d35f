//! Read-only catalog of leaderboard definitions.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::definition::{LeaderboardDefinition, Scope, TimeFrame};
use crate::error::{RankingError, Result};
use crate::format::ScoreFormat;
use crate::stats::StatisticKind;

/// Immutable collection of definitions, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct LeaderboardDefinitionRegistry {
    definitions: Vec<Arc<LeaderboardDefinition>>,
    by_id: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct Catalog {
    leaderboards: Vec<LeaderboardDefinition>,
}

impl LeaderboardDefinitionRegistry {
    /// Build a registry, rejecting duplicate identities.
    pub fn new(definitions: impl IntoIterator<Item = LeaderboardDefinition>) -> Result<Self> {
        let mut registry = Self::default();
        for def in definitions {
            let id = def.id.to_string();
            if registry.by_id.contains_key(&id) {
                return Err(RankingError::config(format!("duplicate leaderboard definition: {id}")));
            }
            registry.by_id.insert(id, registry.definitions.len());
            registry.definitions.push(Arc::new(def));
        }
        Ok(registry)
    }

    /// Parse a catalog of the form `{ "leaderboards": [ ... ] }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        Self::new(catalog.leaderboards)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The catalog shipped with the game.
    pub fn builtin() -> Self {
        let definitions = vec![
            LeaderboardDefinition::new(Scope::Global, StatisticKind::TotalWins, TimeFrame::AllTime)
                .with_title("Most Wins")
                .with_format(ScoreFormat::Template("{score} wins".into())),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::TotalWins, TimeFrame::Week)
                .with_title("Weekly Wins")
                .with_format(ScoreFormat::Template("{score} wins".into())),
            LeaderboardDefinition::new(Scope::Friends, StatisticKind::TotalWins, TimeFrame::AllTime)
                .with_title("Friends: Most Wins"),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::TotalMatches, TimeFrame::AllTime)
                .with_title("Most Matches Played"),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::WinRate, TimeFrame::Season)
                .with_title("Season Win Rate"),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::LongestWinStreak, TimeFrame::AllTime)
                .with_title("Longest Win Streak"),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::BestAccuracy, TimeFrame::AllTime)
                .with_title("Sharpshooters"),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::FastestWin, TimeFrame::AllTime)
                .with_title("Fastest Victory"),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::FastestWin, TimeFrame::Month)
                .with_title("Fastest Victory This Month"),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::HighestDamage, TimeFrame::Day)
                .with_title("Daily Heavy Hitters"),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::TotalKills, TimeFrame::AllTime)
                .with_title("Most Eliminations"),
            LeaderboardDefinition::new(Scope::Global, StatisticKind::TotalScore, TimeFrame::Week)
                .with_title("Weekly Score"),
        ];
        // Builtin identities are distinct by construction.
        Self::new(definitions).unwrap_or_default()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Arc<LeaderboardDefinition>> {
        self.by_id.get(id).map(|&idx| &self.definitions[idx])
    }

    /// Every definition ranking `kind`, regardless of scope or time frame.
    pub fn all_for_statistic(&self, kind: StatisticKind) -> Vec<Arc<LeaderboardDefinition>> {
        self.definitions
            .iter()
            .filter(|def| def.statistic == kind)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LeaderboardDefinition>> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = LeaderboardDefinitionRegistry::builtin();
        assert_eq!(registry.len(), 12);

        let def = registry.find_by_id("global_total_wins_weekly").unwrap();
        assert_eq!(def.statistic, StatisticKind::TotalWins);
        assert!(registry.find_by_id("global_total_wins_yearly").is_none());
    }

    #[test]
    fn test_all_for_statistic_fans_out() {
        let registry = LeaderboardDefinitionRegistry::builtin();
        let ids: Vec<String> = registry
            .all_for_statistic(StatisticKind::TotalWins)
            .iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(
            ids,
            vec![
                "global_total_wins_all_time",
                "global_total_wins_weekly",
                "friends_total_wins_all_time",
            ]
        );
        for kind in StatisticKind::ALL {
            assert!(!registry.all_for_statistic(kind).is_empty(), "{kind} unranked");
        }
        assert!(LeaderboardDefinitionRegistry::default()
            .all_for_statistic(StatisticKind::TotalWins)
            .is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let def = LeaderboardDefinition::new(Scope::Global, StatisticKind::TotalKills, TimeFrame::Day);
        let err = LeaderboardDefinitionRegistry::new([def.clone(), def]).unwrap_err();
        assert!(matches!(err, RankingError::Config { .. }));
    }

    #[test]
    fn test_from_json() {
        let registry = LeaderboardDefinitionRegistry::from_json(
            r#"{ "leaderboards": [
                { "scope": "global", "statistic": "total_wins", "time_frame": "all_time" },
                { "scope": "global", "statistic": "fastest_win", "time_frame": "week",
                  "format": { "type": "duration" } }
            ] }"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.find_by_id("global_fastest_win_weekly").is_some());

        assert!(matches!(
            LeaderboardDefinitionRegistry::from_json("{ not json"),
            Err(RankingError::Json(_))
        ));
    }
}
