//! Statistic kinds and the player's own rolling statistics.
//!
//! The aggregator keeps the locally authoritative view of the player's
//! totals. It can plan the submissions a finished match implies, but the
//! values themselves only change through the submission coordinator.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::definition::SortOrder;

/// The metric a leaderboard ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    TotalWins,
    TotalMatches,
    WinRate,
    LongestWinStreak,
    BestAccuracy,
    FastestWin,
    HighestDamage,
    TotalKills,
    TotalScore,
}

/// What the numbers of a statistic mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// Plain counter, raw score is authoritative.
    Count,
    /// Decimal score in `[0, 100]`.
    Percentage,
    /// Decimal score in seconds, lower is better.
    Duration,
    /// Raw score from a single match, bounded by a ceiling.
    Magnitude,
}

/// How a newly submitted value combines with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Submitted value is the new running total.
    Replace,
    /// Keep whichever value ranks better.
    Best,
}

impl StatisticKind {
    pub const ALL: [StatisticKind; 9] = [
        StatisticKind::TotalWins,
        StatisticKind::TotalMatches,
        StatisticKind::WinRate,
        StatisticKind::LongestWinStreak,
        StatisticKind::BestAccuracy,
        StatisticKind::FastestWin,
        StatisticKind::HighestDamage,
        StatisticKind::TotalKills,
        StatisticKind::TotalScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKind::TotalWins => "total_wins",
            StatisticKind::TotalMatches => "total_matches",
            StatisticKind::WinRate => "win_rate",
            StatisticKind::LongestWinStreak => "longest_win_streak",
            StatisticKind::BestAccuracy => "best_accuracy",
            StatisticKind::FastestWin => "fastest_win",
            StatisticKind::HighestDamage => "highest_damage",
            StatisticKind::TotalKills => "total_kills",
            StatisticKind::TotalScore => "total_score",
        }
    }

    pub fn measure(&self) -> Measure {
        match self {
            StatisticKind::WinRate | StatisticKind::BestAccuracy => Measure::Percentage,
            StatisticKind::FastestWin => Measure::Duration,
            StatisticKind::HighestDamage => Measure::Magnitude,
            _ => Measure::Count,
        }
    }

    pub fn aggregation(&self) -> Aggregation {
        match self {
            StatisticKind::LongestWinStreak
            | StatisticKind::BestAccuracy
            | StatisticKind::FastestWin
            | StatisticKind::HighestDamage => Aggregation::Best,
            _ => Aggregation::Replace,
        }
    }

    /// Natural ranking direction of the statistic.
    pub fn default_sort_order(&self) -> SortOrder {
        match self.measure() {
            Measure::Duration => SortOrder::Ascending,
            _ => SortOrder::Descending,
        }
    }

    /// Integer the backend ranks on.
    ///
    /// Percentages travel as hundredths of a percent and durations as
    /// milliseconds so that the backend only ever sees integers.
    pub fn backend_score(&self, raw: i64, decimal: f64) -> i64 {
        match self.measure() {
            Measure::Percentage => (decimal * 100.0).round() as i64,
            Measure::Duration => (decimal * 1000.0).round() as i64,
            Measure::Count | Measure::Magnitude => raw,
        }
    }

    /// Inverse of [`backend_score`](Self::backend_score) for the decimal part.
    pub fn decimal_from_backend(&self, score: i64) -> f64 {
        match self.measure() {
            Measure::Percentage => score as f64 / 100.0,
            Measure::Duration => score as f64 / 1000.0,
            Measure::Count | Measure::Magnitude => score as f64,
        }
    }

    /// Whether `candidate` ranks strictly better than `current`.
    pub fn is_improvement(&self, candidate: &StatValue, current: &StatValue) -> bool {
        match self.measure() {
            Measure::Percentage | Measure::Duration => match self.default_sort_order() {
                SortOrder::Descending => candidate.decimal > current.decimal,
                SortOrder::Ascending => candidate.decimal < current.decimal,
            },
            Measure::Count | Measure::Magnitude => match self.default_sort_order() {
                SortOrder::Descending => candidate.raw > current.raw,
                SortOrder::Ascending => candidate.raw < current.raw,
            },
        }
    }
}

impl fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatisticKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatisticKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown statistic kind: {s}"))
    }
}

/// A raw/decimal score pair as submitted by the game.
pub type ScoreInput = (i64, f64);

/// One statistic's current value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatValue {
    pub raw: i64,
    pub decimal: f64,
    /// Unix millis of the last change.
    pub updated_at: i64,
}

/// The player's rolling totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub values: BTreeMap<StatisticKind, StatValue>,
    /// Consecutive wins up to the last recorded match.
    #[serde(default)]
    pub current_win_streak: u32,
}

impl PlayerStats {
    pub fn get(&self, kind: StatisticKind) -> Option<&StatValue> {
        self.values.get(&kind)
    }

    /// Raw value of `kind`, zero when never recorded.
    pub fn raw(&self, kind: StatisticKind) -> i64 {
        self.values.get(&kind).map(|v| v.raw).unwrap_or(0)
    }

    /// Win rate in percent, derived from wins and matches.
    pub fn win_rate(&self) -> f64 {
        let matches = self.raw(StatisticKind::TotalMatches);
        if matches <= 0 {
            return 0.0;
        }
        let wins = self.raw(StatisticKind::TotalWins).min(matches);
        wins as f64 / matches as f64 * 100.0
    }
}

/// Outcome of one finished match, as reported by the game.
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    pub won: bool,
    pub duration_secs: f64,
    pub kills: u32,
    pub damage: i64,
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub score: i64,
}

/// Submissions implied by a match report.
#[derive(Debug, Clone, Default)]
pub struct MatchPlan {
    pub submissions: BTreeMap<StatisticKind, ScoreInput>,
    pub current_win_streak: u32,
}

/// Thread-safe holder of the player's [`PlayerStats`].
#[derive(Debug, Default)]
pub struct PlayerStatsAggregator {
    stats: RwLock<PlayerStats>,
}

impl PlayerStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(stats: PlayerStats) -> Self {
        Self {
            stats: RwLock::new(stats),
        }
    }

    pub fn snapshot(&self) -> PlayerStats {
        self.stats.read().clone()
    }

    pub fn get(&self, kind: StatisticKind) -> Option<StatValue> {
        self.stats.read().get(kind).copied()
    }

    /// Replace all values, e.g. after loading a persisted checkpoint.
    pub fn restore(&self, stats: PlayerStats) {
        *self.stats.write() = stats;
    }

    /// Fold a validated submission into the local rollups.
    pub(crate) fn apply(&self, kind: StatisticKind, raw: i64, decimal: f64, now: i64) -> StatValue {
        let candidate = StatValue {
            raw,
            decimal,
            updated_at: now,
        };

        let mut stats = self.stats.write();
        let stored = match (kind.aggregation(), stats.values.get(&kind)) {
            (Aggregation::Best, Some(current)) if !kind.is_improvement(&candidate, current) => {
                *current
            }
            _ => {
                stats.values.insert(kind, candidate);
                candidate
            }
        };

        if matches!(kind, StatisticKind::TotalWins | StatisticKind::TotalMatches) {
            let rate = stats.win_rate();
            stats.values.insert(
                StatisticKind::WinRate,
                StatValue {
                    raw: rate.round() as i64,
                    decimal: rate,
                    updated_at: now,
                },
            );
        }

        stored
    }

    pub(crate) fn set_current_streak(&self, streak: u32) {
        self.stats.write().current_win_streak = streak;
    }

    /// Compute the submissions a finished match implies without applying them.
    pub fn plan_match(&self, report: &MatchReport) -> MatchPlan {
        let stats = self.stats.read();
        let mut submissions = BTreeMap::new();

        let matches = stats.raw(StatisticKind::TotalMatches) + 1;
        submissions.insert(StatisticKind::TotalMatches, (matches, matches as f64));

        let mut wins = stats.raw(StatisticKind::TotalWins);
        let streak = if report.won {
            wins += 1;
            submissions.insert(StatisticKind::TotalWins, (wins, wins as f64));
            stats.current_win_streak + 1
        } else {
            0
        };

        if streak as i64 > stats.raw(StatisticKind::LongestWinStreak) {
            submissions.insert(StatisticKind::LongestWinStreak, (streak as i64, streak as f64));
        }

        let rate = wins.min(matches) as f64 / matches as f64 * 100.0;
        submissions.insert(StatisticKind::WinRate, (rate.round() as i64, rate));

        if report.won && report.duration_secs > 0.0 {
            let candidate = StatValue {
                raw: (report.duration_secs * 1000.0).round() as i64,
                decimal: report.duration_secs,
                updated_at: 0,
            };
            if improves(&stats, StatisticKind::FastestWin, &candidate) {
                submissions.insert(StatisticKind::FastestWin, (candidate.raw, candidate.decimal));
            }
        }

        if report.shots_fired > 0 {
            let hits = report.shots_hit.min(report.shots_fired);
            let accuracy = hits as f64 / report.shots_fired as f64 * 100.0;
            let candidate = StatValue {
                raw: accuracy.round() as i64,
                decimal: accuracy,
                updated_at: 0,
            };
            if improves(&stats, StatisticKind::BestAccuracy, &candidate) {
                submissions.insert(StatisticKind::BestAccuracy, (candidate.raw, accuracy));
            }
        }

        if report.damage > 0 {
            let candidate = StatValue {
                raw: report.damage,
                decimal: report.damage as f64,
                updated_at: 0,
            };
            if improves(&stats, StatisticKind::HighestDamage, &candidate) {
                submissions.insert(StatisticKind::HighestDamage, (report.damage, report.damage as f64));
            }
        }

        if report.kills > 0 {
            let kills = stats.raw(StatisticKind::TotalKills) + report.kills as i64;
            submissions.insert(StatisticKind::TotalKills, (kills, kills as f64));
        }

        if report.score > 0 {
            let total = stats.raw(StatisticKind::TotalScore) + report.score;
            submissions.insert(StatisticKind::TotalScore, (total, total as f64));
        }

        MatchPlan {
            submissions,
            current_win_streak: streak,
        }
    }
}

fn improves(stats: &PlayerStats, kind: StatisticKind, candidate: &StatValue) -> bool {
    stats
        .get(kind)
        .map_or(true, |current| kind.is_improvement(candidate, current))
}
