//! Leaderboard definitions.
//!
//! A definition is the static description of one ranking table. Its
//! identity is derived from scope, statistic, time frame and category, and
//! doubles as the cache key and the backend table id.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::format::ScoreFormat;
use crate::stats::{Measure, StatisticKind};

/// Who appears on a leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Friends,
    Regional,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Friends => "friends",
            Scope::Regional => "regional",
        }
    }
}

/// Period a leaderboard accumulates over before resetting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFrame {
    AllTime,
    Season,
    Month,
    Week,
    Day,
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::AllTime => "all_time",
            TimeFrame::Season => "season",
            TimeFrame::Month => "monthly",
            TimeFrame::Week => "weekly",
            TimeFrame::Day => "daily",
        }
    }

    /// Next reset boundary strictly after `now` (unix millis, UTC).
    ///
    /// Days reset at midnight, weeks on Monday midnight, months on the 1st.
    /// Seasons reset at `season_ends_at` when it is still in the future.
    pub fn next_reset_after(&self, now: i64, season_ends_at: Option<i64>) -> Option<i64> {
        let today = DateTime::from_timestamp_millis(now)?.date_naive();
        let next = match self {
            TimeFrame::AllTime => return None,
            TimeFrame::Season => return season_ends_at.filter(|end| *end > now),
            TimeFrame::Day => today.checked_add_days(Days::new(1))?,
            TimeFrame::Week => {
                let until_monday = 7 - u64::from(today.weekday().num_days_from_monday());
                today.checked_add_days(Days::new(until_monday))?
            }
            TimeFrame::Month => {
                let (year, month) = if today.month() == 12 {
                    (today.year() + 1, 1)
                } else {
                    (today.year(), today.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)?
            }
        };
        Some(next.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
    }
}

/// Sort order for leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Higher scores are better.
    Descending,
    /// Lower scores are better (e.g., speedruns).
    Ascending,
}

/// Identity of a leaderboard definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionKey(String);

impl DefinitionKey {
    /// Derive the identity from its defining tuple.
    pub fn derive(
        scope: Scope,
        statistic: StatisticKind,
        time_frame: TimeFrame,
        category: Option<&str>,
    ) -> Self {
        let mut key = format!(
            "{}_{}_{}",
            scope.as_str(),
            statistic.as_str(),
            time_frame.as_str()
        );
        if let Some(category) = category {
            key.push('_');
            key.extend(category.chars().map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            }));
        }
        Self(key)
    }

    /// Wrap an identity taken verbatim from a catalog or the wire.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DefinitionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Static configuration of one ranking table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDefinition")]
pub struct LeaderboardDefinition {
    pub id: DefinitionKey,
    pub title: String,
    pub description: String,
    pub scope: Scope,
    pub statistic: StatisticKind,
    pub time_frame: TimeFrame,
    pub category: Option<String>,
    pub sort_order: SortOrder,
    pub format: ScoreFormat,
    /// Maximum entries the table tracks.
    pub max_entries: u32,
    /// Default page size for queries.
    pub page_size: u32,
    pub auto_reset: bool,
    /// End of the current season, unix millis.
    pub season_ends_at: Option<i64>,
}

impl LeaderboardDefinition {
    pub fn new(scope: Scope, statistic: StatisticKind, time_frame: TimeFrame) -> Self {
        Self::from(RawDefinition {
            scope,
            statistic,
            time_frame,
            ..RawDefinition::default()
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self.id = self.derive_key();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_format(mut self, format: ScoreFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_max_entries(mut self, max_entries: u32) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_season_end(mut self, ends_at: i64) -> Self {
        self.season_ends_at = Some(ends_at);
        self
    }

    pub fn with_auto_reset(mut self, auto_reset: bool) -> Self {
        self.auto_reset = auto_reset;
        self
    }

    /// Next reset instant after `now`, if the table resets at all.
    pub fn next_reset_at(&self, now: i64) -> Option<i64> {
        if !self.auto_reset {
            return None;
        }
        self.time_frame.next_reset_after(now, self.season_ends_at)
    }

    fn derive_key(&self) -> DefinitionKey {
        DefinitionKey::derive(
            self.scope,
            self.statistic,
            self.time_frame,
            self.category.as_deref(),
        )
    }
}

/// Serialized shape of a definition; identity and defaults are derived.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawDefinition {
    title: Option<String>,
    description: String,
    scope: Scope,
    statistic: StatisticKind,
    time_frame: TimeFrame,
    category: Option<String>,
    sort_order: Option<SortOrder>,
    format: Option<ScoreFormat>,
    max_entries: u32,
    page_size: u32,
    auto_reset: Option<bool>,
    season_ends_at: Option<i64>,
}

impl Default for RawDefinition {
    fn default() -> Self {
        Self {
            title: None,
            description: String::new(),
            scope: Scope::Global,
            statistic: StatisticKind::TotalWins,
            time_frame: TimeFrame::AllTime,
            category: None,
            sort_order: None,
            format: None,
            max_entries: 100,
            page_size: 20,
            auto_reset: None,
            season_ends_at: None,
        }
    }
}

impl From<RawDefinition> for LeaderboardDefinition {
    fn from(raw: RawDefinition) -> Self {
        let id = DefinitionKey::derive(
            raw.scope,
            raw.statistic,
            raw.time_frame,
            raw.category.as_deref(),
        );
        let format = raw.format.unwrap_or(match raw.statistic.measure() {
            Measure::Percentage => ScoreFormat::Percentage { decimals: 2 },
            Measure::Duration => ScoreFormat::Duration,
            Measure::Count | Measure::Magnitude => ScoreFormat::Grouped,
        });
        let title = raw.title.unwrap_or_else(|| {
            format!(
                "{} {} ({})",
                raw.scope.as_str(),
                raw.statistic.as_str(),
                raw.time_frame.as_str()
            )
        });

        Self {
            id,
            title,
            description: raw.description,
            scope: raw.scope,
            statistic: raw.statistic,
            time_frame: raw.time_frame,
            category: raw.category,
            sort_order: raw
                .sort_order
                .unwrap_or_else(|| raw.statistic.default_sort_order()),
            format,
            max_entries: raw.max_entries.max(1),
            page_size: raw.page_size.max(1),
            auto_reset: raw
                .auto_reset
                .unwrap_or(raw.time_frame != TimeFrame::AllTime),
            season_ends_at: raw.season_ends_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn millis(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().timestamp_millis()
    }

    #[test]
    fn test_key_derivation() {
        let def = LeaderboardDefinition::new(Scope::Global, StatisticKind::TotalWins, TimeFrame::Week);
        assert_eq!(def.id.as_str(), "global_total_wins_weekly");

        let def = def.with_category("Ranked Solo");
        assert_eq!(def.id.as_str(), "global_total_wins_weekly_ranked_solo");
    }

    #[test]
    fn test_defaults_follow_statistic() {
        let fastest = LeaderboardDefinition::new(Scope::Global, StatisticKind::FastestWin, TimeFrame::AllTime);
        assert_eq!(fastest.sort_order, SortOrder::Ascending);
        assert_eq!(fastest.format, ScoreFormat::Duration);
        assert!(!fastest.auto_reset);

        let accuracy = LeaderboardDefinition::new(Scope::Friends, StatisticKind::BestAccuracy, TimeFrame::Day);
        assert_eq!(accuracy.sort_order, SortOrder::Descending);
        assert!(accuracy.auto_reset);
    }

    #[test]
    fn test_next_reset_daily_weekly_monthly() {
        // Wednesday 2026-10-14 15:00 UTC
        let now = millis(2026, 10, 14, 15);
        assert_eq!(TimeFrame::Day.next_reset_after(now, None), Some(millis(2026, 10, 15, 0)));
        assert_eq!(TimeFrame::Week.next_reset_after(now, None), Some(millis(2026, 10, 19, 0)));
        assert_eq!(TimeFrame::Month.next_reset_after(now, None), Some(millis(2026, 11, 1, 0)));
        assert_eq!(TimeFrame::AllTime.next_reset_after(now, None), None);

        // Monday midnight rolls to the following Monday.
        let monday = millis(2026, 10, 19, 0);
        assert_eq!(TimeFrame::Week.next_reset_after(monday, None), Some(millis(2026, 10, 26, 0)));

        let december = millis(2026, 12, 31, 23);
        assert_eq!(TimeFrame::Month.next_reset_after(december, None), Some(millis(2027, 1, 1, 0)));
    }

    #[test]
    fn test_season_reset() {
        let now = millis(2026, 10, 14, 15);
        let end = millis(2026, 12, 1, 0);
        assert_eq!(TimeFrame::Season.next_reset_after(now, Some(end)), Some(end));
        assert_eq!(TimeFrame::Season.next_reset_after(end + 1, Some(end)), None);

        let def = LeaderboardDefinition::new(Scope::Global, StatisticKind::WinRate, TimeFrame::Season)
            .with_season_end(end);
        assert_eq!(def.next_reset_at(now), Some(end));
        assert_eq!(def.with_auto_reset(false).next_reset_at(now), None);
    }

    #[test]
    fn test_deserialize_derives_identity() {
        let def: LeaderboardDefinition = serde_json::from_str(
            r#"{ "scope": "regional", "statistic": "highest_damage", "time_frame": "month",
                 "category": "eu", "page_size": 50, "title": "EU damage" }"#,
        )
        .unwrap();
        assert_eq!(def.id.as_str(), "regional_highest_damage_monthly_eu");
        assert_eq!(def.page_size, 50);
        assert_eq!(def.title, "EU damage");
        assert_eq!(def.max_entries, 100);
    }
}
