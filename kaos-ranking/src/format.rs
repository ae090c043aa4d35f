//! Human-readable score formatting.

use serde::{Deserialize, Serialize};

/// How a score is rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ScoreFormat {
    /// `1234`
    Integer,
    /// `1,234`
    Grouped,
    /// `87.50%` from the decimal score.
    Percentage { decimals: u8 },
    /// `1:05.250` from the decimal score in seconds.
    Duration,
    /// Template with `{score}` and `{decimal}` placeholders, e.g. `"{score} wins"`.
    Template(String),
}

impl Default for ScoreFormat {
    fn default() -> Self {
        Self::Grouped
    }
}

impl ScoreFormat {
    pub fn format(&self, score: i64, decimal: f64) -> String {
        match self {
            ScoreFormat::Integer => score.to_string(),
            ScoreFormat::Grouped => group_thousands(score),
            ScoreFormat::Percentage { decimals } => {
                format!("{:.*}%", *decimals as usize, decimal)
            }
            ScoreFormat::Duration => format_duration(decimal),
            ScoreFormat::Template(template) => template
                .replace("{score}", &group_thousands(score))
                .replace("{decimal}", &format!("{decimal:.2}")),
        }
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "--:--.---".to_string();
    }
    let total_ms = (secs * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    if minutes >= 60 {
        format!("{}:{:02}:{:02}.{:03}", minutes / 60, minutes % 60, seconds, millis)
    } else {
        format!("{minutes}:{seconds:02}.{millis:03}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped() {
        assert_eq!(ScoreFormat::Grouped.format(0, 0.0), "0");
        assert_eq!(ScoreFormat::Grouped.format(999, 0.0), "999");
        assert_eq!(ScoreFormat::Grouped.format(1234, 0.0), "1,234");
        assert_eq!(ScoreFormat::Grouped.format(1234567, 0.0), "1,234,567");
        assert_eq!(ScoreFormat::Grouped.format(-98765, 0.0), "-98,765");
    }

    #[test]
    fn test_percentage_and_duration() {
        assert_eq!(ScoreFormat::Percentage { decimals: 1 }.format(8750, 87.5), "87.5%");
        assert_eq!(ScoreFormat::Duration.format(65_250, 65.25), "1:05.250");
        assert_eq!(ScoreFormat::Duration.format(0, 3725.0), "1:02:05.000");
    }

    #[test]
    fn test_template() {
        let fmt = ScoreFormat::Template("{score} wins".into());
        assert_eq!(fmt.format(1500, 1500.0), "1,500 wins");
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&ScoreFormat::Percentage { decimals: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"percentage","value":{"decimals":2}}"#);
        let parsed: ScoreFormat = serde_json::from_str(r#"{"type":"duration"}"#).unwrap();
        assert_eq!(parsed, ScoreFormat::Duration);
    }
}
