//! Runtime configuration of the ranking core.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RankingError, Result};
use crate::ratelimit::RateLimitConfig;
use crate::validator::ValidationLimits;

/// Core configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Identity of the local player on the ranking service.
    pub player_id: String,
    pub display_name: String,
    pub cache_ttl_secs: u64,
    /// Background refresh period; 0 disables the refresh task.
    pub refresh_interval_secs: u64,
    pub backend_timeout_ms: u64,
    pub rate_limit: RateLimitConfig,
    pub validation: ValidationLimits,
    /// Buffered events per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            player_id: String::new(),
            display_name: String::new(),
            cache_ttl_secs: 300,
            refresh_interval_secs: 60,
            backend_timeout_ms: 10_000,
            rate_limit: RateLimitConfig::default(),
            validation: ValidationLimits::default(),
            event_capacity: 256,
        }
    }
}

impl RankingConfig {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_secs = interval.as_secs();
        self
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_validation(mut self, limits: ValidationLimits) -> Self {
        self.validation = limits;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject settings the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.player_id.is_empty() {
            return Err(RankingError::config("player_id must be set"));
        }
        if self.cache_ttl_secs == 0 {
            return Err(RankingError::config("cache_ttl_secs must be positive"));
        }
        if self.backend_timeout_ms == 0 {
            return Err(RankingError::config("backend_timeout_ms must be positive"));
        }
        if self.rate_limit.max_submissions == 0 || self.rate_limit.window_secs == 0 {
            return Err(RankingError::config("rate limit must allow at least one submission per window"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RankingConfig::new("player-1");
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.backend_timeout(), Duration::from_secs(10));
        assert_eq!(config.rate_limit.max_submissions, 10);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.event_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RankingConfig::from_json_str(
            r#"{ "player_id": "p1", "cache_ttl_secs": 30, "rate_limit": { "max_submissions": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.cache_ttl_secs, 30);
        assert_eq!(config.rate_limit.max_submissions, 3);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.backend_timeout_ms, 10_000);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            RankingConfig::from_json_str("{}"),
            Err(RankingError::Config { .. })
        ));
        assert!(matches!(
            RankingConfig::from_json_str(r#"{ "player_id": "p1", "backend_timeout_ms": 0 }"#),
            Err(RankingError::Config { .. })
        ));
        let config = RankingConfig::new("p1").with_refresh_interval(Duration::ZERO);
        assert_eq!(config.refresh_interval(), None);
    }
}
