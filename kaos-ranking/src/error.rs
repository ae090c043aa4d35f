//! Error types for kaos-ranking.

use thiserror::Error;

use crate::stats::StatisticKind;
use crate::validator::ValidationError;

pub type Result<T> = std::result::Result<T, RankingError>;

/// Errors surfaced by the ranking core.
#[derive(Error, Debug)]
pub enum RankingError {
    #[error("invalid score for {kind}: {reason}")]
    InvalidScore {
        kind: StatisticKind,
        reason: ValidationError,
    },

    #[error("submission rate limit exceeded, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),

    #[error("unknown leaderboard definition: {id}")]
    UnknownDefinition { id: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RankingError {
    pub fn invalid_score(kind: StatisticKind, reason: ValidationError) -> Self {
        Self::InvalidScore { kind, reason }
    }

    pub fn unknown_definition(id: impl Into<String>) -> Self {
        Self::UnknownDefinition { id: id.into() }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::BackendUnavailable(_))
    }
}

/// Errors returned by a [`RankingBackend`](crate::backend::RankingBackend).
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid service url: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}
