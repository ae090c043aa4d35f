//! Remote ranking store seam.
//!
//! The core talks to the ranking service only through [`RankingBackend`]:
//!
//! - [`MemoryBackend`]: in-process ranked tables (development, tests)
//! - [`HttpBackend`]: JSON over HTTP (enable with the `http` feature)
//!
//! Every call made by the core goes through [`BackendClient`], which bounds
//! it with a timeout so a hung service fails locally.

mod memory;

#[cfg(feature = "http")]
mod http;

pub use memory::{MemoryBackend, ScoreOperator};

#[cfg(feature = "http")]
pub use http::{HttpBackend, HttpBackendBuilder};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A ranked row as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEntry {
    pub player_id: String,
    pub display_name: String,
    #[serde(default)]
    pub level: u32,
    pub rank: u32,
    #[serde(default)]
    pub previous_rank: u32,
    pub score: i64,
    /// Unix millis.
    pub updated_at: i64,
    #[serde(default)]
    pub is_friend: bool,
}

/// A paged read of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPage {
    pub entries: Vec<BackendEntry>,
    pub total: u64,
}

/// Networked ranking store.
///
/// Submissions are idempotent upserts: resubmitting the same value is safe.
#[async_trait]
pub trait RankingBackend: Send + Sync {
    /// Upsert `player_id`'s score in `table_id`.
    async fn submit(&self, table_id: &str, player_id: &str, score: i64) -> BackendResult<()>;

    /// Read `limit` ranked entries starting at zero-based `offset`.
    async fn fetch_page(&self, table_id: &str, offset: u32, limit: u32) -> BackendResult<BackendPage>;

    /// 1-based rank of `player_id`, `None` when unranked.
    async fn fetch_player_rank(&self, table_id: &str, player_id: &str) -> BackendResult<Option<u32>>;
}

/// Timeout-bounded handle to a backend.
#[derive(Clone)]
pub struct BackendClient {
    backend: Arc<dyn RankingBackend>,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(backend: Arc<dyn RankingBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn submit(&self, table_id: &str, player_id: &str, score: i64) -> BackendResult<()> {
        self.bounded(self.backend.submit(table_id, player_id, score)).await
    }

    pub async fn fetch_page(&self, table_id: &str, offset: u32, limit: u32) -> BackendResult<BackendPage> {
        self.bounded(self.backend.fetch_page(table_id, offset, limit)).await
    }

    pub async fn fetch_player_rank(&self, table_id: &str, player_id: &str) -> BackendResult<Option<u32>> {
        self.bounded(self.backend.fetch_player_rank(table_id, player_id))
            .await
    }

    async fn bounded<T>(&self, call: impl Future<Output = BackendResult<T>>) -> BackendResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        }
    }
}
