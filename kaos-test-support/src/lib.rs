//! Test harness for kaos-ranking.
//!
//! Wrappers around any [`RankingBackend`](kaos_ranking::RankingBackend):
//!
//! - [`CountingBackend`]: counts calls per operation and table
//! - [`FaultyBackend`]: deterministic failures from a [`FaultPattern`]
//! - [`ChaosBackend`]: random delays and failures
//!
//! plus [`fixtures`] for seeding large tables.

pub mod chaos;
pub mod counting;
pub mod faults;
pub mod fixtures;

pub use chaos::ChaosBackend;
pub use counting::CountingBackend;
pub use faults::{FaultDecision, FaultInjector, FaultPattern, FaultyBackend};
