//! Domain events pushed to UI subscribers.
//!
//! Delivery is fire-and-forget over a broadcast channel: slow subscribers
//! lag and skip events, they never block the core.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::definition::DefinitionKey;
use crate::stats::StatisticKind;
use crate::types::LeaderboardResultPage;

/// Something the presentation layer may want to react to.
#[derive(Debug, Clone)]
pub enum LeaderboardEvent {
    /// A submission reached at least one ranking table.
    ScoreSubmitted { kind: StatisticKind, score: i64 },
    /// A page was served to a caller.
    PageFetched {
        page: Arc<LeaderboardResultPage>,
        from_cache: bool,
    },
    /// The player's rank on a table differs from the last one observed.
    /// `new_rank` is -1 when the player dropped off the table.
    RankChanged {
        definition: DefinitionKey,
        new_rank: i64,
    },
}

impl LeaderboardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ScoreSubmitted { .. } => "score_submitted",
            Self::PageFetched { .. } => "page_fetched",
            Self::RankChanged { .. } => "rank_changed",
        }
    }
}

/// Cloneable sender side of the event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LeaderboardEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LeaderboardEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers. Returns how many received it.
    pub fn emit(&self, event: LeaderboardEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(event = name, "no subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(
            bus.emit(LeaderboardEvent::ScoreSubmitted {
                kind: StatisticKind::TotalWins,
                score: 1
            }),
            0
        );
    }

    #[test]
    fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        for score in 1..=2 {
            bus.emit(LeaderboardEvent::ScoreSubmitted {
                kind: StatisticKind::TotalKills,
                score,
            });
        }

        match rx.try_recv().unwrap() {
            LeaderboardEvent::ScoreSubmitted { score, .. } => assert_eq!(score, 1),
            other => panic!("unexpected {}", other.name()),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            LeaderboardEvent::ScoreSubmitted { score: 2, .. }
        ));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for score in 0..5 {
            bus.emit(LeaderboardEvent::ScoreSubmitted {
                kind: StatisticKind::TotalScore,
                score,
            });
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(3))));
    }
}
