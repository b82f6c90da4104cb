// Snapshot broadcast from the operator session to projector views.
//
// Last write wins: there is no history, a slow subscriber skips straight to
// the newest snapshot, and a subscriber that joins late sees nothing until
// the next publish.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::model::{Player, Team};

/// What a projector shows: the staged player, the bid, who leads, whether
/// the hammer has fallen and the seconds left.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSnapshot {
    pub staged_player: Option<Player>,
    pub current_bid: i64,
    pub leading_team: Option<Team>,
    pub is_sold: bool,
    pub countdown: u32,
}

/// Wire envelope: `{"type":"UPDATE","payload":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastMessage {
    Update(AuctionSnapshot),
}

impl BroadcastMessage {
    pub fn snapshot(&self) -> &AuctionSnapshot {
        match self {
            BroadcastMessage::Update(snapshot) => snapshot,
        }
    }
}

/// Publishing half. Cheap to clone; every clone feeds the same subscribers.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: watch::Sender<Option<BroadcastMessage>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replace the current snapshot. Never blocks and succeeds with no
    /// subscribers.
    pub fn publish(&self, snapshot: AuctionSnapshot) {
        self.tx.send_replace(Some(BroadcastMessage::Update(snapshot)));
    }

    pub fn subscribe(&self) -> Subscription {
        // A fresh receiver treats the value already in the channel as seen.
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct Subscription {
    rx: watch::Receiver<Option<BroadcastMessage>>,
}

impl Subscription {
    /// Wait for the next snapshot published after the previous call (or
    /// after subscribing). Returns `None` once every broadcaster is gone.
    pub async fn next(&mut self) -> Option<BroadcastMessage> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(message) = self.rx.borrow_and_update().clone() {
                return Some(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn snapshot(bid: i64) -> AuctionSnapshot {
        AuctionSnapshot {
            current_bid: bid,
            countdown: 60,
            ..Default::default()
        }
    }

    #[test]
    fn message_wire_format() {
        let json = serde_json::to_value(BroadcastMessage::Update(snapshot(250_000))).unwrap();
        assert_eq!(json["type"], "UPDATE");
        assert_eq!(json["payload"]["currentBid"], 250_000);
        assert_eq!(json["payload"]["stagedPlayer"], serde_json::Value::Null);
        assert_eq!(json["payload"]["leadingTeam"], serde_json::Value::Null);
        assert_eq!(json["payload"]["isSold"], false);
        assert_eq!(json["payload"]["countdown"], 60);

        let back: BroadcastMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.snapshot().current_bid, 250_000);
    }

    #[test]
    fn publish_without_subscribers_succeeds() {
        let broadcaster = Broadcaster::new();
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.publish(snapshot(1));
    }

    #[tokio::test]
    async fn subscriber_receives_published_snapshot() {
        let broadcaster = Broadcaster::new();
        let mut sub = broadcaster.subscribe();
        broadcaster.publish(snapshot(100));
        assert_eq!(sub.next().await.unwrap().snapshot().current_bid, 100);
    }

    #[tokio::test]
    async fn slow_subscriber_skips_to_latest() {
        let broadcaster = Broadcaster::new();
        let mut sub = broadcaster.subscribe();
        for bid in [100, 200, 300] {
            broadcaster.publish(snapshot(bid));
        }
        assert_eq!(sub.next().await.unwrap().snapshot().current_bid, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn late_subscriber_sees_nothing_until_next_publish() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(snapshot(100));

        let mut late = broadcaster.subscribe();
        let waited = tokio::time::timeout(Duration::from_secs(1), late.next()).await;
        assert!(waited.is_err(), "late subscriber must not replay old state");

        broadcaster.publish(snapshot(200));
        assert_eq!(late.next().await.unwrap().snapshot().current_bid, 200);
    }

    #[tokio::test]
    async fn subscription_ends_when_broadcaster_dropped() {
        let broadcaster = Broadcaster::new();
        let mut sub = broadcaster.subscribe();
        drop(broadcaster);
        assert!(sub.next().await.is_none());
    }
}
