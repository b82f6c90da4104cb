// Client-side copy of the teams and players lists.
//
// Refetched wholesale after every mutation. A failed fetch keeps the last
// good data and records a banner message instead of failing the caller.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::AuctionResult;
use crate::gateway::AuctionGateway;
use crate::model::{Player, PlayerStatus, Team};

/// Result of one fetch of both lists.
pub type Fetched = AuctionResult<(Vec<Team>, Vec<Player>)>;

#[derive(Debug, Clone, Default)]
pub struct DataCache {
    teams: Vec<Team>,
    players: Vec<Player>,
    error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch teams and players concurrently.
    pub async fn fetch(gateway: &dyn AuctionGateway) -> Fetched {
        tokio::try_join!(gateway.fetch_teams(), gateway.fetch_players())
    }

    /// Store a fetch result. Returns whether fresh data was applied.
    pub fn apply(&mut self, fetched: Fetched) -> bool {
        match fetched {
            Ok((teams, players)) => {
                self.teams = teams;
                self.players = players;
                self.error = None;
                self.refreshed_at = Some(Utc::now());
                true
            }
            Err(e) => {
                warn!("Refresh failed: {e}");
                self.error = Some(e.to_string());
                false
            }
        }
    }

    pub async fn refresh(&mut self, gateway: &dyn AuctionGateway) -> bool {
        let fetched = Self::fetch(gateway).await;
        self.apply(fetched)
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Banner text for the last failure, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn team(&self, id: i64) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn player(&self, id: i64) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Players still waiting to be auctioned.
    pub fn unsold(&self) -> impl Iterator<Item = &Player> {
        self.players
            .iter()
            .filter(|p| p.status == PlayerStatus::Unsold)
    }
}
