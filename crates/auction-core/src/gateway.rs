// The operations the live console needs from the backend, behind one trait
// so the same controller runs against the HTTP API or an in-process store.

use async_trait::async_trait;

use crate::db::Database;
use crate::error::AuctionResult;
use crate::model::{Player, PlayerUpdate, Team};
use crate::session::SaleRequest;

#[async_trait]
pub trait AuctionGateway: Send + Sync {
    async fn fetch_teams(&self) -> AuctionResult<Vec<Team>>;

    async fn fetch_players(&self) -> AuctionResult<Vec<Player>>;

    /// Run the transaction engine. Returns the team's new remaining budget.
    async fn sell(&self, request: SaleRequest) -> AuctionResult<i64>;

    /// Put a passed player back in the pool.
    async fn mark_unsold(&self, player_id: i64) -> AuctionResult<()>;
}

#[async_trait]
impl AuctionGateway for Database {
    async fn fetch_teams(&self) -> AuctionResult<Vec<Team>> {
        self.list_teams()
    }

    async fn fetch_players(&self) -> AuctionResult<Vec<Player>> {
        self.list_players()
    }

    async fn sell(&self, request: SaleRequest) -> AuctionResult<i64> {
        self.sell_player(request.player_id, request.team_id, request.amount)
    }

    async fn mark_unsold(&self, player_id: i64) -> AuctionResult<()> {
        self.update_player(player_id, &PlayerUpdate::mark_unsold())?;
        Ok(())
    }
}
