// Transaction engine: the one place a player changes hands.

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::{info, warn};

use crate::db::{load_player, Database};
use crate::error::{AuctionError, AuctionResult, Entity};
use crate::model::PlayerStatus;

impl Database {
    /// Sell `player_id` to `team_id` for `amount`, debiting the team's
    /// remaining budget. Both writes commit together or not at all.
    ///
    /// The transaction is `IMMEDIATE`, so it takes the write lock before
    /// reading the budget; a concurrent seller on another connection waits
    /// (up to `busy_timeout`) and then sees this sale's debit.
    ///
    /// Returns the team's new remaining budget.
    pub fn sell_player(&self, player_id: i64, team_id: i64, amount: i64) -> AuctionResult<i64> {
        if amount <= 0 {
            return Err(AuctionError::validation(format!(
                "sale amount must be positive, got {amount}"
            )));
        }

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let available: i64 = tx
            .query_row(
                "SELECT remainingBudget FROM teams WHERE id = ?1",
                params![team_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| AuctionError::not_found(Entity::Team, team_id))?;

        let player = load_player(&tx, player_id)?;
        if player.status != PlayerStatus::Unsold {
            return Err(AuctionError::PlayerUnavailable {
                player_id,
                status: player.status,
            });
        }

        if amount > available {
            warn!(player_id, team_id, amount, available, "sale rejected: insufficient funds");
            return Err(AuctionError::InsufficientFunds {
                attempted: amount,
                available,
            });
        }

        tx.execute(
            "UPDATE players SET status = ?1, soldPrice = ?2, soldToTeamId = ?3 WHERE id = ?4",
            params![PlayerStatus::Sold.as_str(), amount, team_id, player_id],
        )?;
        let remaining = available - amount;
        tx.execute(
            "UPDATE teams SET remainingBudget = ?1 WHERE id = ?2",
            params![remaining, team_id],
        )?;
        tx.commit()?;

        info!(player_id, team_id, amount, remaining, "player sold");
        Ok(remaining)
    }
}
