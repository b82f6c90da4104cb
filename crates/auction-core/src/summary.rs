// Dashboard statistics derived from the current teams and players.

use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::AuctionResult;
use crate::model::{Player, PlayerRole, PlayerStatus, Team};

const TOP_BUYS: usize = 5;
const RECENT_SALES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSummary {
    pub total_spent: i64,
    pub players_sold: usize,
    pub players_unsold: usize,
    pub players_pending: usize,
    /// Most expensive sales, highest first.
    pub top_buys: Vec<Player>,
    /// Latest sales by player id, newest first.
    pub recent_sales: Vec<Player>,
    pub role_stats: Vec<RoleStat>,
    pub team_spend: Vec<TeamSpend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleStat {
    pub role: PlayerRole,
    pub count: usize,
    pub sold_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSpend {
    pub team_id: i64,
    pub name: String,
    pub spent: i64,
    pub budget: i64,
    pub remaining_budget: i64,
}

impl AuctionSummary {
    pub fn compute(teams: &[Team], players: &[Player]) -> Self {
        let count = |status: PlayerStatus| players.iter().filter(|p| p.status == status).count();

        let mut sold: Vec<&Player> = players
            .iter()
            .filter(|p| p.status == PlayerStatus::Sold)
            .collect();

        sold.sort_by_key(|p| p.id);
        let recent_sales = sold.iter().rev().take(RECENT_SALES).map(|&p| p.clone()).collect();

        // Stable sort keeps earlier sales first among equal prices.
        sold.sort_by(|a, b| b.sold_price.cmp(&a.sold_price));
        let top_buys = sold.iter().take(TOP_BUYS).map(|&p| p.clone()).collect();

        let role_stats = PlayerRole::ALL
            .iter()
            .map(|&role| {
                let of_role = players.iter().filter(|p| p.role == role);
                RoleStat {
                    role,
                    count: of_role.clone().count(),
                    sold_count: of_role.filter(|p| p.status == PlayerStatus::Sold).count(),
                }
            })
            .collect();

        let team_spend = teams
            .iter()
            .map(|t| TeamSpend {
                team_id: t.id,
                name: t.name.clone(),
                spent: t.spent(),
                budget: t.budget,
                remaining_budget: t.remaining_budget,
            })
            .collect();

        AuctionSummary {
            total_spent: teams.iter().map(Team::spent).sum(),
            players_sold: count(PlayerStatus::Sold),
            players_unsold: count(PlayerStatus::Unsold),
            players_pending: count(PlayerStatus::Pending),
            top_buys,
            recent_sales,
            role_stats,
            team_spend,
        }
    }
}

impl Database {
    pub fn summary(&self) -> AuctionResult<AuctionSummary> {
        let teams = self.list_teams()?;
        let players = self.list_players()?;
        Ok(AuctionSummary::compute(&teams, &players))
    }
}
