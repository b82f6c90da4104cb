// Teams, players and users, plus the typed request records that create or
// edit them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AuctionError, AuctionResult};

// ---------------------------------------------------------------------------
// Player role
// ---------------------------------------------------------------------------

/// Playing role of a cricketer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlayerRole {
    Batsman,
    Bowler,
    AllRounder,
    WicketKeeper,
}

impl PlayerRole {
    pub const ALL: [PlayerRole; 4] = [
        PlayerRole::Batsman,
        PlayerRole::Bowler,
        PlayerRole::AllRounder,
        PlayerRole::WicketKeeper,
    ];

    /// Canonical spelling, as stored and returned by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerRole::Batsman => "Batsman",
            PlayerRole::Bowler => "Bowler",
            PlayerRole::AllRounder => "All-Rounder",
            PlayerRole::WicketKeeper => "Wicket Keeper",
        }
    }
}

impl FromStr for PlayerRole {
    type Err = AuctionError;

    /// Accepts the canonical names and the spellings older front ends sent
    /// ("All Rounder", "WK", ...), ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "batsman" | "batter" => Ok(PlayerRole::Batsman),
            "bowler" => Ok(PlayerRole::Bowler),
            "allrounder" => Ok(PlayerRole::AllRounder),
            "wicketkeeper" | "wk" | "keeper" => Ok(PlayerRole::WicketKeeper),
            _ => Err(AuctionError::validation(format!("unknown player role: {s}"))),
        }
    }
}

impl TryFrom<String> for PlayerRole {
    type Error = AuctionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlayerRole> for String {
    fn from(role: PlayerRole) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for PlayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Player status
// ---------------------------------------------------------------------------

/// Lifecycle of a player record: `Pending -> Unsold <-> Sold`, where the
/// only way into `Sold` is a completed sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    Pending,
    Unsold,
    Sold,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Pending => "Pending",
            PlayerStatus::Unsold => "Unsold",
            PlayerStatus::Sold => "Sold",
        }
    }
}

impl FromStr for PlayerStatus {
    type Err = AuctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PlayerStatus::Pending),
            "Unsold" => Ok(PlayerStatus::Unsold),
            "Sold" => Ok(PlayerStatus::Sold),
            other => Err(AuctionError::validation(format!(
                "unknown player status: {other}"
            ))),
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A franchise bidding in the auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub budget: i64,
    pub remaining_budget: i64,
    pub logo: Option<String>,
    /// Ids of players sold to this team. Derived, never stored.
    #[serde(default)]
    pub players: Vec<i64>,
}

impl Team {
    pub fn spent(&self) -> i64 {
        self.budget - self.remaining_budget
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub role: PlayerRole,
    pub style: Option<String>,
    pub base_price: i64,
    pub image: Option<String>,
    pub status: PlayerStatus,
    pub sold_price: i64,
    pub sold_to_team_id: Option<i64>,
}

/// A console/API account. The password hash never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub role: String,
    #[serde(skip)]
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Creation requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeam {
    pub name: String,
    pub budget: i64,
    #[serde(default)]
    pub logo: Option<String>,
}

impl NewTeam {
    pub fn validate(&self) -> AuctionResult<()> {
        if self.name.trim().is_empty() {
            return Err(AuctionError::validation("team name is required"));
        }
        if self.budget <= 0 {
            return Err(AuctionError::validation(format!(
                "team budget must be positive, got {}",
                self.budget
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayer {
    pub name: String,
    pub role: PlayerRole,
    #[serde(default)]
    pub style: Option<String>,
    pub base_price: i64,
    #[serde(default)]
    pub image: Option<String>,
    /// `Pending` for public self-registration; defaults to `Unsold`.
    #[serde(default)]
    pub status: Option<PlayerStatus>,
}

impl NewPlayer {
    pub fn validate(&self) -> AuctionResult<()> {
        if self.name.trim().is_empty() {
            return Err(AuctionError::validation("player name is required"));
        }
        if self.base_price <= 0 {
            return Err(AuctionError::validation(format!(
                "base price must be positive, got {}",
                self.base_price
            )));
        }
        if self.status == Some(PlayerStatus::Sold) {
            return Err(AuctionError::validation(
                "players can only become Sold through the auction",
            ));
        }
        Ok(())
    }

    pub fn initial_status(&self) -> PlayerStatus {
        self.status.unwrap_or(PlayerStatus::Unsold)
    }
}

// ---------------------------------------------------------------------------
// Partial player update
// ---------------------------------------------------------------------------

/// Body of `PUT /players/:id`. Only fields present in the request are
/// written; `sold_to_team_id` keeps explicit `null` apart from "absent".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlayerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sold_price: Option<i64>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub sold_to_team_id: Option<Option<i64>>,
}

/// Maps a present field (including `null`) to `Some(..)` so that
/// `#[serde(default)]` alone yields `None` for an absent one.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl PlayerUpdate {
    /// A pass: put the player back in the pool without touching anything else.
    pub fn mark_unsold() -> Self {
        PlayerUpdate {
            status: Some(PlayerStatus::Unsold),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.style.is_none()
            && self.sold_price.is_none()
            && self.sold_to_team_id.is_none()
    }

    /// Compute the record that results from applying this update to
    /// `current`, rejecting anything that would break the status lifecycle
    /// or the sold-price/owner bookkeeping.
    pub fn apply_to(&self, current: &Player) -> AuctionResult<Player> {
        let status = self.status.unwrap_or(current.status);
        check_transition(current.status, status)?;

        let sold_price = self.sold_price.unwrap_or(current.sold_price);
        let sold_to_team_id = self.sold_to_team_id.unwrap_or(current.sold_to_team_id);

        if status == PlayerStatus::Sold {
            if sold_price != current.sold_price || sold_to_team_id != current.sold_to_team_id {
                return Err(AuctionError::validation(
                    "the price and team of a sold player are set by the auction",
                ));
            }
        } else if sold_price != 0 || sold_to_team_id.is_some() {
            return Err(AuctionError::validation(format!(
                "a {status} player cannot carry a sold price or team"
            )));
        }

        Ok(Player {
            style: self.style.clone().or_else(|| current.style.clone()),
            status,
            sold_price,
            sold_to_team_id,
            ..current.clone()
        })
    }
}

fn check_transition(from: PlayerStatus, to: PlayerStatus) -> AuctionResult<()> {
    use PlayerStatus::*;
    match (from, to) {
        (a, b) if a == b => Ok(()),
        (Pending, Unsold) => Ok(()),
        (_, Sold) => Err(AuctionError::validation(
            "players can only become Sold through the auction",
        )),
        (from, to) => Err(AuctionError::validation(format!(
            "cannot move a player from {from} to {to}"
        ))),
    }
}
