// Domain error taxonomy shared by the store, the sale engine, the auction
// session and every client of the API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::PlayerStatus;

/// Kind of record an [`AuctionError::EntityNotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Team,
    Player,
    User,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Entity::Team => "Team",
            Entity::Player => "Player",
            Entity::User => "User",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuctionError {
    #[error("{entity} not found: {id}")]
    EntityNotFound { entity: Entity, id: String },

    #[error("Insufficient funds: team has {available}, bid is {attempted}")]
    InsufficientFunds { attempted: i64, available: i64 },

    #[error("player {player_id} is {status} and cannot be sold")]
    PlayerUnavailable { player_id: i64, status: PlayerStatus },

    #[error("team {team_id} owns {players} sold player(s) and cannot be deleted")]
    TeamHasPlayers { team_id: i64, players: usize },

    #[error("{0}")]
    Validation(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("a sale for this player is already in progress")]
    SaleInFlight,

    #[error("{0}")]
    InvalidState(String),

    #[error("storage fault: {0}")]
    StorageFault(String),

    #[error("network error: {0}")]
    Network(String),
}

impl AuctionError {
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        AuctionError::EntityNotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AuctionError::Validation(message.into())
    }

    /// Stable machine-readable identifier, used as the `code` field of API
    /// error bodies and by clients to tell failures apart.
    pub fn code(&self) -> &'static str {
        match self {
            AuctionError::EntityNotFound { .. } => "ENTITY_NOT_FOUND",
            AuctionError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            AuctionError::PlayerUnavailable { .. } => "PLAYER_UNAVAILABLE",
            AuctionError::TeamHasPlayers { .. } => "TEAM_HAS_PLAYERS",
            AuctionError::Validation(_) => "VALIDATION_ERROR",
            AuctionError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuctionError::SaleInFlight => "SALE_IN_FLIGHT",
            AuctionError::InvalidState(_) => "INVALID_STATE",
            AuctionError::StorageFault(_) => "STORAGE_FAULT",
            AuctionError::Network(_) => "NETWORK_ERROR",
        }
    }
}

/// Structured fields of an error, carried next to `code` in API error
/// bodies so a remote caller can rebuild the exact variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlayerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<usize>,
}

impl AuctionError {
    /// Structured fields for the variants that have them.
    pub fn details(&self) -> Option<ErrorDetails> {
        match self {
            AuctionError::EntityNotFound { entity, id } => Some(ErrorDetails {
                entity: Some(*entity),
                id: Some(id.clone()),
                ..Default::default()
            }),
            AuctionError::InsufficientFunds {
                attempted,
                available,
            } => Some(ErrorDetails {
                attempted: Some(*attempted),
                available: Some(*available),
                ..Default::default()
            }),
            AuctionError::PlayerUnavailable { player_id, status } => Some(ErrorDetails {
                player_id: Some(*player_id),
                status: Some(*status),
                ..Default::default()
            }),
            AuctionError::TeamHasPlayers { team_id, players } => Some(ErrorDetails {
                team_id: Some(*team_id),
                players: Some(*players),
                ..Default::default()
            }),
            _ => None,
        }
    }

    /// Rebuild an error from its wire form. Returns `None` for an unknown
    /// code, or when a structured variant arrives without its fields.
    pub fn from_wire(
        code: &str,
        message: String,
        details: Option<&ErrorDetails>,
    ) -> Option<AuctionError> {
        let d = details.cloned().unwrap_or_default();
        let err = match code {
            "ENTITY_NOT_FOUND" => AuctionError::EntityNotFound {
                entity: d.entity?,
                id: d.id?,
            },
            "INSUFFICIENT_FUNDS" => AuctionError::InsufficientFunds {
                attempted: d.attempted?,
                available: d.available?,
            },
            "PLAYER_UNAVAILABLE" => AuctionError::PlayerUnavailable {
                player_id: d.player_id?,
                status: d.status?,
            },
            "TEAM_HAS_PLAYERS" => AuctionError::TeamHasPlayers {
                team_id: d.team_id?,
                players: d.players?,
            },
            "VALIDATION_ERROR" => AuctionError::Validation(message),
            "INVALID_CREDENTIALS" => AuctionError::InvalidCredentials,
            "SALE_IN_FLIGHT" => AuctionError::SaleInFlight,
            "INVALID_STATE" => AuctionError::InvalidState(message),
            "STORAGE_FAULT" => AuctionError::StorageFault(message),
            "NETWORK_ERROR" => AuctionError::Network(message),
            _ => return None,
        };
        Some(err)
    }
}

impl From<rusqlite::Error> for AuctionError {
    fn from(err: rusqlite::Error) -> Self {
        AuctionError::StorageFault(err.to_string())
    }
}

pub type AuctionResult<T> = Result<T, AuctionError>;
