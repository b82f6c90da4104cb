// Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

use auction_core::error::ErrorDetails;

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    pub error: String,
    /// Stable machine-readable identifier, e.g. `INSUFFICIENT_FUNDS`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Fields of structured errors, such as the amounts of a refused sale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            success: false,
            error: error.into(),
            code: Some(code.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<ErrorDetails>) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Result of a partial player update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesResponse {
    pub success: bool,
    pub changes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
    pub player_id: i64,
    pub team_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellResponse {
    pub success: bool,
    /// The buying team's remaining budget after the sale.
    pub new_budget: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupResponse {
    pub id: i64,
    pub email: String,
    pub success: bool,
}

/// The token is opaque and not checked by any route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
