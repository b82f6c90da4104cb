// HTTP gateway to the auction API.
//
// Implements `AuctionGateway` over reqwest so the console controller can run
// against a remote server. Transport failures become `AuctionError::Network`
// and API error bodies are mapped back onto domain errors by their `code`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use auction_core::error::{AuctionError, AuctionResult, ErrorDetails};
use auction_core::gateway::AuctionGateway;
use auction_core::model::{Player, Team};
use auction_core::session::SaleRequest;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SellBody {
    player_id: i64,
    team_id: i64,
    amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SellReply {
    new_budget: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<ErrorDetails>,
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:3000/api`.
    ///
    /// Fails when the HTTP client cannot be built, e.g. when no TLS backend
    /// is available.
    pub fn new(base_url: impl Into<String>) -> AuctionResult<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    /// Like [`ApiClient::new`], with a per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AuctionResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuctionError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AuctionResult<T> {
        debug!("GET {path}");
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> AuctionResult<T> {
        debug!("{method} {path}");
        let response = self
            .http
            .request(method, self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }
}

fn transport_error(err: reqwest::Error) -> AuctionError {
    warn!("API request failed: {err}");
    AuctionError::Network(err.to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> AuctionResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| AuctionError::Network(format!("invalid response body: {e}")));
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_response(status.as_u16(), &body))
}

/// Rebuild a domain error from a failed API response.
///
/// Bodies without a known code keep the server's message: as `Network` for
/// 5xx replies and as `InvalidState` otherwise.
pub fn error_from_response(status: u16, body: &str) -> AuctionError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.error.clone())
        .unwrap_or_else(|| format!("HTTP {status}"));

    let rebuilt = parsed.as_ref().and_then(|b| {
        let code = b.code.as_deref()?;
        AuctionError::from_wire(code, message.clone(), b.details.as_ref())
    });
    match rebuilt {
        Some(err) => err,
        None if status >= 500 => {
            AuctionError::Network(format!("server returned {status}: {message}"))
        }
        None => AuctionError::InvalidState(message),
    }
}

#[async_trait]
impl AuctionGateway for ApiClient {
    async fn fetch_teams(&self) -> AuctionResult<Vec<Team>> {
        self.get_json("/teams").await
    }

    async fn fetch_players(&self) -> AuctionResult<Vec<Player>> {
        self.get_json("/players").await
    }

    async fn sell(&self, request: SaleRequest) -> AuctionResult<i64> {
        let body = SellBody {
            player_id: request.player_id,
            team_id: request.team_id,
            amount: request.amount,
        };
        let reply: SellReply = self
            .send_json(reqwest::Method::POST, "/auction/sell", &body)
            .await?;
        Ok(reply.new_budget)
    }

    async fn mark_unsold(&self, player_id: i64) -> AuctionResult<()> {
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::PUT,
                &format!("/players/{player_id}"),
                &serde_json::json!({ "status": "Unsold" }),
            )
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use auction_core::error::Entity;
    use auction_core::model::PlayerStatus;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = ApiClient::new("http://localhost:3000/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api");
        assert_eq!(client.url("/teams"), "http://localhost:3000/api/teams");
    }

    #[test]
    fn insufficient_funds_is_rebuilt_with_amounts() {
        let body = r#"{"success":false,"error":"Insufficient funds: team has 400000, bid is 500000","code":"INSUFFICIENT_FUNDS","details":{"attempted":500000,"available":400000}}"#;
        let err = error_from_response(409, body);
        assert_eq!(
            err,
            AuctionError::InsufficientFunds {
                attempted: 500_000,
                available: 400_000
            }
        );
        assert_eq!(
            err.to_string(),
            "Insufficient funds: team has 400000, bid is 500000"
        );
    }

    #[test]
    fn structured_codes_map_to_their_variants() {
        let err = error_from_response(
            404,
            r#"{"error":"Player not found: 9","code":"ENTITY_NOT_FOUND","details":{"entity":"Player","id":"9"}}"#,
        );
        assert_eq!(err, AuctionError::not_found(Entity::Player, 9));

        let err = error_from_response(
            409,
            r#"{"error":"sold","code":"PLAYER_UNAVAILABLE","details":{"playerId":4,"status":"Sold"}}"#,
        );
        assert_eq!(
            err,
            AuctionError::PlayerUnavailable {
                player_id: 4,
                status: PlayerStatus::Sold
            }
        );

        let err = error_from_response(
            409,
            r#"{"error":"owns players","code":"TEAM_HAS_PLAYERS","details":{"teamId":2,"players":3}}"#,
        );
        assert_eq!(
            err,
            AuctionError::TeamHasPlayers {
                team_id: 2,
                players: 3
            }
        );
    }

    #[test]
    fn structured_code_without_details_keeps_message() {
        let body = r#"{"error":"Insufficient funds","code":"INSUFFICIENT_FUNDS"}"#;
        assert_eq!(
            error_from_response(409, body),
            AuctionError::InvalidState("Insufficient funds".into())
        );
    }

    #[test]
    fn known_codes_map_to_variants() {
        let body = |code: &str| format!(r#"{{"error":"nope","code":"{code}"}}"#);
        assert_eq!(
            error_from_response(400, &body("VALIDATION_ERROR")),
            AuctionError::Validation("nope".into())
        );
        assert_eq!(
            error_from_response(401, &body("INVALID_CREDENTIALS")),
            AuctionError::InvalidCredentials
        );
        assert_eq!(
            error_from_response(500, &body("STORAGE_FAULT")),
            AuctionError::StorageFault("nope".into())
        );
    }

    #[test]
    fn unparseable_server_error_is_network() {
        let err = error_from_response(502, "<html>Bad Gateway</html>");
        assert!(matches!(err, AuctionError::Network(ref m) if m.contains("502")));
    }

    #[tokio::test]
    async fn silent_server_times_out_as_network_error() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client =
            ApiClient::with_timeout(format!("http://{addr}/api"), Duration::from_millis(200))
                .unwrap();
        let err = tokio::time::timeout(Duration::from_secs(5), client.fetch_teams())
            .await
            .expect("request timeout was not applied")
            .unwrap_err();
        assert!(matches!(err, AuctionError::Network(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // Port 1 is reserved and refuses connections.
        let client = ApiClient::new("http://127.0.0.1:1/api").unwrap();
        let err = client.fetch_teams().await.unwrap_err();
        assert!(matches!(err, AuctionError::Network(_)));
    }
}
