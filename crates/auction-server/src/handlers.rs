// API request handlers.

use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::Json;
use tracing::{debug, info, warn};

use auction_core::db::Database;
use auction_core::error::{AuctionError, AuctionResult};
use auction_core::model::{NewPlayer, NewTeam, Player, PlayerUpdate, Team};
use auction_core::summary::AuctionSummary;

use crate::models::*;
use crate::AppState;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error to its HTTP status and JSON body.
pub fn api_error(err: AuctionError) -> ApiError {
    let status = match &err {
        AuctionError::EntityNotFound { .. } => StatusCode::NOT_FOUND,
        AuctionError::InsufficientFunds { .. }
        | AuctionError::PlayerUnavailable { .. }
        | AuctionError::TeamHasPlayers { .. }
        | AuctionError::SaleInFlight
        | AuctionError::InvalidState(_) => StatusCode::CONFLICT,
        AuctionError::Validation(_) => StatusCode::BAD_REQUEST,
        AuctionError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuctionError::Network(_) => StatusCode::BAD_GATEWAY,
        AuctionError::StorageFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("Request failed: {err}");
    }
    let body = ErrorResponse::new(err.to_string(), err.code()).with_details(err.details());
    (status, Json(body))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(AuctionError::validation(message))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

/// Run a store call on the blocking pool.
async fn with_db<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> AuctionResult<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(&state.db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| api_error(AuctionError::StorageFault(format!("store task failed: {e}"))))?
        .map_err(api_error)
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

pub async fn list_teams(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Team>>, ApiError> {
    with_db(&state, |db| db.list_teams()).await.map(Json)
}

pub async fn create_team(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewTeam>, JsonRejection>,
) -> Result<Json<Team>, ApiError> {
    let new = json_body(payload)?;
    with_db(&state, move |db| db.create_team(&new)).await.map(Json)
}

pub async fn delete_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    with_db(&state, move |db| db.delete_team(id)).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

pub async fn list_players(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Player>>, ApiError> {
    with_db(&state, |db| db.list_players()).await.map(Json)
}

/// Accepts either a JSON body or a multipart form whose `imageFile` part is
/// stored under the uploads directory.
pub async fn create_player(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Player>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let new = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|rejection| bad_request(rejection.body_text()))?;
        player_from_form(&state, multipart).await?
    } else {
        json_body(Json::<NewPlayer>::from_request(request, &state).await)?
    };

    with_db(&state, move |db| db.create_player(&new)).await.map(Json)
}

pub async fn update_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<PlayerUpdate>, JsonRejection>,
) -> Result<Json<ChangesResponse>, ApiError> {
    let update = json_body(payload)?;
    debug!("Updating player {id}: {update:?}");
    let changes = with_db(&state, move |db| db.update_player(id, &update)).await?;
    Ok(Json(ChangesResponse {
        success: true,
        changes,
    }))
}

pub async fn delete_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    with_db(&state, move |db| db.delete_player(id)).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn player_from_form(state: &AppState, mut multipart: Multipart) -> Result<NewPlayer, ApiError> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut uploaded: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "imageFile" {
            let file_name = sanitize_file_name(field.file_name().unwrap_or("upload"));
            let data = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
            if !data.is_empty() {
                uploaded = Some(save_upload(state, &file_name, &data).await?);
            }
        } else {
            let value = field.text().await.map_err(|e| bad_request(e.body_text()))?;
            fields.insert(name, value);
        }
    }

    let text = |key: &str| {
        fields
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let base_price = text("basePrice")
        .ok_or_else(|| bad_request("basePrice is required"))?
        .parse::<i64>()
        .map_err(|_| bad_request("basePrice must be a whole number"))?;
    let role = text("role")
        .ok_or_else(|| bad_request("role is required"))?
        .parse()
        .map_err(api_error)?;
    let status = text("status")
        .map(|s| s.parse())
        .transpose()
        .map_err(api_error)?;

    Ok(NewPlayer {
        name: text("name").unwrap_or_default(),
        role,
        style: text("style"),
        base_price,
        image: uploaded.or_else(|| text("image")),
        status,
    })
}

/// Keep only the final path component and a conservative character set.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Write an uploaded image and return its public URL.
async fn save_upload(state: &AppState, file_name: &str, data: &[u8]) -> Result<String, ApiError> {
    let stored = format!("{}-{}", chrono::Utc::now().timestamp_millis(), file_name);
    let storage_error =
        |e: std::io::Error| api_error(AuctionError::StorageFault(format!("failed to store upload: {e}")));

    tokio::fs::create_dir_all(&state.uploads_dir)
        .await
        .map_err(storage_error)?;
    tokio::fs::write(FsPath::new(&state.uploads_dir).join(&stored), data)
        .await
        .map_err(storage_error)?;

    info!("Stored upload {stored} ({} bytes)", data.len());
    Ok(format!(
        "{}/uploads/{stored}",
        state.public_url.trim_end_matches('/')
    ))
}

// ---------------------------------------------------------------------------
// Auction
// ---------------------------------------------------------------------------

pub async fn sell_player(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SellRequest>, JsonRejection>,
) -> Result<Json<SellResponse>, ApiError> {
    let SellRequest {
        player_id,
        team_id,
        amount,
    } = json_body(payload)?;
    let new_budget =
        with_db(&state, move |db| db.sell_player(player_id, team_id, amount)).await?;
    Ok(Json(SellResponse {
        success: true,
        new_budget,
    }))
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AuctionSummary>, ApiError> {
    with_db(&state, |db| db.summary()).await.map(Json)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

pub async fn signup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<SignupResponse>, ApiError> {
    let CredentialsRequest { email, password } = json_body(payload)?;
    let user = with_db(&state, move |db| db.register_user(&email, &password)).await?;
    Ok(Json(SignupResponse {
        id: user.id,
        email: user.email,
        success: true,
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let CredentialsRequest { email, password } = json_body(payload)?;
    let user = with_db(&state, move |db| db.authenticate(&email, &password)).await?;
    info!(user_id = user.id, "User logged in");
    Ok(Json(LoginResponse {
        id: user.id,
        email: user.email,
        role: user.role,
        token: uuid::Uuid::new_v4().to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Any `/api/*` path without a route.
pub async fn api_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "API endpoint not found" })),
    )
}
