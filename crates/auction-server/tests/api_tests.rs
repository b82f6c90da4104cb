// Router-level tests for the auction API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tower::ServiceExt; // For oneshot

use auction_core::config::{parse_config, DEFAULT_CONFIG};
use auction_core::db::Database;
use auction_server::ApiServer;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "auction-api-{name}-{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_app(name: &str) -> (Router, PathBuf) {
    let dir = scratch_dir(name);
    let mut config = parse_config(DEFAULT_CONFIG, Path::new("auction.toml")).unwrap();
    config.storage.uploads_dir = dir.join("uploads").to_string_lossy().into_owned();
    config.storage.public_dir = dir.join("public").to_string_lossy().into_owned();
    config.server.public_url = "http://auction.test".to_string();

    std::fs::create_dir_all(dir.join("public")).unwrap();
    std::fs::write(dir.join("public/index.html"), "<h1>auction</h1>").unwrap();

    let db = Database::open(":memory:").unwrap();
    (ApiServer::new(&config, db).build_router(), dir)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().uri(uri).method(method);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

async fn create_team(app: &Router, name: &str, budget: i64) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/teams",
        Some(json!({ "name": name, "budget": budget })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_i64().unwrap()
}

async fn create_player(app: &Router, name: &str, base_price: i64) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/players",
        Some(json!({
            "name": name,
            "role": "Batsman",
            "style": "Right Hand Bat",
            "basePrice": base_price,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_check() {
    let (app, _) = test_app("health");
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_and_list_teams() {
    let (app, _) = test_app("teams");
    let id = create_team(&app, "Chennai Kings", 1_000_000).await;

    let (status, body) = send(&app, "GET", "/api/teams", None).await;
    assert_eq!(status, StatusCode::OK);
    let teams = body.as_array().unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0]["id"], id);
    assert_eq!(teams[0]["remainingBudget"], 1_000_000);
    assert_eq!(teams[0]["players"], json!([]));
}

#[tokio::test]
async fn invalid_team_is_bad_request() {
    let (app, _) = test_app("bad-team");
    let (status, body) = send(
        &app,
        "POST",
        "/api/teams",
        Some(json!({ "name": "Zero", "budget": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, "POST", "/api/teams", Some(json!({ "budget": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sell_sequence_updates_budget_and_rejects_overspend() {
    let (app, _) = test_app("sell");
    let team = create_team(&app, "Mumbai", 1_000_000).await;
    let first = create_player(&app, "Opener", 100_000).await;
    let second = create_player(&app, "Keeper", 100_000).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auction/sell",
        Some(json!({ "playerId": first, "teamId": team, "amount": 600_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["newBudget"], 400_000);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auction/sell",
        Some(json!({ "playerId": second, "teamId": team, "amount": 500_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_FUNDS");
    assert_eq!(body["details"]["attempted"], 500_000);
    assert_eq!(body["details"]["available"], 400_000);

    let (_, players) = send(&app, "GET", "/api/players", None).await;
    let keeper = players
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == second)
        .unwrap();
    assert_eq!(keeper["status"], "Unsold");

    let (_, teams) = send(&app, "GET", "/api/teams", None).await;
    assert_eq!(teams[0]["remainingBudget"], 400_000);
    assert_eq!(teams[0]["players"], json!([first]));
}

#[tokio::test]
async fn sell_unknown_entities_is_not_found() {
    let (app, _) = test_app("sell-missing");
    let team = create_team(&app, "Delhi", 500_000).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auction/sell",
        Some(json!({ "playerId": 999, "teamId": team, "amount": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ENTITY_NOT_FOUND");
}

#[tokio::test]
async fn partial_update_marks_unsold_without_touching_other_fields() {
    let (app, _) = test_app("update");
    let id = create_player(&app, "Spinner", 200_000).await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/players/{id}"),
        Some(json!({ "status": "Unsold" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let (_, players) = send(&app, "GET", "/api/players", None).await;
    let player = &players[0];
    assert_eq!(player["status"], "Unsold");
    assert_eq!(player["style"], "Right Hand Bat");
    assert_eq!(player["basePrice"], 200_000);
}

#[tokio::test]
async fn update_unknown_player_is_not_found() {
    let (app, _) = test_app("update-missing");
    let (status, _) = send(
        &app,
        "PUT",
        "/api/players/404",
        Some(json!({ "status": "Unsold" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_team_with_players_conflicts() {
    let (app, _) = test_app("delete-team");
    let team = create_team(&app, "Kolkata", 1_000_000).await;
    let player = create_player(&app, "Pacer", 100_000).await;
    send(
        &app,
        "POST",
        "/api/auction/sell",
        Some(json!({ "playerId": player, "teamId": team, "amount": 100_000 })),
    )
    .await;

    let (status, body) = send(&app, "DELETE", &format!("/api/teams/{team}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TEAM_HAS_PLAYERS");

    let empty = create_team(&app, "Empty", 1_000).await;
    let (status, body) = send(&app, "DELETE", &format!("/api/teams/{empty}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn delete_player_then_missing() {
    let (app, _) = test_app("delete-player");
    let id = create_player(&app, "Allrounder", 100_000).await;

    let (status, _) = send(&app, "DELETE", &format!("/api/players/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", &format!("/api/players/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signup_and_login() {
    let (app, _) = test_app("auth");
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        Some(json!({ "email": "Admin@Example.com", "password": "secret-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["email"], "admin@example.com");

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/signup",
        Some(json!({ "email": "admin@example.com", "password": "another-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({ "email": "admin@example.com", "password": "secret-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    assert!(!body["token"].as_str().unwrap().is_empty());

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        Some(json!({ "email": "admin@example.com", "password": "wrong-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn summary_reports_totals() {
    let (app, _) = test_app("summary");
    let team = create_team(&app, "Punjab", 2_000_000).await;
    let sold = create_player(&app, "Finisher", 100_000).await;
    create_player(&app, "Reserve", 100_000).await;
    send(
        &app,
        "POST",
        "/api/auction/sell",
        Some(json!({ "playerId": sold, "teamId": team, "amount": 750_000 })),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalSpent"], 750_000);
    assert_eq!(body["playersSold"], 1);
    assert_eq!(body["playersUnsold"], 1);
    assert_eq!(body["topBuys"][0]["id"], sold);
}

#[tokio::test]
async fn unknown_api_path_is_json_404() {
    let (app, _) = test_app("unknown");
    let (status, body) = send(&app, "GET", "/api/does/not/exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "API endpoint not found");
}

#[tokio::test]
async fn non_api_paths_fall_back_to_index() {
    let (app, _) = test_app("spa");
    let (status, body) = send(&app, "GET", "/projector", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("<h1>auction</h1>".to_string()));
}

#[tokio::test]
async fn multipart_player_stores_image() {
    let (app, dir) = test_app("upload");
    let boundary = "auction-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nViratt\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"role\"\r\n\r\nBatsman\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"basePrice\"\r\n\r\n200000\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"imageFile\"; filename=\"my face.png\"\r\n\
         Content-Type: image/png\r\n\r\nPNGDATA\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .uri("/api/players")
        .method("POST")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let player: Value = serde_json::from_slice(&bytes).unwrap();

    let image = player["image"].as_str().unwrap();
    assert!(image.starts_with("http://auction.test/uploads/"), "{image}");
    assert!(image.ends_with("-my_face.png"), "{image}");

    let stored = image.rsplit('/').next().unwrap();
    let data = std::fs::read(dir.join("uploads").join(stored)).unwrap();
    assert_eq!(data, b"PNGDATA");
}
