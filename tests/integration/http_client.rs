//! `HttpGameClient` against a local Axum stand-in for the game server.

use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::time::Duration;

use aviator::remote::http::HttpGameClient;
use aviator::remote::RemoteStateClient;
use aviator::types::*;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn game_routes() -> Router {
    Router::new()
        .route(
            "/api/game/status",
            get(|| async {
                Json(json!({
                    "phase": "crashed",
                    "multiplier": 1.8,
                    "round": 42,
                    "remaining_time_ms": 0,
                    "active_bets": 2,
                    "crash_point": 1.8
                }))
            }),
        )
        .route(
            "/api/game/players",
            put(|Json(body): Json<Value>| async move {
                if body["player_id"] == "player_known0001" {
                    (StatusCode::OK, Json(json!({"success": true, "data": {"balance": 1234.5}})))
                } else {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"success": false, "error": "Player not found"})),
                    )
                }
            }),
        )
        .route(
            "/api/game/join",
            post(|| async { Json(json!({"success": true})) }),
        )
        .route(
            "/api/game/bet",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"success": false, "error": "Bets are closed"})),
                )
            }),
        )
        .route(
            "/api/game/cashout",
            post(|| async { Json(json!({"success": true, "message": "Cashed out"})) }),
        )
        .route(
            "/api/game/active-bets",
            get(|| async { Json(json!([{"player_name": "deniz", "amount": 10.0}])) }),
        )
        .route(
            "/api/game/old-crash-points",
            get(|| async { Json(json!([1.1, 2.2, 3.3, 4.4, 5.5])) }),
        )
        .route(
            "/api/game/load-balance",
            post(|| async { Json(json!({"success": false, "message": "Unknown player"})) }),
        )
        .route(
            "/api/game/bring-beko",
            post(|| async { Json(json!({"success": true, "data": {"ulke": "Almanya"}})) }),
        )
}

async fn client() -> HttpGameClient {
    let base = serve(game_routes()).await;
    HttpGameClient::new(&base, Duration::from_secs(2), 3).unwrap()
}

#[tokio::test]
async fn test_status_decodes_snapshot() {
    let snapshot = client().await.fetch_round_state().await.unwrap();
    assert_eq!(snapshot.round_id, 42);
    assert_eq!(snapshot.phase, Phase::Crashed);
    assert_eq!(snapshot.crash_point, Some(1.8));
    assert_eq!(snapshot.active_bet_count, 2);
}

#[tokio::test]
async fn test_player_balance_and_missing_player() {
    let client = client().await;
    let balance = client
        .fetch_player_state(&PlayerId::from("player_known0001"))
        .await
        .unwrap();
    assert_eq!(balance, dec!(1234.5));

    let err = client
        .fetch_player_state(&PlayerId::from("player_ghost0001"))
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Rejected(ref m) if m == "Player not found"));
}

#[tokio::test]
async fn test_rejection_with_bad_request_status() {
    let err = client()
        .await
        .place_bet(&PlayerId::from("player_known0001"), dec!(10))
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Rejected(ref m) if m == "Bets are closed"));
}

#[tokio::test]
async fn test_commands_succeed() {
    let client = client().await;
    let id = PlayerId::from("player_known0001");
    client.join(&id, "deniz").await.unwrap();
    client.cashout(&id).await.unwrap();
    assert_eq!(client.bring_beko(&id).await.unwrap(), "Almanya");
}

#[tokio::test]
async fn test_rejection_falls_back_to_message() {
    let err = client().await.load_balance("nobody", dec!(5)).await.unwrap_err();
    assert!(matches!(err, GameError::Rejected(ref m) if m == "Unknown player"));
}

#[tokio::test]
async fn test_listings() {
    let client = client().await;
    let bets = client.fetch_active_bets().await.unwrap();
    assert_eq!(bets, vec![BetRecord { player_name: "deniz".into(), amount: dec!(10) }]);

    let points = client.fetch_recent_crash_points().await.unwrap();
    assert_eq!(points, vec![3.3, 4.4, 5.5]);
}

#[tokio::test]
async fn test_garbage_body_is_protocol_error() {
    let base = serve(Router::new().route("/api/game/status", get(|| async { "<html>" }))).await;
    let client = HttpGameClient::new(&base, Duration::from_secs(2), 3).unwrap();
    let err = client.fetch_round_state().await.unwrap_err();
    assert!(matches!(err, GameError::Protocol(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_unknown_route_is_protocol_error() {
    let base = serve(Router::new()).await;
    let client = HttpGameClient::new(&base, Duration::from_secs(2), 3).unwrap();
    assert!(matches!(
        client.fetch_active_bets().await.unwrap_err(),
        GameError::Protocol(_)
    ));
}
