// HTTP surface end to end: mutations persist, record, and reach the room.

use std::sync::Arc;

use auction_live::api::router;
use auction_live::seed::{apply_seed, parse_seed};
use auction_live::state::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

const SEED: &str = r#"
    [[players]]
    playerId = 7
    name = "Rohit Sharma"
    country = "India"
    specialism = "BATTER"

    [[players]]
    playerId = 8
    name = "Jasprit Bumrah"
    country = "India"
    specialism = "BOWLER"

    [[auctions]]
    auctionId = "A001"
    name = "Mega Auction"
    budgetPerTeam = 1000
    players = [{ playerId = 7, basePrice = 200 }, { playerId = 8, basePrice = 150 }]

    [[auctions.teams]]
    name = "Mumbai Indians"
    email = "mi@example.com"
"#;

fn state() -> Arc<AppState> {
    let state = AppState::in_memory().unwrap();
    apply_seed(&state.db, &parse_seed(SEED).unwrap()).unwrap();
    Arc::new(state)
}

async fn call(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router(Arc::clone(state)).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn room_member(state: &AppState) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    state
        .hub
        .join("A001", state.hub.next_connection_id(), tx)
        .unwrap();
    rx
}

#[tokio::test]
async fn auction_info_and_listings() {
    let state = state();

    let (status, info) = call(&state, "GET", "/api/auctionlive/A001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["auctionName"], "Mega Auction");
    assert_eq!(info["status"], "upcoming");
    assert_eq!(info["teams"][0]["name"], "Mumbai Indians");

    let (status, players) = call(&state, "GET", "/api/auctionlive/A001/players", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(players.as_array().unwrap().len(), 2);
    assert_eq!(players[0]["playerName"], "Rohit Sharma");
    assert_eq!(players[0]["role"], "BATTER");
    assert_eq!(players[0]["status"], "Available");
}

#[tokio::test]
async fn sell_over_http_updates_everything() {
    let state = state();
    let mut room = room_member(&state);

    let (status, sold) = call(
        &state,
        "POST",
        "/api/auctionlive/A001/players/sell",
        Some(json!({"playerId": "7", "franchise": "Mumbai Indians", "soldPrice": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        sold,
        json!({
            "playerId": 7,
            "playerName": "Rohit Sharma",
            "franchise": "Mumbai Indians",
            "soldPrice": 500,
            "status": "Sold"
        })
    );

    let frame: Value = serde_json::from_str(&room.try_recv().unwrap()).unwrap();
    assert_eq!(frame["event"], "playerSold");

    let (_, unsold) = call(&state, "GET", "/api/auctionlive/A001/players/unsold", None).await;
    let ids: Vec<u64> = unsold
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["playerId"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![8]);

    let (status, summary) = call(
        &state,
        "GET",
        "/api/auctionlive/franchise/Mumbai%20Indians?auctionId=A001",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["totalSpent"], 500);
    assert_eq!(summary["remainingPurse"], 500);
    assert_eq!(summary["teamExists"], true);
    assert_eq!(summary["players"][0]["Player Name"], "Rohit Sharma");

    let (_, history) = call(&state, "GET", "/api/auctionlive/biddinghistory/A001", None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["teamName"], "Mumbai Indians");
    assert_eq!(history[0]["bidAmount"], 500);
}

#[tokio::test]
async fn price_and_unsold_over_http() {
    let state = state();

    let (status, priced) = call(
        &state,
        "POST",
        "/api/auctionlive/A001/players/price",
        Some(json!({"playerId": 8, "action": "raise", "newPrice": 175})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(priced["soldPrice"], 175);
    assert_eq!(priced["basePrice"], 150);

    let (status, unsold) = call(
        &state,
        "POST",
        "/api/auctionlive/A001/players/unsold",
        Some(json!({"playerId": 8})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unsold["basePrice"], 75);
    assert_eq!(unsold["status"], "Unsold");

    let (_, history) = call(&state, "GET", "/api/auctionlive/biddinghistory/A001", None).await;
    assert_eq!(history[0]["teamName"], "UNSOLD");
    assert_eq!(history[0]["bidAmount"], 150);
}

#[tokio::test]
async fn not_found_cases_are_explicit() {
    let state = state();

    let (status, body) = call(
        &state,
        "POST",
        "/api/auctionlive/A001/players/sell",
        Some(json!({"playerId": 99, "franchise": "Mumbai Indians", "soldPrice": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, _) = call(
        &state,
        "POST",
        "/api/auctionlive/B999/players/unsold",
        Some(json!({"playerId": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &state,
        "GET",
        "/api/auctionlive/franchise/Gujarat%20Titans?auctionId=A001",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_machine_gates_mutations() {
    let state = state();

    let (status, _) = call(
        &state,
        "PUT",
        "/api/auction/update-status/A001",
        Some(json!({"status": "paused"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &state,
        "PUT",
        "/api/auction/update-status/A001",
        Some(json!({"status": "ongoing"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ongoing");

    let (status, _) = call(
        &state,
        "PUT",
        "/api/auction/update-status/A001",
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &state,
        "POST",
        "/api/auctionlive/A001/players/sell",
        Some(json!({"playerId": 7, "franchise": "Mumbai Indians", "soldPrice": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let (status, _) = call(
        &state,
        "PUT",
        "/api/auction/update-status/A001",
        Some(json!({"status": "ongoing"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &state,
        "PUT",
        "/api/auction/update-status/NOPE",
        Some(json!({"status": "ongoing"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
