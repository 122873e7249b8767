// Request handlers for the auction-live HTTP API.

use std::sync::Arc;

use auction_core::franchise::{franchise_summary, list_players, FranchiseSummary, PlayerListing};
use auction_core::ledger::LedgerEntry;
use auction_core::model::{AuctionStatus, PlayerId, Team};
use auction_core::protocol::flexible_player_id;
use auction_core::AuctionError;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::extract::ApiJson;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionInfo {
    pub auction_id: String,
    pub auction_name: String,
    pub status: AuctionStatus,
    pub created_by: String,
    pub teams: Vec<Team>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    #[serde(deserialize_with = "flexible_player_id")]
    pub player_id: PlayerId,
    #[serde(default)]
    pub action: Option<String>,
    pub new_price: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub player_id: PlayerId,
    pub player_name: String,
    pub sold_price: u32,
    pub base_price: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
    #[serde(deserialize_with = "flexible_player_id")]
    pub player_id: PlayerId,
    pub franchise: String,
    pub sold_price: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellResponse {
    pub player_id: PlayerId,
    pub player_name: String,
    /// As submitted, not normalized.
    pub franchise: String,
    pub sold_price: u32,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsoldRequest {
    #[serde(deserialize_with = "flexible_player_id")]
    pub player_id: PlayerId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsoldResponse {
    pub player_id: PlayerId,
    pub player_name: String,
    pub base_price: u32,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FranchiseQuery {
    pub auction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

pub async fn get_auction(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<String>,
) -> ApiResult<AuctionInfo> {
    let auction = state
        .db
        .load_auction(&auction_id)
        .map_err(AuctionError::from)?
        .ok_or(AuctionError::AuctionNotFound { auction_id })?;

    Ok(Json(AuctionInfo {
        auction_id: auction.auction_id,
        auction_name: auction.name,
        status: auction.status,
        created_by: auction.created_by,
        teams: auction.teams,
    }))
}

pub async fn get_players(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<String>,
) -> ApiResult<Vec<PlayerListing>> {
    Ok(Json(list_players(&state.db, &auction_id, false)?))
}

pub async fn get_unsold_players(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<String>,
) -> ApiResult<Vec<PlayerListing>> {
    Ok(Json(list_players(&state.db, &auction_id, true)?))
}

pub async fn get_franchise(
    State(state): State<Arc<AppState>>,
    Path(team_name): Path<String>,
    Query(query): Query<FranchiseQuery>,
) -> ApiResult<FranchiseSummary> {
    let auction_id = query
        .auction_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("auctionId query parameter is required".into()))?;
    if team_name.trim().is_empty() {
        return Err(ApiError::BadRequest("team name is required in the path".into()));
    }
    Ok(Json(franchise_summary(&state.db, &auction_id, &team_name)?))
}

pub async fn get_bidding_history(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<String>,
) -> ApiResult<Vec<LedgerEntry>> {
    let entries = state
        .processor
        .ledger()
        .list_by_auction(&auction_id)
        .map_err(AuctionError::from)?;
    Ok(Json(entries))
}

// ---------------------------------------------------------------------------
// Mutations (shared processor: persisted, recorded and broadcast to the room)
// ---------------------------------------------------------------------------

pub async fn update_price(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<String>,
    ApiJson(req): ApiJson<PriceRequest>,
) -> ApiResult<PriceResponse> {
    let outcome = state
        .processor
        .update_price(&auction_id, req.player_id, req.new_price)
        .await?;
    Ok(Json(PriceResponse {
        player_id: outcome.player.player_id,
        player_name: outcome.player_name,
        sold_price: outcome.player.sold_price,
        base_price: outcome.player.base_price,
    }))
}

pub async fn sell_player(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<String>,
    ApiJson(req): ApiJson<SellRequest>,
) -> ApiResult<SellResponse> {
    let outcome = state
        .processor
        .sell_player(&auction_id, req.player_id, &req.franchise, req.sold_price)
        .await?;
    Ok(Json(SellResponse {
        player_id: outcome.player.player_id,
        player_name: outcome.player_name,
        franchise: req.franchise,
        sold_price: outcome.player.sold_price,
        status: "Sold".into(),
    }))
}

pub async fn mark_unsold(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<String>,
    ApiJson(req): ApiJson<UnsoldRequest>,
) -> ApiResult<UnsoldResponse> {
    let outcome = state
        .processor
        .mark_unsold(&auction_id, req.player_id)
        .await?;
    Ok(Json(UnsoldResponse {
        player_id: outcome.player.player_id,
        player_name: outcome.player_name,
        base_price: outcome.player.sold_price,
        status: "Unsold".into(),
    }))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(auction_id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Value> {
    let requested: AuctionStatus = req.status.parse()?;
    let status = state.db.update_status(&auction_id, requested)?;
    Ok(Json(json!({
        "success": true,
        "message": "Auction status updated successfully",
        "auctionId": auction_id,
        "status": status,
    })))
}
