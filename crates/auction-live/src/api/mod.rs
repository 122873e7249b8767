// HTTP API: auction reads, player mutations, franchise summary, ledger.

pub mod error;
pub mod extract;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use handlers::*;

/// Routes under `/api/auctionlive`.
pub fn auction_live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/franchise/{team_name}", get(get_franchise))
        .route("/biddinghistory/{auction_id}", get(get_bidding_history))
        .route("/{auction_id}", get(get_auction))
        .route("/{auction_id}/players", get(get_players))
        .route("/{auction_id}/players/unsold", get(get_unsold_players).post(mark_unsold))
        .route("/{auction_id}/players/price", post(update_price))
        .route("/{auction_id}/players/sell", post(sell_player))
}

/// The complete application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/auctionlive", auction_live_router())
        .route("/api/auction/update-status/{auction_id}", put(update_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
