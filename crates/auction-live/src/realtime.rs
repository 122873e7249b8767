// Real-time event dispatch: one inbound frame in, zero or more broadcasts out.
// Failures are logged and never reported back to the client.

use auction_core::hub::ConnectionId;
use auction_core::protocol::{ClientEvent, ServerEvent};
use auction_core::{AuctionError, ErrorKind};
use tracing::{debug, error, warn};

use crate::state::AppState;

/// Parse and handle one text frame from `conn`.
pub async fn dispatch_frame(state: &AppState, conn: ConnectionId, text: &str) {
    let event = match ClientEvent::from_json(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(conn, "dropping malformed frame: {e}");
            return;
        }
    };

    let name = event.name();
    let auction_id = event.auction_id().to_string();
    if let Err(err) = handle_event(state, conn, event).await {
        match err.kind() {
            ErrorKind::NotFound | ErrorKind::Validation => {
                warn!(conn, event = name, auction_id = %auction_id, "event dropped: {err}");
            }
            ErrorKind::Persistence => {
                error!(conn, event = name, auction_id = %auction_id, "event failed: {err:#}");
            }
        }
    }
}

/// Apply one parsed event. Storage-touching events go through the shared
/// processor; hand signals and navigation are relayed straight to the room.
pub async fn handle_event(
    state: &AppState,
    conn: ConnectionId,
    event: ClientEvent,
) -> Result<(), AuctionError> {
    match event {
        ClientEvent::UpdatePrice(e) => {
            state
                .processor
                .update_price(&e.auction_id, e.player_id, e.new_price)
                .await?;
        }
        ClientEvent::SellPlayer(e) => {
            state
                .processor
                .sell_player(&e.auction_id, e.player_id, &e.franchise, e.sold_price)
                .await?;
        }
        ClientEvent::MarkUnsold(e) => {
            state.processor.mark_unsold(&e.auction_id, e.player_id).await?;
        }
        ClientEvent::RaiseHand(e) => {
            let sent = state.hub.broadcast(
                &e.auction_id,
                &ServerEvent::HandRaised {
                    player_id: e.player_id,
                    team_name: e.team,
                },
                None,
            );
            debug!(conn, auction_id = %e.auction_id, sent, "hand raised");
        }
        ClientEvent::LowerHand(e) => {
            let sent = state.hub.broadcast(
                &e.auction_id,
                &ServerEvent::HandLowered {
                    player_id: e.player_id,
                    team_name: e.team,
                },
                None,
            );
            debug!(conn, auction_id = %e.auction_id, sent, "hand lowered");
        }
        ClientEvent::ChangePlayer(e) => {
            let sent = state.hub.broadcast(
                &e.auction_id,
                &ServerEvent::PlayerChanged {
                    new_index: e.new_index,
                    show_unsold_only: e.show_unsold_only,
                },
                Some(conn),
            );
            debug!(conn, auction_id = %e.auction_id, new_index = e.new_index, sent, "player changed");
        }
    }
    Ok(())
}
