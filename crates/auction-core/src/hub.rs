// Room registry and event fan-out for live auction connections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::protocol::ServerEvent;

/// Process-unique identifier for one real-time connection.
pub type ConnectionId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("connection {0} did not name an auction to join")]
    MissingAuctionId(ConnectionId),
}

#[derive(Default)]
struct Rooms {
    /// auction id -> (connection -> outbound frame queue)
    rooms: HashMap<String, HashMap<ConnectionId, mpsc::Sender<String>>>,
    /// connection -> auction id it is joined to
    membership: HashMap<ConnectionId, String>,
}

/// Registry of auction rooms. One room per auction id, created on first join
/// and torn down when its last connection leaves.
///
/// Each connection owns a bounded outbound queue drained by its own writer
/// task. Broadcasting only ever does a non-blocking `try_send` per member,
/// so a slow client or a busy room never stalls any other room.
#[derive(Default)]
pub struct LiveSessionHub {
    state: RwLock<Rooms>,
    next_id: AtomicU64,
}

impl LiveSessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identifier for a newly accepted connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Add `conn` to the room for `auction_id`.
    ///
    /// Joining the same room again only refreshes the outbound queue. A
    /// connection joined elsewhere is moved. An empty id is refused.
    pub fn join(
        &self,
        auction_id: &str,
        conn: ConnectionId,
        outbound: mpsc::Sender<String>,
    ) -> Result<(), HubError> {
        let auction_id = auction_id.trim();
        if auction_id.is_empty() {
            return Err(HubError::MissingAuctionId(conn));
        }

        let mut state = self.state.write().expect("hub lock poisoned");
        if let Some(previous) = state.membership.get(&conn).cloned() {
            if previous != auction_id {
                remove_member(&mut state, &previous, conn);
            }
        }

        state
            .rooms
            .entry(auction_id.to_string())
            .or_default()
            .insert(conn, outbound);
        state.membership.insert(conn, auction_id.to_string());
        info!(auction_id, conn, "connection joined room");
        Ok(())
    }

    /// Remove `conn` from whatever room it is in. Returns the room it left.
    pub fn leave(&self, conn: ConnectionId) -> Option<String> {
        let mut state = self.state.write().expect("hub lock poisoned");
        let auction_id = state.membership.remove(&conn)?;
        remove_member(&mut state, &auction_id, conn);
        info!(auction_id = %auction_id, conn, "connection left room");
        Some(auction_id)
    }

    /// Deliver `event` to every member of the room except `exclude`.
    ///
    /// Best-effort and at-most-once: a member whose queue is full or closed
    /// misses the event. Returns how many members it was queued for.
    pub fn broadcast(
        &self,
        auction_id: &str,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let frame = match event.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                error!(auction_id, event = event.name(), "failed to serialize event: {e}");
                return 0;
            }
        };

        let state = self.state.read().expect("hub lock poisoned");
        let Some(members) = state.rooms.get(auction_id) else {
            debug!(auction_id, event = event.name(), "broadcast to empty room");
            return 0;
        };

        let mut delivered = 0;
        for (&conn, outbound) in members {
            if Some(conn) == exclude {
                continue;
            }
            match outbound.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(auction_id, conn, event = event.name(), "outbound queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(auction_id, conn, event = event.name(), "connection closing, event dropped");
                }
            }
        }
        delivered
    }

    /// Number of connections currently in a room.
    pub fn room_size(&self, auction_id: &str) -> usize {
        let state = self.state.read().expect("hub lock poisoned");
        state.rooms.get(auction_id).map_or(0, HashMap::len)
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.state.read().expect("hub lock poisoned").rooms.len()
    }

    pub fn room_of(&self, conn: ConnectionId) -> Option<String> {
        let state = self.state.read().expect("hub lock poisoned");
        state.membership.get(&conn).cloned()
    }
}

fn remove_member(state: &mut Rooms, auction_id: &str, conn: ConnectionId) {
    if let Some(members) = state.rooms.get_mut(auction_id) {
        members.remove(&conn);
        if members.is_empty() {
            state.rooms.remove(auction_id);
            debug!(auction_id, "room torn down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(player_id: u32, new_price: u32) -> ServerEvent {
        ServerEvent::PriceUpdate {
            player_id,
            new_price,
        }
    }

    fn member(hub: &LiveSessionHub, auction_id: &str) -> (ConnectionId, mpsc::Receiver<String>) {
        let conn = hub.next_connection_id();
        let (tx, rx) = mpsc::channel(16);
        hub.join(auction_id, conn, tx).unwrap();
        (conn, rx)
    }

    #[test]
    fn connection_ids_are_unique() {
        let hub = LiveSessionHub::new();
        let a = hub.next_connection_id();
        let b = hub.next_connection_id();
        assert_ne!(a, b);
    }

    #[test]
    fn join_without_auction_id_fails_closed() {
        let hub = LiveSessionHub::new();
        let (tx, _rx) = mpsc::channel(1);
        assert_eq!(hub.join("  ", 9, tx), Err(HubError::MissingAuctionId(9)));
        assert_eq!(hub.room_count(), 0);
        assert_eq!(hub.room_of(9), None);
    }

    #[test]
    fn join_is_idempotent() {
        let hub = LiveSessionHub::new();
        let (conn, _rx) = member(&hub, "A001");
        let (tx, _rx2) = mpsc::channel(1);
        hub.join("A001", conn, tx).unwrap();
        assert_eq!(hub.room_size("A001"), 1);
    }

    #[test]
    fn rejoining_elsewhere_moves_the_connection() {
        let hub = LiveSessionHub::new();
        let (conn, _rx) = member(&hub, "A001");
        let (tx, _rx2) = mpsc::channel(1);
        hub.join("B002", conn, tx).unwrap();
        assert_eq!(hub.room_size("A001"), 0);
        assert_eq!(hub.room_size("B002"), 1);
        assert_eq!(hub.room_count(), 1);
    }

    #[test]
    fn broadcast_reaches_every_member_of_the_room_only() {
        let hub = LiveSessionHub::new();
        let (_a, mut rx_a) = member(&hub, "A001");
        let (_b, mut rx_b) = member(&hub, "A001");
        let (_c, mut rx_c) = member(&hub, "B002");

        assert_eq!(hub.broadcast("A001", &price(7, 300), None), 2);

        let expected = price(7, 300).to_json().unwrap();
        assert_eq!(rx_a.try_recv().unwrap(), expected);
        assert_eq!(rx_b.try_recv().unwrap(), expected);
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn broadcast_can_exclude_the_sender() {
        let hub = LiveSessionHub::new();
        let (sender, mut rx_sender) = member(&hub, "A001");
        let (_other, mut rx_other) = member(&hub, "A001");

        let changed = ServerEvent::PlayerChanged {
            new_index: 3,
            show_unsold_only: false,
        };
        assert_eq!(hub.broadcast("A001", &changed, Some(sender)), 1);
        assert!(rx_sender.try_recv().is_err());
        assert!(rx_other.try_recv().is_ok());
    }

    #[test]
    fn events_arrive_in_broadcast_order() {
        let hub = LiveSessionHub::new();
        let (_conn, mut rx) = member(&hub, "A001");
        for p in [100, 200, 300] {
            hub.broadcast("A001", &price(7, p), None);
        }
        for p in [100, 200, 300] {
            assert_eq!(rx.try_recv().unwrap(), price(7, p).to_json().unwrap());
        }
    }

    #[test]
    fn leave_tears_down_empty_rooms() {
        let hub = LiveSessionHub::new();
        let (a, _rx_a) = member(&hub, "A001");
        let (b, _rx_b) = member(&hub, "A001");

        assert_eq!(hub.leave(a).as_deref(), Some("A001"));
        assert_eq!(hub.room_size("A001"), 1);
        assert_eq!(hub.leave(b).as_deref(), Some("A001"));
        assert_eq!(hub.room_count(), 0);
        assert_eq!(hub.leave(b), None);
    }

    #[test]
    fn full_or_closed_queues_do_not_block_others() {
        let hub = LiveSessionHub::new();
        let (tx_full, _rx_full) = mpsc::channel(1);
        hub.join("A001", 101, tx_full).unwrap();
        let (tx_closed, rx_closed) = mpsc::channel(1);
        hub.join("A001", 102, tx_closed).unwrap();
        drop(rx_closed);
        let (_ok, mut rx_ok) = member(&hub, "A001");

        assert_eq!(hub.broadcast("A001", &price(1, 1), None), 2);
        // Queue of connection 101 is now full; only the healthy member gets this.
        assert_eq!(hub.broadcast("A001", &price(1, 2), None), 1);
        assert!(rx_ok.try_recv().is_ok());
        assert!(rx_ok.try_recv().is_ok());
    }

    #[test]
    fn broadcast_to_unknown_room_is_a_no_op() {
        let hub = LiveSessionHub::new();
        assert_eq!(hub.broadcast("ghost", &price(1, 1), None), 0);
    }
}
