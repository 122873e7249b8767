// Price/sale/unsold state machine: persist, record, broadcast.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::db::{Database, PlayerChange};
use crate::error::AuctionError;
use crate::hub::LiveSessionHub;
use crate::ledger::BiddingLedger;
use crate::model::{
    unknown_player_name, unsold_ledger_amount, AuctionPlayer, PlayerId, UNSOLD_TEAM,
};
use crate::protocol::ServerEvent;

/// Result of a successful player mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOutcome {
    /// Player state as stored after the change.
    pub player: AuctionPlayer,
    /// Name resolved from the player directory.
    pub player_name: String,
}

/// Applies price, sale and unsold transitions to auction players.
///
/// Every mutation for one auction runs under that auction's async lock, from
/// the persist through the ledger append to the broadcast. Within an auction
/// the order in which changes hit storage is therefore the order in which
/// the room observes them. Auctions never wait on each other.
pub struct PriceUpdateProcessor {
    db: Arc<Database>,
    ledger: BiddingLedger,
    hub: Arc<LiveSessionHub>,
    locks: LockTable,
}

type LockTable = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Held for the duration of one mutation. On drop the auction's entry is
/// removed from the lock table unless another task is holding or waiting
/// on the same lock.
struct AuctionLock<'a> {
    table: &'a LockTable,
    auction_id: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AuctionLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut table = self.table.lock().expect("auction lock table poisoned");
        // One reference in the table, one here.
        if Arc::strong_count(&self.lock) == 2 {
            table.remove(&self.auction_id);
        }
    }
}

impl PriceUpdateProcessor {
    pub fn new(db: Arc<Database>, hub: Arc<LiveSessionHub>) -> Self {
        Self {
            ledger: BiddingLedger::new(Arc::clone(&db)),
            db,
            hub,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &BiddingLedger {
        &self.ledger
    }

    pub fn hub(&self) -> &Arc<LiveSessionHub> {
        &self.hub
    }

    async fn lock_auction(&self, auction_id: &str) -> AuctionLock<'_> {
        let lock = {
            let mut locks = self.locks.lock().expect("auction lock table poisoned");
            Arc::clone(locks.entry(auction_id.to_string()).or_default())
        };
        let mut held = AuctionLock {
            table: &self.locks,
            auction_id: auction_id.to_string(),
            lock,
            guard: None,
        };
        held.guard = Some(Arc::clone(&held.lock).lock_owned().await);
        held
    }

    /// Set a provisional price and announce it. Writes no ledger entry. A
    /// player missing from the directory is reported under a placeholder
    /// name.
    pub async fn update_price(
        &self,
        auction_id: &str,
        player_id: PlayerId,
        new_price: u32,
    ) -> Result<PlayerOutcome, AuctionError> {
        let _guard = self.lock_auction(auction_id).await;

        let player_name = self
            .db
            .player_profile(player_id)?
            .map(|p| p.name)
            .unwrap_or_else(|| unknown_player_name(player_id));

        let player =
            self.db
                .apply_player_change(auction_id, player_id, &PlayerChange::Price(new_price))?;
        debug!(auction_id, player_id, new_price, "price updated");

        self.hub.broadcast(
            auction_id,
            &ServerEvent::PriceUpdate {
                player_id,
                new_price,
            },
            None,
        );

        Ok(PlayerOutcome {
            player,
            player_name,
        })
    }

    /// Sell a player to `franchise`. The stored team is normalized; the
    /// ledger and the broadcast carry the name exactly as given.
    pub async fn sell_player(
        &self,
        auction_id: &str,
        player_id: PlayerId,
        franchise: &str,
        sold_price: u32,
    ) -> Result<PlayerOutcome, AuctionError> {
        let _guard = self.lock_auction(auction_id).await;

        let player_name = self.resolve_name(auction_id, player_id)?;
        let change = PlayerChange::Sell {
            franchise: franchise.to_string(),
            sold_price,
        };
        let player = self.db.apply_player_change(auction_id, player_id, &change)?;
        info!(auction_id, player_id, franchise, sold_price, "player sold");

        let recorded = self
            .ledger
            .append(auction_id, &player_name, franchise, sold_price);

        self.hub.broadcast(
            auction_id,
            &ServerEvent::PlayerSold {
                player_id,
                franchise: franchise.to_string(),
                sold_price,
            },
            None,
        );

        self.finish(auction_id, player_id, recorded, player, player_name)
    }

    /// Return a player to the pool at half its base price.
    pub async fn mark_unsold(
        &self,
        auction_id: &str,
        player_id: PlayerId,
    ) -> Result<PlayerOutcome, AuctionError> {
        let _guard = self.lock_auction(auction_id).await;

        let player_name = self.resolve_name(auction_id, player_id)?;
        let player = self
            .db
            .apply_player_change(auction_id, player_id, &PlayerChange::Unsold)?;
        let base_price = player.sold_price;
        info!(auction_id, player_id, base_price, "player marked unsold");

        let recorded = self.ledger.append(
            auction_id,
            &player_name,
            UNSOLD_TEAM,
            unsold_ledger_amount(base_price),
        );

        self.hub.broadcast(
            auction_id,
            &ServerEvent::PlayerUnsold {
                player_id,
                base_price,
            },
            None,
        );

        self.finish(auction_id, player_id, recorded, player, player_name)
    }

    /// Check the auction and player exist, then resolve the player's name.
    /// Nothing is mutated if any lookup fails.
    fn resolve_name(&self, auction_id: &str, player_id: PlayerId) -> Result<String, AuctionError> {
        self.db.auction_player(auction_id, player_id)?;
        self.db
            .player_profile(player_id)?
            .map(|p| p.name)
            .ok_or(AuctionError::ProfileNotFound { player_id })
    }

    fn finish(
        &self,
        auction_id: &str,
        player_id: PlayerId,
        recorded: anyhow::Result<crate::ledger::LedgerEntry>,
        player: AuctionPlayer,
        player_name: String,
    ) -> Result<PlayerOutcome, AuctionError> {
        match recorded {
            Ok(entry) => {
                debug!(auction_id, player_id, entry_id = entry.id, "ledger entry appended");
                Ok(PlayerOutcome {
                    player,
                    player_name,
                })
            }
            Err(source) => {
                error!(
                    auction_id,
                    player_id, "player state persisted but ledger append failed: {source:#}"
                );
                Err(AuctionError::LedgerDivergence {
                    auction_id: auction_id.to_string(),
                    player_id,
                    source,
                })
            }
        }
    }
}
