// Shared handles for the HTTP API and the real-time server.

use std::sync::Arc;

use auction_core::db::Database;
use auction_core::hub::LiveSessionHub;
use auction_core::processor::PriceUpdateProcessor;

/// One instance per process, shared behind an `Arc`. The REST handlers and
/// the WebSocket connections mutate through the same processor, so both
/// paths are serialized per auction and broadcast to the same rooms.
pub struct AppState {
    pub db: Arc<Database>,
    pub hub: Arc<LiveSessionHub>,
    pub processor: PriceUpdateProcessor,
    /// Per-connection outbound queue capacity.
    pub outbound_buffer: usize,
}

impl AppState {
    pub fn new(db: Arc<Database>, outbound_buffer: usize) -> Self {
        let hub = Arc::new(LiveSessionHub::new());
        let processor = PriceUpdateProcessor::new(Arc::clone(&db), Arc::clone(&hub));
        Self {
            db,
            hub,
            processor,
            outbound_buffer,
        }
    }

    /// State over a fresh in-memory database.
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(Database::open(":memory:")?), 64))
    }
}
