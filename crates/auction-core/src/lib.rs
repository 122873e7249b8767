// Library root for the live auction synchronization engine: storage, ledger,
// room hub, and the price/sale state machine that ties them together.

pub mod db;
pub mod error;
pub mod franchise;
pub mod hub;
pub mod ledger;
pub mod model;
pub mod processor;
pub mod protocol;

pub use error::{AuctionError, ErrorKind};
