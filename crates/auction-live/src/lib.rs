// Library root: re-exports all modules so integration tests and the binary
// share one public API.

pub mod api;
pub mod config;
pub mod realtime;
pub mod seed;
pub mod state;
pub mod ws_server;
