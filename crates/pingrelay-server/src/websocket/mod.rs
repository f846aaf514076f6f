//! WebSocket transport: connection handles, fan-out and the per-client session loop.

pub mod connection;
pub mod hub;
pub mod session;
