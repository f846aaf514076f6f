//! # pingrelay-core
//!
//! Foundation types for the pingrelay server:
//!
//! - **Branded IDs**: [`ConnectionId`] newtype over UUID v7 strings
//! - **Sessions**: [`Session`] latency/clock state with a bounded [`LatencyWindow`]
//! - **Ping protocol**: payload stamping and reply parsing in [`ping`]
//! - **Wire**: the `{type, data}` [`Envelope`] and configurable [`Tags`]
//! - **Clock**: [`Clock`] trait with system and manual implementations
//! - **Errors**: [`RelayError`] via `thiserror`

#![deny(unsafe_code)]

pub mod clock;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod ping;
pub mod session;
pub mod wire;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::RelayError;
pub use ids::ConnectionId;
pub use ping::PingReply;
pub use session::{LATENCY_WINDOW_SIZE, LatencyWindow, Session};
pub use wire::{Envelope, TagKind, Tags};
