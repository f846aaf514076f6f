//! # pingrelay-server
//!
//! Session registry, event dispatch and the Axum `WebSocket` transport.
//!
//! - [`relay::RelayFacade`]: the surface transport events flow through
//! - [`registry::SessionRegistry`]: live sessions keyed by connection id
//! - [`dispatcher::EventDispatcher`]: ordered observer lists per event kind
//! - [`server::RelayServer`]: `/ws`, `/health` and `/metrics` routes
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::{ConfigError, ServerConfig, load_config};
pub use dispatcher::{EventDispatcher, EventKind, RelayEvent, SubscriptionId};
pub use registry::SessionRegistry;
pub use relay::{DropReason, Outcome, RelayFacade};
pub use server::{RelayServer, ServerError};
