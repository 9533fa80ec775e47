//! Bot relay server library.
//!
//! Exposes the building blocks (config, state, relay service, error
//! handling, routes, WebSocket infrastructure) so integration tests and the
//! binary entrypoint share them.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod relay;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
