//! Domain core for the bot relay.
//!
//! Pure, synchronous building blocks with no I/O: the worker registry, the
//! selection policy, the per-requester cooldown table, the dispatcher that
//! owns all three, and the push-channel wire protocol shared by the relay
//! server and the agent.

pub mod cooldown;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod request;
pub mod selection;
pub mod types;
