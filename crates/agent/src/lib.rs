//! Reference agent for the bot relay.
//!
//! Holds the push-channel connection for a set of bots, runs the jobs the
//! relay assigns to them, and reports each outcome back.

pub mod config;
pub mod executor;
pub mod session;
