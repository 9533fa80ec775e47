//! External delivery channels for relay events.

pub mod webhook;
