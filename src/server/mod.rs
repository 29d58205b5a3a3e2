//! Server module
//!
//! Listener creation and per-connection serving: one spawned task per
//! accepted connection, with an optional connection limit and
//! configurable timeouts.

pub mod connection;
pub mod listener;

pub use connection::accept_connection;
pub use listener::create_reusable_listener;
