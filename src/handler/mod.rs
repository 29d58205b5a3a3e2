//! Request handler module
//!
//! The per-request pipeline: request logging first, then dispatch to
//! the mock handler tree.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
