//! HTTP protocol layer
//!
//! Response builders and query-string parsing, decoupled from the
//! mock dispatch logic.

pub mod query;
pub mod response;

pub use query::parse_query;
pub use response::{
    apply_cors, build_400_response, build_404_response, build_413_response, build_500_response,
};
