//! Mock handler core
//!
//! The filesystem tree under the mock root IS the route registry:
//! `mock/<host>/<normalized path>.toml`. This module owns path
//! resolution, the handler document format, the in-memory registry
//! cache, and stub generation for unmatched routes.

pub mod handler;
pub mod path;
pub mod registry;
pub mod stub;

pub use handler::{HandlerDoc, QueryValue, RequestSnapshot, ResponseSpec};
pub use registry::MockRegistry;
pub use stub::RequestRecord;

use std::fmt;
use std::path::PathBuf;

/// Errors from the mock core. Filesystem and parse failures are
/// reported to the client as 500 by the request pipeline.
#[derive(Debug)]
pub enum MockError {
    /// Filesystem operation failed; carries the path it concerned.
    Io(PathBuf, std::io::Error),
    /// Handler document failed to parse as TOML.
    Parse(PathBuf, toml::de::Error),
    /// Handler document failed to serialize during stub generation.
    Render(toml::ser::Error),
}

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, err) => write!(f, "{}: {err}", path.display()),
            Self::Parse(path, err) => write!(f, "{}: invalid handler file: {err}", path.display()),
            Self::Render(err) => write!(f, "failed to render stub: {err}"),
        }
    }
}

impl std::error::Error for MockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(_, err) => Some(err),
            Self::Parse(_, err) => Some(err),
            Self::Render(err) => Some(err),
        }
    }
}
