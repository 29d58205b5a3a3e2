// Application state module
// Owns the route registry and runtime toggles shared across connections

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use tokio::sync::Mutex;

use super::types::Config;
use crate::mock::MockRegistry;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Route registry over the handler tree.
    pub registry: MockRegistry,
    /// Serializes stub generation so racing misses for the same route
    /// cannot interleave their writes.
    pub generation_lock: Mutex<()>,
    /// Cached config value for fast access without locks
    pub cached_access_log: AtomicBool,
}

impl AppState {
    /// Create `AppState`, scanning the handler tree into the registry.
    /// Returns the state and the number of routes discovered.
    pub fn new(config: Config) -> (Self, usize) {
        let (registry, routes) = MockRegistry::open(
            PathBuf::from(&config.mock.root_dir),
            config.mock.extension.clone(),
        );
        let cached_access_log = AtomicBool::new(config.logging.access_log);

        (
            Self {
                config,
                registry,
                generation_lock: Mutex::new(()),
                cached_access_log,
            },
            routes,
        )
    }
}
