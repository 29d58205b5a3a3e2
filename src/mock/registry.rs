//! Route registry
//!
//! In-memory cache over the handler tree, keyed by (host, normalized
//! path). The tree is scanned once at startup; lookups that miss the
//! cache probe the filesystem on demand, so a stub generated earlier
//! in the same process is served without a restart. Entries are
//! append-only and never invalidated within a process lifetime --
//! handler edits are picked up by restarting the server.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::handler::HandlerDoc;
use super::path::handler_file_path;
use super::MockError;
use crate::logger;

type RouteKey = (String, String);

pub struct MockRegistry {
    root: PathBuf,
    extension: String,
    handlers: RwLock<HashMap<RouteKey, Arc<HandlerDoc>>>,
}

impl MockRegistry {
    /// Open the registry over `root`, scanning whatever handler tree
    /// already exists. Returns the registry and the number of routes
    /// loaded; unparseable files are logged and skipped.
    pub fn open(root: PathBuf, extension: String) -> (Self, usize) {
        let mut handlers = HashMap::new();
        if root.is_dir() {
            scan_hosts(&root, &extension, &mut handlers);
        }
        let count = handlers.len();
        (
            Self {
                root,
                extension,
                handlers: RwLock::new(handlers),
            },
            count,
        )
    }

    /// The handler file path a route resolves to.
    pub fn file_path(&self, host: &str, normalized_path: &str) -> PathBuf {
        handler_file_path(&self.root, host, normalized_path, &self.extension)
    }

    /// Resolve a route to its handler, if one exists.
    ///
    /// Cache miss falls through to a filesystem probe; a file that
    /// exists but cannot be read or parsed is an error (reported as
    /// 500 upstream), not a miss.
    pub async fn lookup(
        &self,
        host: &str,
        normalized_path: &str,
    ) -> Result<Option<Arc<HandlerDoc>>, MockError> {
        let key = (host.to_string(), normalized_path.to_string());
        {
            let handlers = self.handlers.read().await;
            if let Some(doc) = handlers.get(&key) {
                return Ok(Some(Arc::clone(doc)));
            }
        }

        let file = self.file_path(host, normalized_path);
        let source = match tokio::fs::read_to_string(&file).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MockError::Io(file, e)),
        };
        let doc = HandlerDoc::from_toml(&source).map_err(|e| MockError::Parse(file, e))?;

        let mut handlers = self.handlers.write().await;
        // A racing lookup may have inserted first; keep its instance so
        // every request to the route shares one loaded handler.
        let entry = handlers
            .entry(key)
            .or_insert_with(|| Arc::new(doc));
        Ok(Some(Arc::clone(entry)))
    }
}

/// Walk `root`'s host directories: `<root>/<host>/**/*.<ext>`.
fn scan_hosts(root: &Path, extension: &str, handlers: &mut HashMap<RouteKey, Arc<HandlerDoc>>) {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            logger::log_warning(&format!("Cannot read mock root {}: {e}", root.display()));
            return;
        }
    };
    for entry in entries.flatten() {
        let host_dir = entry.path();
        if !host_dir.is_dir() {
            continue;
        }
        if let Some(host) = entry.file_name().to_str() {
            scan_routes(&host_dir, host, "", extension, handlers);
        }
    }
}

fn scan_routes(
    dir: &Path,
    host: &str,
    route_prefix: &str,
    extension: &str,
    handlers: &mut HashMap<RouteKey, Arc<HandlerDoc>>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            logger::log_warning(&format!("Cannot read {}: {e}", dir.display()));
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(ToString::to_string) else {
            continue;
        };
        if path.is_dir() {
            let prefix = format!("{route_prefix}/{name}");
            scan_routes(&path, host, &prefix, extension, handlers);
            continue;
        }

        let suffix = format!(".{extension}");
        let Some(stem) = name.strip_suffix(&suffix) else {
            continue;
        };
        let route = format!("{route_prefix}/{stem}");

        match std::fs::read_to_string(&path) {
            Ok(source) => match HandlerDoc::from_toml(&source) {
                Ok(doc) => {
                    handlers.insert((host.to_string(), route), Arc::new(doc));
                }
                Err(e) => {
                    logger::log_warning(&format!(
                        "Skipping invalid handler file {}: {e}",
                        path.display()
                    ));
                }
            },
            Err(e) => {
                logger::log_warning(&format!("Cannot read {}: {e}", path.display()));
            }
        }
    }
}
