// Route-to-file path resolution
// Maps (host, request path) onto the handler tree deterministically.

use std::path::{Path, PathBuf};

/// Apply the index rule: a path ending in `/` gets the literal
/// segment `index` appended, so `/api/` and `/api/index` name the
/// same handler file. No other normalization happens here.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    };
    if normalized.ends_with('/') {
        normalized.push_str("index");
    }
    normalized
}

/// Resolve the Host header into the directory name under the mock root.
///
/// The port is stripped (`api.test:3000` -> `api.test`). An absent,
/// empty, or unsafe host (anything containing a path separator or a
/// `..` segment would escape the mock root) falls back to the
/// configured default host.
pub fn normalize_host(host: Option<&str>, default_host: &str) -> String {
    let Some(raw) = host else {
        return default_host.to_string();
    };
    let bare = raw.split(':').next().unwrap_or(raw);
    if bare.is_empty() || bare.contains('/') || bare.contains('\\') || bare.contains("..") {
        return default_host.to_string();
    }
    bare.to_string()
}

/// Build the handler file path: `<root>/<host><normalized path>.<ext>`.
///
/// `..` segments in the request path are dropped so a crafted path
/// cannot resolve outside the mock root.
pub fn handler_file_path(root: &Path, host: &str, normalized_path: &str, ext: &str) -> PathBuf {
    let mut segments: Vec<&str> = normalized_path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".." && *s != ".")
        .collect();
    let last = segments.pop().unwrap_or("index");

    let mut file = root.join(host);
    for segment in segments {
        file.push(segment);
    }
    // Append rather than set_extension: a dot inside the final path
    // segment must not be treated as an existing extension.
    file.push(format!("{last}.{ext}"));
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_plain() {
        assert_eq!(normalize_path("/users/1"), "/users/1");
    }

    #[test]
    fn test_normalize_path_trailing_slash_appends_index() {
        assert_eq!(normalize_path("/api/"), "/api/index");
        assert_eq!(normalize_path("/"), "/index");
    }

    #[test]
    fn test_trailing_slash_and_explicit_index_resolve_identically() {
        let root = Path::new("mock");
        let via_slash = handler_file_path(root, "localhost", &normalize_path("/api/"), "toml");
        let via_index = handler_file_path(root, "localhost", &normalize_path("/api/index"), "toml");
        assert_eq!(via_slash, via_index);
    }

    #[test]
    fn test_root_path_resolves_to_index_file() {
        let root = Path::new("mock");
        let file = handler_file_path(root, "localhost", &normalize_path("/"), "toml");
        assert_eq!(file, PathBuf::from("mock/localhost/index.toml"));
    }

    #[test]
    fn test_handler_file_path_nested() {
        let root = Path::new("mock");
        let file = handler_file_path(root, "api.test", &normalize_path("/users/1"), "toml");
        assert_eq!(file, PathBuf::from("mock/api.test/users/1.toml"));
    }

    #[test]
    fn test_handler_file_path_drops_parent_segments() {
        let root = Path::new("mock");
        let file = handler_file_path(root, "localhost", "/../../etc/passwd", "toml");
        assert_eq!(file, PathBuf::from("mock/localhost/etc/passwd.toml"));
    }

    #[test]
    fn test_handler_file_path_keeps_dotted_segment() {
        let root = Path::new("mock");
        let file = handler_file_path(root, "localhost", "/v1.2/users", "toml");
        assert_eq!(file, PathBuf::from("mock/localhost/v1.2/users.toml"));
    }

    #[test]
    fn test_normalize_host_strips_port() {
        assert_eq!(normalize_host(Some("api.test:3000"), "localhost"), "api.test");
    }

    #[test]
    fn test_normalize_host_missing_falls_back() {
        assert_eq!(normalize_host(None, "localhost"), "localhost");
        assert_eq!(normalize_host(Some(""), "localhost"), "localhost");
    }

    #[test]
    fn test_normalize_host_rejects_traversal() {
        assert_eq!(normalize_host(Some("../outside"), "localhost"), "localhost");
        assert_eq!(normalize_host(Some("a/b"), "localhost"), "localhost");
    }
}
