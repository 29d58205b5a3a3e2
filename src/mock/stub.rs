//! Stub generation for unmatched routes
//!
//! In write mode, the first request to a route with no handler file
//! produces a stub seeded with a snapshot of that request. The stub
//! answers `{ "ok": true }` until the developer edits it. Directories
//! and files are created world-writable so the developer can edit them
//! regardless of which user the server runs as.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tokio::fs;

use super::handler::{HandlerDoc, QueryValue, RequestSnapshot, ResponseSpec};
use super::MockError;

/// Everything the dispatcher captures from an inbound request.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub method: String,
    pub path: String,
    /// Path plus query string, exactly as received.
    pub original_uri: String,
    /// Raw authority for URL reconstruction (port included).
    pub authority: String,
    /// Host directory name (port stripped, defaulted if absent).
    pub host: String,
    pub scheme: String,
    pub query: BTreeMap<String, QueryValue>,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl RequestRecord {
    /// Reconstruct the full URL the client requested.
    pub fn full_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority, self.original_uri)
    }

    fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            url: self.full_url(),
            method: self.method.clone(),
            body: serde_json::to_string(&self.body).unwrap_or_else(|_| "null".to_string()),
            query: self.query.clone(),
            headers: self.headers.clone(),
        }
    }
}

/// Render the stub document for a captured request.
pub fn render_stub(record: &RequestRecord) -> Result<String, MockError> {
    let doc = HandlerDoc {
        request: Some(record.snapshot()),
        response: ResponseSpec::default(),
    };
    let body = toml::to_string_pretty(&doc).map_err(MockError::Render)?;
    Ok(format!(
        "# Generated for {} {}\n# Edit [response] to shape the reply for this route.\n\n{body}",
        record.method,
        record.full_url(),
    ))
}

/// Write the stub to `file_path`, creating the directory chain.
/// Returns the generated content so the caller can log it.
pub async fn generate_stub(file_path: &Path, record: &RequestRecord) -> Result<String, MockError> {
    let content = render_stub(record)?;

    if let Some(dir) = file_path.parent() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| MockError::Io(dir.to_path_buf(), e))?;
        set_world_writable(dir).await?;
    }

    fs::write(file_path, &content)
        .await
        .map_err(|e| MockError::Io(file_path.to_path_buf(), e))?;
    set_world_writable(file_path).await?;

    Ok(content)
}

#[cfg(unix)]
async fn set_world_writable(path: &Path) -> Result<(), MockError> {
    use std::os::unix::fs::PermissionsExt;

    let meta = fs::metadata(path)
        .await
        .map_err(|e| MockError::Io(path.to_path_buf(), e))?;
    let mut perms = meta.permissions();
    perms.set_mode(if meta.is_dir() { 0o777 } else { 0o666 });
    fs::set_permissions(path, perms)
        .await
        .map_err(|e| MockError::Io(path.to_path_buf(), e))
}

#[cfg(not(unix))]
async fn set_world_writable(_path: &Path) -> Result<(), MockError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> RequestRecord {
        RequestRecord {
            method: "GET".to_string(),
            path: "/users/1".to_string(),
            original_uri: "/users/1?page=2".to_string(),
            authority: "api.test:3000".to_string(),
            host: "api.test".to_string(),
            scheme: "http".to_string(),
            query: BTreeMap::from([(
                "page".to_string(),
                QueryValue::Single("2".to_string()),
            )]),
            headers: BTreeMap::from([("host".to_string(), "api.test:3000".to_string())]),
            body: serde_json::json!({ "name": "ada" }),
        }
    }

    #[test]
    fn test_full_url_includes_scheme_authority_and_query() {
        let record = sample_record();
        assert_eq!(record.full_url(), "http://api.test:3000/users/1?page=2");
    }

    #[test]
    fn test_rendered_stub_is_a_valid_handler_document() {
        let content = render_stub(&sample_record()).unwrap();
        let doc = HandlerDoc::from_toml(&content).unwrap();

        let snapshot = doc.request.unwrap();
        assert_eq!(snapshot.url, "http://api.test:3000/users/1?page=2");
        assert_eq!(snapshot.method, "GET");
        assert_eq!(
            snapshot.query.get("page"),
            Some(&QueryValue::Single("2".to_string()))
        );
        let body: serde_json::Value = serde_json::from_str(&snapshot.body).unwrap();
        assert_eq!(body["name"], "ada");

        // The default response is the fixed acknowledgment.
        assert_eq!(doc.response.status, 200);
        let ack: serde_json::Value = serde_json::from_str(&doc.response.body).unwrap();
        assert_eq!(ack, serde_json::json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_generate_stub_creates_nested_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("api.test/users/1.toml");

        let content = generate_stub(&file, &sample_record()).await.unwrap();

        let on_disk = std::fs::read_to_string(&file).unwrap();
        assert_eq!(on_disk, content);
        assert!(HandlerDoc::from_toml(&on_disk).is_ok());
    }

    #[tokio::test]
    async fn test_generate_stub_unwritable_root_is_an_error() {
        let result = generate_stub(
            Path::new("/proc/mockserve-no-such-root/x.toml"),
            &sample_record(),
        )
        .await;
        assert!(result.is_err());
    }
}
