//! Request pipeline
//!
//! Entry point for HTTP request processing. Two stages, in order:
//! the request logger (always runs, never affects the exchange) and
//! the dispatcher (resolves the route against the handler tree and
//! terminates the request). Response logging wraps the dispatcher as
//! a decorator: the outgoing body and final status are logged here,
//! at the pipeline boundary, once the response is built.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Request, Response};
use serde_json::Value;

use crate::config::AppState;
use crate::http::{self, parse_query};
use crate::logger::{self, AccessLogEntry};
use crate::mock::path::{normalize_host, normalize_path};
use crate::mock::{stub, RequestRecord};

/// What the dispatcher hands back to the pipeline: the response plus
/// a copy of its body bytes for the response logger.
struct DispatchOutcome {
    response: Response<Full<Bytes>>,
    body: Bytes,
}

impl DispatchOutcome {
    fn new(response: Response<Full<Bytes>>, body: Bytes) -> Self {
        Self { response, body }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let started = Instant::now();
    let access_log = state
        .cached_access_log
        .load(std::sync::atomic::Ordering::Relaxed);
    let request_id = state.config.logging.request_ids.then(logger::request_id);
    let rid = request_id.as_deref();

    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();
    let original_uri = parts
        .uri
        .path_and_query()
        .map_or_else(|| path.clone(), |pq| pq.as_str().to_string());

    // Reject oversized bodies before buffering anything.
    if content_length_exceeds(&parts.headers, state.config.http.max_body_size) {
        logger::log_error(&format!(
            "Request body too large (max: {})",
            state.config.http.max_body_size
        ));
        return Ok(finish(
            DispatchOutcome::new(http::build_413_response(), Bytes::new()),
            &state,
            rid,
            access_log,
            &parts.method.to_string(),
            &path,
            "",
            remote_addr,
            started,
        ));
    }

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            logger::log_error(&format!("Failed to read request body: {e}"));
            return Ok(finish(
                DispatchOutcome::new(http::build_400_response(), Bytes::new()),
                &state,
                rid,
                access_log,
                &parts.method.to_string(),
                &path,
                "",
                remote_addr,
                started,
            ));
        }
    };

    let body_value = match parse_body(&parts.headers, &body_bytes) {
        Ok(value) => value,
        Err(e) => {
            logger::log_error(&format!("Malformed JSON body: {e}"));
            return Ok(finish(
                DispatchOutcome::new(http::build_400_response(), Bytes::new()),
                &state,
                rid,
                access_log,
                &parts.method.to_string(),
                &path,
                "",
                remote_addr,
                started,
            ));
        }
    };

    let raw_host = parts
        .headers
        .get(hyper::header::HOST)
        .and_then(|v| v.to_str().ok());
    let host = normalize_host(raw_host, &state.config.mock.default_host);
    let authority = raw_host.unwrap_or(&host).to_string();

    let record = RequestRecord {
        method: parts.method.to_string(),
        path: path.clone(),
        original_uri,
        authority,
        host,
        scheme: "http".to_string(),
        query: parse_query(parts.uri.query()),
        headers: header_map(&parts.headers),
        body: body_value,
    };

    // Stage 1: request logger.
    if access_log {
        logger::log_request_block(rid, &record);
    }

    // Stage 2: dispatcher.
    let outcome = dispatch(&record, &state, rid).await;

    Ok(finish(
        outcome,
        &state,
        rid,
        access_log,
        &record.method,
        &record.path,
        &record.host,
        remote_addr,
        started,
    ))
}

/// Resolve the route and produce the response. Every request that
/// reaches the dispatcher is terminated here; handlers are the only
/// source of non-fixed responses.
async fn dispatch(
    record: &RequestRecord,
    state: &Arc<AppState>,
    request_id: Option<&str>,
) -> DispatchOutcome {
    let normalized = normalize_path(&record.path);

    match state.registry.lookup(&record.host, &normalized).await {
        Ok(Some(doc)) => {
            let body = Bytes::from(doc.response.body.clone());
            DispatchOutcome::new(doc.invoke(request_id), body)
        }
        Ok(None) => {
            logger::log_route_miss(request_id, &normalized);
            if state.config.mock.write_mode {
                if let Err(outcome) = generate_missing_stub(record, state, &normalized, request_id).await {
                    return outcome;
                }
            } else {
                logger::log_write_mode_hint(request_id);
            }
            DispatchOutcome::new(
                http::build_404_response(),
                Bytes::from_static(http::response::NOT_FOUND_BODY.as_bytes()),
            )
        }
        Err(e) => {
            logger::log_error(&format!("Handler resolution failed: {e}"));
            DispatchOutcome::new(
                http::build_500_response(),
                Bytes::from_static(b"Internal server error"),
            )
        }
    }
}

/// Write-mode branch for an unmatched route. The stub never serves
/// the request that created it; on success the caller still answers
/// 404. Filesystem failures short-circuit to a 500 outcome.
async fn generate_missing_stub(
    record: &RequestRecord,
    state: &Arc<AppState>,
    normalized: &str,
    request_id: Option<&str>,
) -> Result<(), DispatchOutcome> {
    let file = state.registry.file_path(&record.host, normalized);

    // Generation is serialized per process; racing misses for the
    // same route re-check existence under the lock so only the first
    // one writes.
    let _guard = state.generation_lock.lock().await;
    match tokio::fs::try_exists(&file).await {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(e) => {
            logger::log_error(&format!("Cannot probe {}: {e}", file.display()));
            return Err(DispatchOutcome::new(
                http::build_500_response(),
                Bytes::from_static(b"Internal server error"),
            ));
        }
    }

    match stub::generate_stub(&file, record).await {
        Ok(content) => {
            logger::log_stub_created(request_id, &file, &content);
            Ok(())
        }
        Err(e) => {
            logger::log_error(&format!("Stub generation failed: {e}"));
            Err(DispatchOutcome::new(
                http::build_500_response(),
                Bytes::from_static(b"Internal server error"),
            ))
        }
    }
}

/// Decorator tail: log the outgoing body and final status, emit the
/// access log summary line, apply CORS, return the response.
#[allow(clippy::too_many_arguments)]
fn finish(
    outcome: DispatchOutcome,
    state: &Arc<AppState>,
    request_id: Option<&str>,
    access_log: bool,
    method: &str,
    path: &str,
    host: &str,
    remote_addr: SocketAddr,
    started: Instant,
) -> Response<Full<Bytes>> {
    let DispatchOutcome { mut response, body } = outcome;

    if access_log {
        logger::log_response_sent(request_id, response.status().as_u16(), &body);

        let mut entry = AccessLogEntry::new(
            remote_addr.ip().to_string(),
            method.to_string(),
            path.to_string(),
            host.to_string(),
        );
        entry.request_id = request_id.map(ToString::to_string);
        entry.status = response.status().as_u16();
        entry.body_bytes = body.len();
        entry.request_time_us =
            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.format);
    }

    if state.config.http.enable_cors {
        http::apply_cors(&mut response);
    }
    response
}

/// Content-Length check, kept separate from body collection so the
/// limit applies before any buffering.
fn content_length_exceeds(headers: &HeaderMap, max_body_size: u64) -> bool {
    headers
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .is_some_and(|size| size > max_body_size)
}

/// JSON bodies are parsed; anything else (including no body) records
/// as an empty object, which is what the stub snapshot embeds.
fn parse_body(headers: &HeaderMap, bytes: &Bytes) -> Result<Value, serde_json::Error> {
    let is_json = headers
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));
    if is_json && !bytes.is_empty() {
        serde_json::from_slice(bytes)
    } else {
        Ok(Value::Object(serde_json::Map::new()))
    }
}

/// Header map snapshot, lossy for non-UTF-8 values.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mock::HandlerDoc;

    fn test_state(root: &std::path::Path, write_mode: bool) -> Arc<AppState> {
        let mut config = Config::load_from("no-such-config-file").unwrap();
        config.mock.root_dir = root.to_string_lossy().into_owned();
        config.mock.write_mode = write_mode;
        config.logging.access_log = false;
        let (state, _) = AppState::new(config);
        Arc::new(state)
    }

    fn request(method: &str, uri: &str, host: Option<&str>) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(host) = host {
            builder = builder.header("host", host);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn body_of(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn write_handler(root: &std::path::Path, rel: &str, content: &str) {
        let file = root.join(rel);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, content).unwrap();
    }

    #[tokio::test]
    async fn test_existing_handler_is_served_without_writes() {
        let tmp = tempfile::tempdir().unwrap();
        write_handler(
            tmp.path(),
            "api.test/users/1.toml",
            "[response]\nstatus = 200\nbody = '{ \"id\": 1 }'\n",
        );
        let state = test_state(tmp.path(), true);

        let before: Vec<_> = walk(tmp.path());
        let response = handle_request(request("GET", "/users/1", Some("api.test")), state, peer())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(body_of(response).await, "{ \"id\": 1 }");
        assert_eq!(walk(tmp.path()), before);
    }

    #[tokio::test]
    async fn test_miss_write_mode_off_is_404_and_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), false);

        let response = handle_request(request("GET", "/users/1", Some("api.test")), state, peer())
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(body_of(response).await, "Handler file not found");
        assert!(walk(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_miss_write_mode_on_creates_stub_and_still_404s() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), true);

        let response = handle_request(
            request("GET", "/users/1?page=2", Some("api.test")),
            Arc::clone(&state),
            peer(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(body_of(response).await, "Handler file not found");

        let stub_path = tmp.path().join("api.test/users/1.toml");
        let source = std::fs::read_to_string(&stub_path).unwrap();
        let doc = HandlerDoc::from_toml(&source).unwrap();
        let snapshot = doc.request.unwrap();
        assert_eq!(snapshot.url, "http://api.test/users/1?page=2");
        assert_eq!(snapshot.method, "GET");
        assert_eq!(walk(tmp.path()), vec![stub_path]);
    }

    #[tokio::test]
    async fn test_generated_stub_serves_subsequent_request() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), true);

        let first = handle_request(
            request("GET", "/users/1", Some("api.test")),
            Arc::clone(&state),
            peer(),
        )
        .await
        .unwrap();
        assert_eq!(first.status(), 404);

        // Fresh state simulates a process restart; the on-demand probe
        // in the same process behaves identically.
        let restarted = test_state(tmp.path(), true);
        let second = handle_request(
            request("GET", "/users/1", Some("api.test")),
            restarted,
            peer(),
        )
        .await
        .unwrap();
        assert_eq!(second.status(), 200);
        let value: serde_json::Value = serde_json::from_str(&body_of(second).await).unwrap();
        assert_eq!(value, serde_json::json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_trailing_slash_resolves_to_index_handler() {
        let tmp = tempfile::tempdir().unwrap();
        write_handler(tmp.path(), "localhost/api/index.toml", "[response]\n");
        let state = test_state(tmp.path(), false);

        let via_slash = handle_request(
            request("GET", "/api/", Some("localhost")),
            Arc::clone(&state),
            peer(),
        )
        .await
        .unwrap();
        let via_index = handle_request(
            request("GET", "/api/index", Some("localhost")),
            state,
            peer(),
        )
        .await
        .unwrap();
        assert_eq!(via_slash.status(), 200);
        assert_eq!(via_index.status(), 200);
    }

    #[tokio::test]
    async fn test_missing_host_uses_default_host() {
        let tmp = tempfile::tempdir().unwrap();
        write_handler(tmp.path(), "localhost/index.toml", "[response]\n");
        let state = test_state(tmp.path(), false);

        let response = handle_request(request("GET", "/", None), state, peer())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_host_port_is_stripped_for_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), true);

        let response = handle_request(
            request("POST", "/users/1", Some("api.test:3000")),
            state,
            peer(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), 404);

        let stub_path = tmp.path().join("api.test/users/1.toml");
        let doc = HandlerDoc::from_toml(&std::fs::read_to_string(&stub_path).unwrap()).unwrap();
        // The directory drops the port; the captured URL keeps it.
        assert_eq!(
            doc.request.unwrap().url,
            "http://api.test:3000/users/1"
        );
    }

    #[tokio::test]
    async fn test_json_body_is_captured_in_stub() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), true);

        let req = Request::builder()
            .method("POST")
            .uri("/orders")
            .header("host", "api.test")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(b"{\"qty\":3}")))
            .unwrap();
        let response = handle_request(req, state, peer()).await.unwrap();
        assert_eq!(response.status(), 404);

        let doc = HandlerDoc::from_toml(
            &std::fs::read_to_string(tmp.path().join("api.test/orders.toml")).unwrap(),
        )
        .unwrap();
        let body: serde_json::Value =
            serde_json::from_str(&doc.request.unwrap().body).unwrap();
        assert_eq!(body["qty"], 3);
    }

    #[tokio::test]
    async fn test_malformed_json_body_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), true);

        let req = Request::builder()
            .method("POST")
            .uri("/orders")
            .header("host", "api.test")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(b"{not json")))
            .unwrap();
        let response = handle_request(req, state, peer()).await.unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_oversized_content_length_is_413() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), false);

        let req = Request::builder()
            .method("POST")
            .uri("/big")
            .header("host", "localhost")
            .header("content-length", "999999999999")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handle_request(req, state, peer()).await.unwrap();
        assert_eq!(response.status(), 413);
    }

    #[tokio::test]
    async fn test_filesystem_obstruction_is_500() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::load_from("no-such-config-file").unwrap();
        // A file where the root directory should be makes every path
        // under it error with ENOTDIR instead of a clean not-found.
        let blocker = tmp.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();
        config.mock.root_dir = blocker.to_string_lossy().into_owned();
        config.mock.write_mode = true;
        config.logging.access_log = false;
        let (state, _) = AppState::new(config);

        let response = handle_request(
            request("GET", "/users/1", Some("api.test")),
            Arc::new(state),
            peer(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn test_broken_handler_file_is_500() {
        let tmp = tempfile::tempdir().unwrap();
        write_handler(tmp.path(), "localhost/bad.toml", "status = = 12");
        let state = test_state(tmp.path(), false);

        let response = handle_request(request("GET", "/bad", Some("localhost")), state, peer())
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn test_cors_header_when_enabled() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::load_from("no-such-config-file").unwrap();
        config.mock.root_dir = tmp.path().to_string_lossy().into_owned();
        config.http.enable_cors = true;
        config.logging.access_log = false;
        let (state, _) = AppState::new(config);

        let response = handle_request(
            request("GET", "/anything", Some("localhost")),
            Arc::new(state),
            peer(),
        )
        .await
        .unwrap();
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");
    }

    /// Collect every file under `root`, sorted, for no-write assertions.
    fn walk(root: &std::path::Path) -> Vec<std::path::PathBuf> {
        let mut files = Vec::new();
        let mut dirs = vec![root.to_path_buf()];
        while let Some(dir) = dirs.pop() {
            if let Ok(entries) = std::fs::read_dir(&dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        dirs.push(path);
                    } else {
                        files.push(path);
                    }
                }
            }
        }
        files.sort();
        files
    }
}
