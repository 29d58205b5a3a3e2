//! Logger module
//!
//! Request-block logging (one block per inbound request, every line
//! prefixed with a short random correlation id), access log summary
//! lines, and server lifecycle logging. All output goes through the
//! writer so it can be redirected to files; logging is best-effort
//! and never aborts request processing.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use std::net::SocketAddr;

use uuid::Uuid;

use crate::config::Config;
use crate::mock::RequestRecord;

/// Length of the per-request correlation id.
const REQUEST_ID_LEN: usize = 8;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Generate a fixed-length random request identifier.
pub fn request_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..REQUEST_ID_LEN].to_string()
}

/// Write to info/access log
fn write_info(message: &str) {
    if writer::is_initialized() {
        writer::get().write_info(message);
    } else {
        println!("{message}");
    }
}

/// Write to error log
fn write_error(message: &str) {
    if writer::is_initialized() {
        writer::get().write_error(message);
    } else {
        eprintln!("{message}");
    }
}

fn prefixed(request_id: Option<&str>, message: &str) -> String {
    match request_id {
        Some(id) => format!("[{id}] {message}"),
        None => message.to_string(),
    }
}

fn info(request_id: Option<&str>, message: &str) {
    write_info(&prefixed(request_id, message));
}

fn error(request_id: Option<&str>, message: &str) {
    write_error(&prefixed(request_id, message));
}

/// Emit the request block: separator, method and path, query map,
/// body, and every header. Serialization failures degrade to a
/// placeholder; the request itself is never affected.
pub fn log_request_block(request_id: Option<&str>, record: &RequestRecord) {
    info(request_id, "---------------------------------------------");
    info(
        request_id,
        &format!("Received {} request at {}", record.method, record.path),
    );
    let query = serde_json::to_string(&record.query)
        .unwrap_or_else(|_| "<unserializable>".to_string());
    info(request_id, &format!("Query Parameters: {query}"));
    let body = serde_json::to_string(&record.body)
        .unwrap_or_else(|_| "<unserializable>".to_string());
    info(request_id, &format!("Request Body: {body}"));
    info(request_id, "Request Headers:");
    for (name, value) in &record.headers {
        info(request_id, &format!("  {name}: {value}"));
    }
}

/// Log the outgoing body and final status once the response is built.
pub fn log_response_sent(request_id: Option<&str>, status: u16, body: &[u8]) {
    let body_text = String::from_utf8_lossy(body);
    info(request_id, &format!("Response Body: {body_text}"));
    info(request_id, &format!("Completed with status {status}"));
}

/// Error line for a route with no handler file.
pub fn log_route_miss(request_id: Option<&str>, path: &str) {
    error(
        request_id,
        &format!("Handler file not found for route: {path}"),
    );
}

/// Suggestion emitted when write mode is off and a route missed.
pub fn log_write_mode_hint(request_id: Option<&str>) {
    error(
        request_id,
        "Suggestion: Enable write mode (WRITE_MODE=true) to automatically create a handler file.",
    );
}

/// Log a freshly generated stub, content included, so the developer
/// can see exactly what landed on disk.
pub fn log_stub_created(request_id: Option<&str>, path: &std::path::Path, content: &str) {
    info(
        request_id,
        &format!("Write mode enabled: Created a handler file at {}", path.display()),
    );
    info(request_id, &format!("Template content:\n{content}"));
}

/// A handler's default behavior: echo the URL captured at generation time.
pub fn log_handler_url(request_id: Option<&str>, url: &str) {
    info(request_id, &format!("Full URL: {url}"));
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, routes: usize) {
    write_info("======================================");
    write_info("Mock server started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!(
        "Handler tree: {} ({routes} routes loaded)",
        config.mock.root_dir
    ));
    write_info(&format!(
        "Write mode: {}",
        if config.mock.write_mode { "ON" } else { "off" }
    ));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_info(&entry.format(format));
}
