// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub mock: MockConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Mock dispatch configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MockConfig {
    /// Base directory of the handler tree.
    pub root_dir: String,
    /// Host directory used when the request carries no usable Host header.
    pub default_host: String,
    /// Generate stub handler files for unmatched routes.
    pub write_mode: bool,
    /// Handler file extension.
    pub extension: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit the per-request log block.
    pub access_log: bool,
    /// Prefix log lines with a per-request correlation id.
    pub request_ids: bool,
    /// Access log line format: combined, common, json, or a $var pattern.
    pub format: String,
    pub access_log_file: Option<String>,
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP behavior configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}
