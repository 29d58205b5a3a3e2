// Configuration module entry point
// Layered config: file defaults, MOCKSERVE_* environment variables,
// then the two documented process variables PORT and WRITE_MODE.

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{
    Config, HttpConfig, LoggingConfig, MockConfig, PerformanceConfig, ServerConfig,
};

impl Config {
    /// Load configuration from the default `config.toml` next to the binary.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from the specified file path (without extension).
    /// The file is optional; every key has a default.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("MOCKSERVE").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("mock.root_dir", "mock")?
            .set_default("mock.default_host", "localhost")?
            .set_default("mock.write_mode", false)?
            .set_default("mock.extension", "toml")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.request_ids", true)?
            .set_default("logging.format", "json")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "mockserve/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .build()?;

        let mut config: Self = settings.try_deserialize()?;
        config.apply_process_env();
        Ok(config)
    }

    /// `PORT` and `WRITE_MODE` override everything else; they are the
    /// two variables the tool documents for quick use.
    fn apply_process_env(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(mode) = std::env::var("WRITE_MODE") {
            // Only the exact string "true" enables write mode.
            self.mock.write_mode = mode == "true";
        }
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
