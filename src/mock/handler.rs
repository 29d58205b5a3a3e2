//! Handler document format
//!
//! A handler file is a TOML document with an optional `[request]`
//! snapshot (captured when the stub was generated, kept for the
//! developer's reference) and a `[response]` table describing what to
//! send back. "Invoking" a handler materializes that response.

use std::collections::BTreeMap;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use serde::{Deserialize, Serialize};

use crate::logger;

/// A query parameter value: a single string or a repeated one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

/// Snapshot of the request that triggered stub generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub url: String,
    pub method: String,
    /// Request body at generation time, serialized as JSON text.
    pub body: String,
    #[serde(default)]
    pub query: BTreeMap<String, QueryValue>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// The response a handler file produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSpec {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_body")]
    pub body: String,
    /// Extra response headers on top of Content-Type.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

const fn default_status() -> u16 {
    200
}

fn default_content_type() -> String {
    "application/json".to_string()
}

fn default_body() -> String {
    "{ \"ok\": true }".to_string()
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self {
            status: default_status(),
            content_type: default_content_type(),
            body: default_body(),
            headers: BTreeMap::new(),
        }
    }
}

/// A loaded handler document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSnapshot>,
    #[serde(default)]
    pub response: ResponseSpec,
}

impl HandlerDoc {
    /// Parse a handler document from TOML source.
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Invoke the handler: log the captured URL (the generated stub's
    /// default behavior) and build the described response.
    pub fn invoke(&self, request_id: Option<&str>) -> Response<Full<Bytes>> {
        if let Some(snapshot) = &self.request {
            logger::log_handler_url(request_id, &snapshot.url);
        }

        let mut builder = Response::builder()
            .status(self.response.status)
            .header("Content-Type", &self.response.content_type);
        for (name, value) in &self.response.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.response.body.clone())))
            .unwrap_or_else(|e| {
                logger::log_error(&format!("Failed to build handler response: {e}"));
                Response::new(Full::new(Bytes::from(self.response.body.clone())))
            })
    }
}
