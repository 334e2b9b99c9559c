use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::http::connection::{DEFAULT_CONTENT_CHUNK_SIZE, EngineConfig};
use crate::http::mime::DEFAULT_BODY_LIMIT;

/// Server configuration.
///
/// Loaded from the YAML file named by `EMBER_CONFIG`, any field left out
/// keeps its default. `LISTEN` overrides the listen address.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// Idle receive timeout armed for keep-alive connections.
    pub keep_alive_secs: u64,
    pub content_chunk_size: usize,
    pub max_fragment_size: usize,
    pub max_header_size: usize,
    pub max_websocket_payload: usize,
    pub mime_body_limit: usize,
    pub reject_malformed_urls: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            keep_alive_secs: 5,
            content_chunk_size: DEFAULT_CONTENT_CHUNK_SIZE,
            max_fragment_size: 2048,
            max_header_size: 4096,
            max_websocket_payload: 64 * 1024,
            mime_body_limit: DEFAULT_BODY_LIMIT,
            reject_malformed_urls: false,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let mut cfg = match std::env::var("EMBER_CONFIG") {
            Ok(path) => Self::from_file(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path, error = %e, "Failed to load config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.listen_addr = listen_addr;
        }

        cfg
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let cfg = serde_yaml::from_str(raw).context("invalid config yaml")?;
        Ok(cfg)
    }

    /// Settings handed to each connection engine.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            content_chunk_size: self.content_chunk_size,
            reject_malformed_urls: self.reject_malformed_urls,
            mime_body_limit: self.mime_body_limit,
        }
    }
}
