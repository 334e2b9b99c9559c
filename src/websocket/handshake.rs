//! Server side of the WebSocket opening handshake (RFC 6455 section 4.2).
//!
//! ```http
//! GET /chat HTTP/1.1
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! Sec-WebSocket-Version: 13
//! ```
//!
//! is answered with
//!
//! ```http
//! HTTP/1.1 101 Switching Protocols
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=
//! ```

use std::collections::HashMap;

use base64::Engine;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::http::response::{ResponseBuilder, StatusCode, StringResponse, find_header};

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("missing or invalid header: {0}")]
    MissingHeader(&'static str),
    #[error("unsupported websocket version: {0}")]
    UnsupportedVersion(String),
}

/// Computes the Sec-WebSocket-Accept value for a client key.
///
/// ```
/// # use ember::websocket::handshake::accept_key;
/// assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// True when the request headers ask for a WebSocket upgrade.
pub fn is_upgrade_request(headers: &HashMap<String, String>) -> bool {
    find_header(headers, "upgrade").is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Validates an upgrade request and builds the 101 response for it.
pub fn upgrade_response(headers: &HashMap<String, String>) -> Result<StringResponse, HandshakeError> {
    if !is_upgrade_request(headers) {
        return Err(HandshakeError::MissingHeader("Upgrade"));
    }

    let connection = find_header(headers, "connection").ok_or(HandshakeError::MissingHeader("Connection"))?;
    if !connection
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        return Err(HandshakeError::MissingHeader("Connection"));
    }

    let version = find_header(headers, "sec-websocket-version")
        .ok_or(HandshakeError::MissingHeader("Sec-WebSocket-Version"))?;
    if version.trim() != "13" {
        return Err(HandshakeError::UnsupportedVersion(version.to_string()));
    }

    let key = find_header(headers, "sec-websocket-key")
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(HandshakeError::MissingHeader("Sec-WebSocket-Key"))?;

    Ok(ResponseBuilder::new(StatusCode::SwitchingProtocols)
        .header("Upgrade", "websocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Accept", accept_key(key))
        .build())
}
