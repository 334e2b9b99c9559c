//! ember - event-driven HTTP/1.1 connection engine with WebSocket upgrade.
//!
//! Core library for the per-connection protocol engine and its TCP front end.

pub mod config;
pub mod http;
pub mod server;
pub mod websocket;
