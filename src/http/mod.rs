//! HTTP protocol implementation.
//!
//! This module implements the per-connection side of an HTTP/1.1 server
//! with keep-alive support and upgrade to WebSocket framing.
//!
//! # Architecture
//!
//! - **`connection`**: The protocol engine, driven by transport events
//! - **`parser`**: Splits inbound bytes into request fragments
//! - **`request`**: Request methods and the inbound fragment model
//! - **`response`**: Status codes and chunked response producers
//! - **`writer`**: Outbound frames and their wire encoding
//! - **`url`**: Request target and query decoding
//! - **`mime`**: Per-request body parsing state
//!
//! # Event Flow
//!
//! ```text
//!   transport ── DataAvailable ──► ServerClient ── Http ──► url decode ─► handler
//!                                       │                                   │
//!                                       └── WebSocket ─► ping/close/data    │ reply()
//!                                                                           ▼
//!   transport ◄── one chunk ◄── TransmitBufferEmpty ◄── operation queue ◄───┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use ember::http::connection::{
//!     ClientEvent, EngineConfig, Inbound, RequestContext, RequestHandler, Responder,
//!     ServerClient, Transport,
//! };
//! use ember::http::request::RequestPacket;
//! use ember::http::response::StringResponse;
//! use ember::http::writer::OutboundFrame;
//!
//! #[derive(Default)]
//! struct Sink(Vec<OutboundFrame>);
//!
//! impl Transport for Sink {
//!     fn send(&mut self, frame: OutboundFrame) { self.0.push(frame); }
//!     fn receive_timeout(&self) -> Duration { Duration::ZERO }
//!     fn set_receive_timeout(&mut self, _: Duration) {}
//!     fn close(&mut self) {}
//! }
//!
//! struct Hello;
//!
//! impl RequestHandler for Hello {
//!     fn handle(&mut self, req: RequestContext<'_>, responder: &mut dyn Responder) {
//!         if req.last_fragment {
//!             responder.reply(Box::new(StringResponse::ok("hello")), false);
//!         }
//!     }
//! }
//!
//! let mut client = ServerClient::new(Sink::default(), Box::new(Hello), EngineConfig::default());
//! let packet = RequestPacket::head("GET", "/", Default::default(), "", false);
//! client.event(ClientEvent::DataAvailable(Inbound::Request(packet)));
//!
//! assert_eq!(client.transport().0.len(), 1);
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod url;
pub mod writer;
