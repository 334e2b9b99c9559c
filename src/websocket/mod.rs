//! WebSocket support for upgraded connections.
//!
//! - **`frame`**: opcodes plus the client-frame decoder and server-frame encoder
//! - **`response`**: [`WsResponse`](response::WsResponse), an outbound frame as a response producer
//! - **`handshake`**: the `101 Switching Protocols` answer to an upgrade request
//!
//! Control frames never reach a [`WebSocketHandler`]; the connection engine
//! answers pings and closes the connection on close frames itself.

pub mod frame;
pub mod handshake;
pub mod response;

use crate::http::connection::Responder;

/// Receives data frames of an upgraded connection.
///
/// `first` and `last` mark the frame's position within its message, `text`
/// tells whether the message was opened by a Text frame.
pub trait WebSocketHandler {
    fn data_received(&mut self, first: bool, last: bool, text: bool, payload: &[u8], responder: &mut dyn Responder);
}
