//! Per-connection protocol engine.
//!
//! A [`ServerClient`] is driven entirely by [`ClientEvent`]s delivered one at a
//! time by the transport. Inbound data is dispatched on the connection
//! [`Mode`]; outbound responses are queued as [`ResponseOperation`]s and
//! pumped into the transport one bounded chunk per
//! [`ClientEvent::TransmitBufferEmpty`].

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::http::mime::{DEFAULT_BODY_LIMIT, MimeContext};
use crate::http::request::{Method, RequestPacket};
use crate::http::response::{
    CONNECTION, KEEP_ALIVE, ResponseOperation, ResponseStatus, StatusCode, StringResponse, find_header,
};
use crate::http::url::decode_url;
use crate::http::writer::OutboundFrame;
use crate::websocket::WebSocketHandler;
use crate::websocket::frame::{Opcode, WsFrame};
use crate::websocket::response::WsResponse;

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(5);
pub const DEFAULT_CONTENT_CHUNK_SIZE: usize = 1024;

/// Protocol spoken on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Http,
    WebSocket,
}

/// Inbound unit handed over by the framing layer.
#[derive(Debug, Clone)]
pub enum Inbound {
    Request(RequestPacket),
    Frame(WsFrame),
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connected,
    DataAvailable(Inbound),
    TransmitBufferEmpty,
    Disconnected,
}

/// The socket side of a connection as seen by the engine.
///
/// None of these calls may block.
pub trait Transport {
    /// Appends a complete frame to the send buffer.
    fn send(&mut self, frame: OutboundFrame);

    fn receive_timeout(&self) -> Duration;

    fn set_receive_timeout(&mut self, timeout: Duration);

    fn close(&mut self);
}

/// Handle given to request and WebSocket handlers for answering.
pub trait Responder {
    /// Queues a response, at the front of the queue if `place_first`.
    fn reply(&mut self, response: Box<dyn ResponseOperation>, place_first: bool);

    /// Drops every pending response and queues `response` as the last one
    /// sent on this connection.
    fn reply_error(&mut self, response: Box<dyn ResponseOperation>);

    /// Queues the handshake response; once its head has been sent the
    /// connection switches to WebSocket mode with `handler` attached.
    fn upgrade(&mut self, response: Box<dyn ResponseOperation>, handler: Box<dyn WebSocketHandler>);

    fn mode(&self) -> Mode;

    fn receive_timeout(&self) -> Duration;

    fn set_receive_timeout(&mut self, timeout: Duration);
}

/// Everything a request handler sees for one inbound fragment.
pub struct RequestContext<'a> {
    pub method: Method,
    pub url: &'a str,
    pub headers: &'a HashMap<String, String>,
    pub parameters: &'a HashMap<String, String>,
    /// Body bytes carried by this fragment.
    pub body: &'a [u8],
    /// Parsing state that lives for the whole request.
    pub mime: &'a mut MimeContext,
    pub first_fragment: bool,
    pub last_fragment: bool,
}

/// Application logic invoked once per inbound request fragment.
pub trait RequestHandler {
    fn handle(&mut self, request: RequestContext<'_>, responder: &mut dyn Responder);
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Receive timeout armed on connect and on `Connection: keep-alive`.
    pub keep_alive: Duration,
    /// Upper bound for each chunk pulled from a response.
    pub content_chunk_size: usize,
    /// Answer undecodable request targets with 400 and close, instead of
    /// dropping the request silently.
    pub reject_malformed_urls: bool,
    pub mime_body_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            keep_alive: DEFAULT_KEEP_ALIVE,
            content_chunk_size: DEFAULT_CONTENT_CHUNK_SIZE,
            reject_malformed_urls: false,
            mime_body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

struct Operation {
    response: Box<dyn ResponseOperation>,
    upgrade: Option<Box<dyn WebSocketHandler>>,
    // close the transport once this response is fully sent
    close_after: bool,
}

impl Operation {
    fn new(response: Box<dyn ResponseOperation>) -> Self {
        Self {
            response,
            upgrade: None,
            close_after: false,
        }
    }
}

/// Outbound half of the connection: transport, mode, and response queue.
struct Outbound<T> {
    transport: T,
    mode: Mode,
    operations: VecDeque<Operation>,
    current: Option<Operation>,
    websocket: Option<Box<dyn WebSocketHandler>>,
    content_chunk_size: usize,
    // set once the transport is closed, nothing is sent afterwards
    closed: bool,
}

impl<T: Transport> Outbound<T> {
    fn enqueue(&mut self, operation: Operation, place_first: bool) {
        if self.closed {
            trace!("Connection closed, response discarded");
            return;
        }

        if place_first {
            self.operations.push_front(operation);
        } else {
            self.operations.push_back(operation);
        }

        if self.current.is_none() {
            self.send_first_part();
        }
    }

    fn add_keep_alive(&self, response: &mut dyn ResponseOperation) {
        if self.mode != Mode::Http {
            return;
        }

        let timeout = self.transport.receive_timeout().as_secs();
        if timeout > 0 {
            response.add_header(CONNECTION, "keep-alive");
            response.set_header(KEEP_ALIVE, &format!("timeout={timeout}"));
        }
    }

    /// Starts queued operations until one needs more than a single chunk.
    ///
    /// Operations that finish on their first chunk are retired right away,
    /// so back-to-back short responses go out without waiting for the
    /// transport to drain.
    fn send_first_part(&mut self) {
        while self.current.is_none() && !self.closed {
            let Some(mut operation) = self.operations.pop_front() else {
                return;
            };

            let (status, data) = operation.response.get_data(self.content_chunk_size);
            if status == ResponseStatus::Error {
                error!("Current operation reported error, closing server client");
                self.close();
                return;
            }

            // The head goes out even when more data remains.
            let frame = match self.mode {
                Mode::Http => OutboundFrame::head(
                    operation.response.response_code(),
                    operation.response.headers().clone(),
                    data,
                ),
                Mode::WebSocket => OutboundFrame::Body(data),
            };
            self.transport.send(frame);

            if let Some(handler) = operation.upgrade.take() {
                self.upgrade_to_websocket(handler);
            }

            if status == ResponseStatus::EndOfData {
                if operation.close_after {
                    self.close();
                    return;
                }
            } else {
                self.current = Some(operation);
            }
        }
    }

    fn transmit_buffer_empty(&mut self) {
        let Some(current) = self.current.as_mut() else {
            self.send_first_part();
            return;
        };

        let (status, data) = current.response.get_data(self.content_chunk_size);
        match status {
            ResponseStatus::Error => {
                error!("Current operation reported error, closing server client");
                self.close();
            }
            ResponseStatus::EndOfData => {
                if !data.is_empty() {
                    self.transport.send(OutboundFrame::Body(data));
                }
                let close_after = current.close_after;
                self.current = None;
                if close_after {
                    self.close();
                } else {
                    self.send_first_part();
                }
            }
            ResponseStatus::HasMoreData | ResponseStatus::LastData => {
                self.transport.send(OutboundFrame::Body(data));
            }
        }
    }

    fn upgrade_to_websocket(&mut self, handler: Box<dyn WebSocketHandler>) {
        if self.mode == Mode::WebSocket {
            warn!("Connection already upgraded to websocket, ignoring upgrade");
            return;
        }

        info!("Connection upgraded to websocket");
        self.mode = Mode::WebSocket;
        self.websocket = Some(handler);
    }

    fn close(&mut self) {
        self.operations.clear();
        self.current = None;
        self.closed = true;
        self.transport.close();
    }
}

impl<T: Transport> Responder for Outbound<T> {
    fn reply(&mut self, mut response: Box<dyn ResponseOperation>, place_first: bool) {
        self.add_keep_alive(&mut *response);
        self.enqueue(Operation::new(response), place_first);
    }

    fn reply_error(&mut self, mut response: Box<dyn ResponseOperation>) {
        self.operations.clear();
        response.set_header(CONNECTION, "close");
        let mut operation = Operation::new(response);
        operation.close_after = true;
        self.enqueue(operation, false);
    }

    fn upgrade(&mut self, response: Box<dyn ResponseOperation>, handler: Box<dyn WebSocketHandler>) {
        let mut operation = Operation::new(response);
        operation.upgrade = Some(handler);
        self.enqueue(operation, false);
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn receive_timeout(&self) -> Duration {
        self.transport.receive_timeout()
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.transport.set_receive_timeout(timeout);
    }
}

#[derive(Debug, Default)]
struct RequestState {
    method: Option<Method>,
    url: String,
    headers: HashMap<String, String>,
    parameters: HashMap<String, String>,
    mime: MimeContext,
    // false between requests and for dropped or rejected ones
    valid: bool,
}

/// Protocol engine for one accepted connection.
pub struct ServerClient<T: Transport> {
    out: Outbound<T>,
    request: RequestState,
    handler: Box<dyn RequestHandler>,
    config: EngineConfig,
    text_message: bool,
}

impl<T: Transport> ServerClient<T> {
    pub fn new(transport: T, handler: Box<dyn RequestHandler>, config: EngineConfig) -> Self {
        let request = RequestState {
            mime: MimeContext::new(config.mime_body_limit),
            ..Default::default()
        };

        Self {
            out: Outbound {
                transport,
                mode: Mode::Http,
                operations: VecDeque::new(),
                current: None,
                websocket: None,
                content_chunk_size: config.content_chunk_size.max(1),
                closed: false,
            },
            request,
            handler,
            config,
            text_message: false,
        }
    }

    pub fn event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connected => self.connected(),
            ClientEvent::DataAvailable(inbound) => match (self.out.mode, inbound) {
                (Mode::Http, Inbound::Request(packet)) => self.http_event(packet),
                (Mode::WebSocket, Inbound::Frame(frame)) => self.websocket_event(frame),
                (mode, _) => warn!(?mode, "Inbound data does not match connection mode, dropped"),
            },
            ClientEvent::TransmitBufferEmpty => self.out.transmit_buffer_empty(),
            ClientEvent::Disconnected => self.disconnected(),
        }
    }

    pub fn reply(&mut self, response: Box<dyn ResponseOperation>, place_first: bool) {
        self.out.reply(response, place_first);
    }

    pub fn reply_error(&mut self, response: Box<dyn ResponseOperation>) {
        self.out.reply_error(response);
    }

    /// Switches the connection to WebSocket framing and attaches `handler`.
    ///
    /// A connection that is already in WebSocket mode keeps its handler.
    pub fn upgrade_to_websocket(&mut self, handler: Box<dyn WebSocketHandler>) {
        self.out.upgrade_to_websocket(handler);
    }

    /// Prepares the engine for a new client on the same connection object.
    pub fn reset_client(&mut self) {
        self.out.operations.clear();
        self.out.current = None;
        self.out.mode = Mode::Http;
        self.out.websocket = None;
        self.out.closed = false;
        self.request.valid = false;
        self.request.method = None;
        self.text_message = false;
    }

    /// Closes the transport, abandoning all pending responses.
    pub fn close(&mut self) {
        self.out.close();
    }

    pub fn mode(&self) -> Mode {
        self.out.mode
    }

    /// No response is streaming and none is queued.
    pub fn is_idle(&self) -> bool {
        self.out.current.is_none() && self.out.operations.is_empty()
    }

    pub fn queued(&self) -> usize {
        self.out.operations.len()
    }

    pub fn has_current_operation(&self) -> bool {
        self.out.current.is_some()
    }

    /// The engine has closed the transport.
    pub fn is_closed(&self) -> bool {
        self.out.closed
    }

    pub fn has_websocket_handler(&self) -> bool {
        self.out.websocket.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.out.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.out.transport
    }

    fn connected(&mut self) {
        self.out.transport.set_receive_timeout(self.config.keep_alive);
    }

    fn disconnected(&mut self) {
        debug!("Client disconnected");
    }

    fn set_keep_alive(&mut self) {
        let wants_keep_alive = find_header(&self.request.headers, "connection")
            .is_some_and(|v| v.to_ascii_lowercase().contains("keep-alive"));

        if wants_keep_alive {
            self.out.transport.set_receive_timeout(self.config.keep_alive);
        }
    }

    fn http_event(&mut self, packet: RequestPacket) {
        let first = !packet.is_continuation();
        let last = !packet.is_continued();

        if first && !self.begin_request(&packet) {
            return;
        }

        if !self.request.valid {
            trace!("Fragment of a dropped request ignored");
            return;
        }

        let Some(method) = self.request.method else {
            return;
        };

        self.handler.handle(
            RequestContext {
                method,
                url: &self.request.url,
                headers: &self.request.headers,
                parameters: &self.request.parameters,
                body: &packet.body,
                mime: &mut self.request.mime,
                first_fragment: first,
                last_fragment: last,
            },
            &mut self.out,
        );

        if last {
            self.request.valid = false;
        }
    }

    /// Replaces request-scoped state from the first fragment of a request.
    ///
    /// Returns false when the request must not reach the handler.
    fn begin_request(&mut self, packet: &RequestPacket) -> bool {
        self.request.headers = packet.headers.clone();
        self.request.parameters.clear();
        self.request.url.clear();
        self.request.method = None;
        self.request.valid = false;
        self.set_keep_alive();
        self.request.mime.reset();

        match decode_url(&packet.url) {
            Ok(decoded) => {
                self.request.url = decoded.path;
                self.request.parameters = decoded.parameters;
            }
            Err(e) => {
                if self.config.reject_malformed_urls {
                    warn!(url = %packet.url, error = %e, "Malformed request url, rejecting");
                    self.out
                        .reply_error(Box::new(StringResponse::text(StatusCode::BadRequest, "400 Bad Request")));
                } else {
                    debug!(url = %packet.url, error = %e, "Malformed request url, request dropped");
                }
                return false;
            }
        }

        match Method::from_str(&packet.method) {
            Some(method) => {
                self.request.method = Some(method);
                self.request.valid = true;
                true
            }
            None => {
                debug!(method = %packet.method, url = %self.request.url, "Unsupported method");
                self.out
                    .reply(Box::new(StringResponse::new(StatusCode::MethodNotAllowed)), false);
                false
            }
        }
    }

    fn websocket_event(&mut self, frame: WsFrame) {
        if frame.opcode.is_control() {
            match frame.opcode {
                Opcode::Close => {
                    debug!("Websocket close received, closing connection");
                    self.out.close();
                }
                Opcode::Ping => {
                    // Pong overtakes any data frames still waiting.
                    self.out.reply(Box::new(WsResponse::pong(&frame.payload)), true);
                }
                other => trace!(opcode = ?other, "Control frame ignored"),
            }
            return;
        }

        let first = !frame.is_continuation();
        let last = !frame.is_continued();
        if first {
            self.text_message = frame.opcode == Opcode::Text;
        }

        let Some(mut handler) = self.out.websocket.take() else {
            trace!("No websocket handler attached, frame dropped");
            return;
        };

        handler.data_received(first, last, self.text_message, &frame.payload, &mut self.out);

        if self.out.websocket.is_none() {
            self.out.websocket = Some(handler);
        }
    }
}
