#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use ember::http::connection::{
    ClientEvent, EngineConfig, Inbound, RequestContext, RequestHandler, Responder, ServerClient, Transport,
};
use ember::http::request::{Method, RequestPacket};
use ember::http::response::{ResponseOperation, ResponseStatus, StatusCode, StringResponse};
use ember::http::writer::OutboundFrame;
use ember::websocket::WebSocketHandler;

/// Transport that records everything the engine does to it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<OutboundFrame>,
    pub timeout: Duration,
    pub timeout_sets: Vec<Duration>,
    pub closed: bool,
}

impl RecordingTransport {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Body bytes of every frame sent so far, as lossy strings.
    pub fn bodies(&self) -> Vec<String> {
        self.sent
            .iter()
            .map(|f| String::from_utf8_lossy(f.body()).into_owned())
            .collect()
    }

    pub fn heads(&self) -> Vec<&OutboundFrame> {
        self.sent.iter().filter(|f| f.is_head()).collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, frame: OutboundFrame) {
        self.sent.push(frame);
    }

    fn receive_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.timeout_sets.push(timeout);
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Producer that plays back a fixed list of chunks, then reports EndOfData.
pub struct ScriptedResponse {
    status: StatusCode,
    headers: HashMap<String, String>,
    script: Vec<(ResponseStatus, Bytes)>,
    pub max_seen: Rc<RefCell<Vec<usize>>>,
    pub header_log: Rc<RefCell<Vec<(String, String)>>>,
}

impl ScriptedResponse {
    pub fn new(script: Vec<(ResponseStatus, &'static str)>) -> Self {
        let mut script: Vec<_> = script
            .into_iter()
            .map(|(status, data)| (status, Bytes::from_static(data.as_bytes())))
            .collect();
        script.reverse();
        Self {
            status: StatusCode::Ok,
            headers: HashMap::new(),
            script,
            max_seen: Rc::default(),
            header_log: Rc::default(),
        }
    }

    /// A producer whose only chunk is `name`, followed by EndOfData.
    pub fn single(name: &'static str) -> Self {
        Self::new(vec![(ResponseStatus::LastData, name)])
    }

    /// A producer that is complete on its first call.
    pub fn immediate(name: &'static str) -> Self {
        Self::new(vec![(ResponseStatus::EndOfData, name)])
    }

    pub fn failing() -> Self {
        Self::new(vec![(ResponseStatus::Error, "")])
    }
}

impl ResponseOperation for ScriptedResponse {
    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    fn response_code(&self) -> StatusCode {
        self.status
    }

    fn get_data(&mut self, max_size: usize) -> (ResponseStatus, Bytes) {
        self.max_seen.borrow_mut().push(max_size);
        self.script
            .pop()
            .unwrap_or((ResponseStatus::EndOfData, Bytes::new()))
    }

    fn add_header(&mut self, key: &str, value: &str) {
        self.header_log.borrow_mut().push((key.to_string(), value.to_string()));
        ember::http::response::add_header(&mut self.headers, key, value);
    }

    fn set_header(&mut self, key: &str, value: &str) {
        self.header_log.borrow_mut().push((key.to_string(), value.to_string()));
        ember::http::response::set_header(&mut self.headers, key, value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledRequest {
    pub method: Method,
    pub url: String,
    pub parameters: HashMap<String, String>,
    pub body: Vec<u8>,
    pub first: bool,
    pub last: bool,
    pub mime_body: Vec<u8>,
}

/// Handler that records every invocation and answers the last fragment
/// of each request with a small 200.
#[derive(Default, Clone)]
pub struct RecordingHandler {
    pub calls: Rc<RefCell<Vec<HandledRequest>>>,
    pub silent: bool,
}

impl RecordingHandler {
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Default::default()
        }
    }
}

impl RequestHandler for RecordingHandler {
    fn handle(&mut self, req: RequestContext<'_>, responder: &mut dyn Responder) {
        req.mime.accept(req.headers, req.body, req.first_fragment, req.last_fragment);

        self.calls.borrow_mut().push(HandledRequest {
            method: req.method,
            url: req.url.to_string(),
            parameters: req.parameters.clone(),
            body: req.body.to_vec(),
            first: req.first_fragment,
            last: req.last_fragment,
            mime_body: req.mime.body().to_vec(),
        });

        if req.last_fragment && !self.silent {
            responder.reply(Box::new(StringResponse::ok("done")), false);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub first: bool,
    pub last: bool,
    pub text: bool,
    pub payload: Vec<u8>,
}

#[derive(Default, Clone)]
pub struct RecordingSocket {
    pub frames: Rc<RefCell<Vec<ReceivedFrame>>>,
}

impl WebSocketHandler for RecordingSocket {
    fn data_received(&mut self, first: bool, last: bool, text: bool, payload: &[u8], _responder: &mut dyn Responder) {
        self.frames.borrow_mut().push(ReceivedFrame {
            first,
            last,
            text,
            payload: payload.to_vec(),
        });
    }
}

pub fn client_with(
    transport: RecordingTransport,
    handler: RecordingHandler,
    config: EngineConfig,
) -> ServerClient<RecordingTransport> {
    ServerClient::new(transport, Box::new(handler), config)
}

pub fn idle_client() -> ServerClient<RecordingTransport> {
    client_with(
        RecordingTransport::default(),
        RecordingHandler::silent(),
        EngineConfig::default(),
    )
}

pub fn get(url: &str) -> ClientEvent {
    request("GET", url, HashMap::new())
}

pub fn request(method: &str, url: &str, headers: HashMap<String, String>) -> ClientEvent {
    ClientEvent::DataAvailable(Inbound::Request(RequestPacket::head(method, url, headers, "", false)))
}

pub fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
