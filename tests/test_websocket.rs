mod common;

use bytes::Bytes;
use common::*;
use ember::http::connection::{ClientEvent, EngineConfig, Inbound, Mode, ServerClient};
use ember::http::response::{ResponseStatus, StatusCode};
use ember::http::writer::OutboundFrame;
use ember::server::routes::{DefaultRoutes, EchoSocket};
use ember::websocket::frame::{Opcode, WsFrame, encode_server_frame};

fn frame(fin: bool, opcode: Opcode, payload: &'static str) -> ClientEvent {
    ClientEvent::DataAvailable(Inbound::Frame(WsFrame::new(fin, opcode, payload)))
}

fn upgraded() -> (ServerClient<RecordingTransport>, RecordingSocket) {
    let socket = RecordingSocket::default();
    let mut client = idle_client();
    client.upgrade_to_websocket(Box::new(socket.clone()));
    (client, socket)
}

fn drain(client: &mut ServerClient<RecordingTransport>) {
    while !client.is_idle() {
        client.event(ClientEvent::TransmitBufferEmpty);
    }
}

#[test]
fn test_ping_answered_before_pending_data() {
    let (mut client, _socket) = upgraded();

    client.reply(
        Box::new(ScriptedResponse::new(vec![
            (ResponseStatus::HasMoreData, "a"),
            (ResponseStatus::LastData, "b"),
        ])),
        false,
    );
    client.reply(Box::new(ScriptedResponse::single("queued")), false);

    client.event(frame(true, Opcode::Ping, "hi"));
    drain(&mut client);

    let sent = &client.transport().sent;
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0].body(), &Bytes::from_static(b"a"));
    assert_eq!(sent[1].body(), &Bytes::from_static(b"b"));
    assert_eq!(sent[2].body(), &encode_server_frame(true, Opcode::Pong, b"hi"));
    assert_eq!(sent[3].body(), &Bytes::from_static(b"queued"));
    assert!(sent.iter().all(|f| !f.is_head()));
}

#[test]
fn test_ping_on_idle_connection_sends_pong_at_once() {
    let (mut client, socket) = upgraded();

    client.event(frame(true, Opcode::Ping, ""));

    assert_eq!(
        client.transport().sent,
        vec![OutboundFrame::Body(Bytes::from_static(&[0x8A, 0x00]))]
    );
    assert!(socket.frames.borrow().is_empty());
}

#[test]
fn test_close_frame_discards_queue_and_closes() {
    let (mut client, socket) = upgraded();

    client.reply(
        Box::new(ScriptedResponse::new(vec![
            (ResponseStatus::HasMoreData, "a"),
            (ResponseStatus::LastData, "b"),
        ])),
        false,
    );
    client.reply(Box::new(ScriptedResponse::single("never")), false);

    client.event(frame(true, Opcode::Close, ""));

    assert!(client.transport().closed);
    assert!(client.is_idle());
    assert!(socket.frames.borrow().is_empty());

    client.event(ClientEvent::TransmitBufferEmpty);
    assert_eq!(client.transport().sent.len(), 1);
}

#[test]
fn test_pong_and_reserved_control_frames_are_ignored() {
    let (mut client, socket) = upgraded();

    client.event(frame(true, Opcode::Pong, "x"));
    client.event(frame(true, Opcode::Reserved(0xB), ""));

    assert!(client.transport().sent.is_empty());
    assert!(!client.transport().closed);
    assert!(socket.frames.borrow().is_empty());
}

#[test]
fn test_fragmented_message_keeps_text_flag() {
    let (mut client, socket) = upgraded();

    client.event(frame(false, Opcode::Text, "he"));
    client.event(frame(false, Opcode::Continuation, "ll"));
    client.event(frame(true, Opcode::Continuation, "o"));
    client.event(frame(true, Opcode::Binary, "\x01"));

    let frames = socket.frames.borrow();
    assert_eq!(frames.len(), 4);

    assert_eq!(
        frames[0],
        ReceivedFrame {
            first: true,
            last: false,
            text: true,
            payload: b"he".to_vec()
        }
    );
    assert!(!frames[1].first && !frames[1].last && frames[1].text);
    assert!(!frames[2].first && frames[2].last && frames[2].text);
    assert!(frames[3].first && frames[3].last && !frames[3].text);
}

#[test]
fn test_control_frame_between_fragments_does_not_break_message() {
    let (mut client, socket) = upgraded();

    client.event(frame(false, Opcode::Text, "a"));
    client.event(frame(true, Opcode::Ping, ""));
    client.event(frame(true, Opcode::Continuation, "b"));

    let frames = socket.frames.borrow();
    assert_eq!(frames.len(), 2);
    assert!(frames[1].text && frames[1].last);
    assert_eq!(client.transport().sent.len(), 1);
}

#[test]
fn test_second_upgrade_keeps_first_handler() {
    let (mut client, first) = upgraded();
    let second = RecordingSocket::default();

    client.upgrade_to_websocket(Box::new(second.clone()));
    client.event(frame(true, Opcode::Binary, "x"));

    assert_eq!(client.mode(), Mode::WebSocket);
    assert_eq!(first.frames.borrow().len(), 1);
    assert!(second.frames.borrow().is_empty());
}

#[test]
fn test_request_packet_in_websocket_mode_is_dropped() {
    let (mut client, socket) = upgraded();

    client.event(get("/"));

    assert!(client.transport().sent.is_empty());
    assert!(socket.frames.borrow().is_empty());
}

#[test]
fn test_handler_replies_go_out_as_raw_frames() {
    let mut client = idle_client();
    client.upgrade_to_websocket(Box::new(EchoSocket::default()));

    client.event(frame(false, Opcode::Text, "hel"));
    assert!(client.transport().sent.is_empty());
    client.event(frame(true, Opcode::Continuation, "lo"));
    drain(&mut client);

    assert_eq!(
        client.transport().sent,
        vec![OutboundFrame::Body(encode_server_frame(true, Opcode::Text, b"hello"))]
    );
}

#[test]
fn test_upgrade_through_default_routes() {
    let mut client = ServerClient::new(
        RecordingTransport::default(),
        Box::new(DefaultRoutes),
        EngineConfig::default(),
    );

    client.event(request(
        "GET",
        "/ws",
        headers(&[
            ("upgrade", "websocket"),
            ("connection", "Upgrade"),
            ("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("sec-websocket-version", "13"),
        ]),
    ));

    assert_eq!(client.mode(), Mode::WebSocket);
    match &client.transport().sent[0] {
        OutboundFrame::Head { status, headers, .. } => {
            assert_eq!(*status, StatusCode::SwitchingProtocols);
            assert_eq!(headers["Sec-WebSocket-Accept"], "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        }
        other => panic!("expected handshake head, got {other:?}"),
    }

    client.event(frame(true, Opcode::Binary, "ping"));
    drain(&mut client);

    assert_eq!(
        client.transport().sent.last().unwrap(),
        &OutboundFrame::Body(encode_server_frame(true, Opcode::Binary, b"ping"))
    );
}

#[test]
fn test_bad_handshake_stays_in_http_mode() {
    let mut client = ServerClient::new(
        RecordingTransport::default(),
        Box::new(DefaultRoutes),
        EngineConfig::default(),
    );

    client.event(request("GET", "/ws", headers(&[("upgrade", "websocket")])));
    drain(&mut client);

    assert_eq!(client.mode(), Mode::Http);
    assert!(!client.has_websocket_handler());
    match &client.transport().sent[0] {
        OutboundFrame::Head { status, .. } => assert_eq!(*status, StatusCode::BadRequest),
        other => panic!("expected error head, got {other:?}"),
    }
}

#[test]
fn test_reply_after_close_frame_is_discarded() {
    let (mut client, _socket) = upgraded();

    client.event(frame(true, Opcode::Close, ""));
    client.event(frame(true, Opcode::Ping, "x"));
    client.reply(Box::new(ScriptedResponse::single("late")), false);

    assert!(client.is_closed());
    assert!(client.transport().sent.is_empty());
}
