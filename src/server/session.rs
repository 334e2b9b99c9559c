use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::config::Config;
use crate::http::connection::{ClientEvent, Inbound, Mode, RequestHandler, ServerClient, Transport};
use crate::http::parser::RequestFramer;
use crate::http::response::{StatusCode, StringResponse};
use crate::http::writer::OutboundFrame;
use crate::websocket::frame::decode_client_frame;

/// Send buffer and socket settings shared with the engine.
#[derive(Debug, Default)]
pub struct TcpTransport {
    tx: BytesMut,
    receive_timeout: Duration,
    closed: bool,
}

impl TcpTransport {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn take_pending(&mut self) -> BytesMut {
        self.tx.split()
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, frame: OutboundFrame) {
        frame.encode(&mut self.tx);
    }

    fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Drives one [`ServerClient`] from a TCP socket.
///
/// Every read is turned into `DataAvailable` events, every drained send
/// buffer into a `TransmitBufferEmpty` event.
pub struct Session {
    stream: TcpStream,
    buffer: BytesMut,
    framer: RequestFramer,
    max_websocket_payload: usize,
    client: ServerClient<TcpTransport>,
    // framing is lost, stop reading once the send buffer is flushed
    fatal: bool,
}

impl Session {
    pub fn new(stream: TcpStream, cfg: &Config, handler: Box<dyn RequestHandler>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            framer: RequestFramer::new(cfg.max_header_size, cfg.max_fragment_size),
            max_websocket_payload: cfg.max_websocket_payload,
            client: ServerClient::new(TcpTransport::default(), handler, cfg.engine()),
            fatal: false,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.client.event(ClientEvent::Connected);

        loop {
            self.flush().await?;

            if self.fatal || self.client.transport().is_closed() {
                break;
            }

            let timeout = self.client.transport().receive_timeout();
            let n = if timeout.is_zero() {
                self.stream.read_buf(&mut self.buffer).await?
            } else {
                match tokio::time::timeout(timeout, self.stream.read_buf(&mut self.buffer)).await {
                    Ok(read) => read?,
                    Err(_) => {
                        debug!(timeout = ?timeout, "Receive timeout, closing connection");
                        break;
                    }
                }
            };

            if n == 0 {
                // Client closed connection
                self.client.event(ClientEvent::Disconnected);
                break;
            }

            self.dispatch();
        }

        let _ = self.stream.shutdown().await;
        Ok(())
    }

    /// Feeds every complete fragment or frame in the read buffer to the engine.
    fn dispatch(&mut self) {
        while !self.fatal && !self.client.transport().is_closed() {
            let inbound = match self.client.mode() {
                Mode::Http => match self.framer.next_packet(&mut self.buffer) {
                    Ok(Some(packet)) => Inbound::Request(packet),
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "Malformed request, closing connection");
                        self.client
                            .reply_error(Box::new(StringResponse::text(StatusCode::BadRequest, "400 Bad Request")));
                        self.fatal = true;
                        return;
                    }
                },
                Mode::WebSocket => match decode_client_frame(&mut self.buffer, self.max_websocket_payload) {
                    Ok(Some(frame)) => Inbound::Frame(frame),
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "Malformed websocket frame, closing connection");
                        self.client.close();
                        return;
                    }
                },
            };

            self.client.event(ClientEvent::DataAvailable(inbound));
        }
    }

    /// Writes out the send buffer, raising `TransmitBufferEmpty` until the
    /// engine has nothing more to send.
    async fn flush(&mut self) -> anyhow::Result<()> {
        loop {
            let pending = self.client.transport_mut().take_pending();
            if !pending.is_empty() {
                self.stream.write_all(&pending).await?;
            }

            if self.client.transport().is_closed() || self.client.is_idle() {
                self.stream.flush().await?;
                return Ok(());
            }

            self.client.event(ClientEvent::TransmitBufferEmpty);
        }
    }
}
