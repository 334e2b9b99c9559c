//! Request handling for the stock `ember` binary.

use bytes::BytesMut;
use tracing::{debug, info};

use crate::http::connection::{RequestContext, RequestHandler, Responder};
use crate::http::request::Method;
use crate::http::response::{StatusCode, StringResponse};
use crate::websocket::WebSocketHandler;
use crate::websocket::handshake::upgrade_response;
use crate::websocket::response::WsResponse;

#[derive(Debug, Default)]
pub struct DefaultRoutes;

impl RequestHandler for DefaultRoutes {
    fn handle(&mut self, req: RequestContext<'_>, responder: &mut dyn Responder) {
        if req.method == Method::POST && req.url == "/form" {
            let within_limit = req.mime.accept(req.headers, req.body, req.first_fragment, req.last_fragment);
            if !req.last_fragment {
                return;
            }
            if !within_limit {
                responder.reply_error(Box::new(StringResponse::text(
                    StatusCode::PayloadTooLarge,
                    "413 Payload Too Large",
                )));
                return;
            }

            let mut fields: Vec<_> = req.mime.form().iter().collect();
            fields.sort();
            let body: String = fields.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
            responder.reply(Box::new(StringResponse::ok(body)), false);
            return;
        }

        if !req.last_fragment {
            return;
        }

        debug!(method = ?req.method, url = %req.url, "Routing request");

        let response = match (req.method, req.url) {
            (Method::GET, "/") => StringResponse::ok("Hello from ember\n"),
            (Method::HEAD, "/") => StringResponse::new(StatusCode::Ok),
            (Method::GET, "/echo") => {
                let mut params: Vec<_> = req.parameters.iter().collect();
                params.sort();
                StringResponse::ok(params.iter().map(|(k, v)| format!("{k}={v}\n")).collect::<String>())
            }
            (Method::GET, "/ws") => match upgrade_response(req.headers) {
                Ok(handshake) => {
                    info!(url = %req.url, "Accepting websocket upgrade");
                    responder.upgrade(Box::new(handshake), Box::new(EchoSocket::default()));
                    return;
                }
                Err(e) => StringResponse::text(StatusCode::BadRequest, e.to_string()),
            },
            _ => StringResponse::not_found(),
        };

        responder.reply(Box::new(response), false);
    }
}

/// Sends every complete message back to the client.
#[derive(Debug, Default)]
pub struct EchoSocket {
    message: BytesMut,
}

impl WebSocketHandler for EchoSocket {
    fn data_received(&mut self, first: bool, last: bool, text: bool, payload: &[u8], responder: &mut dyn Responder) {
        if first {
            self.message.clear();
        }
        self.message.extend_from_slice(payload);

        if last {
            let reply = if text {
                WsResponse::text(&String::from_utf8_lossy(&self.message))
            } else {
                WsResponse::binary(&self.message)
            };
            responder.reply(Box::new(reply), false);
            self.message.clear();
        }
    }
}
