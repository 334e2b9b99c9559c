use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::http::response::StatusCode;

pub const HTTP_VERSION: &str = "1.1";

/// A complete unit submitted to the transport's send buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Status line, headers and the first body chunk of a response.
    Head {
        status: StatusCode,
        version: &'static str,
        headers: HashMap<String, String>,
        body: Bytes,
    },
    /// Raw bytes: a later body chunk, or WebSocket frame data.
    Body(Bytes),
}

impl OutboundFrame {
    pub fn head(status: StatusCode, headers: HashMap<String, String>, body: Bytes) -> Self {
        OutboundFrame::Head {
            status,
            version: HTTP_VERSION,
            headers,
            body,
        }
    }

    pub fn body(&self) -> &Bytes {
        match self {
            OutboundFrame::Head { body, .. } => body,
            OutboundFrame::Body(body) => body,
        }
    }

    pub fn is_head(&self) -> bool {
        matches!(self, OutboundFrame::Head { .. })
    }

    fn size_hint(&self) -> usize {
        match self {
            OutboundFrame::Head { headers, body, .. } => {
                let head: usize = headers.iter().map(|(k, v)| k.len() + v.len() + 4).sum();
                32 + head + 2 + body.len()
            }
            OutboundFrame::Body(body) => body.len(),
        }
    }

    /// Serializes the frame into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            OutboundFrame::Head {
                status,
                version,
                headers,
                body,
            } => {
                buf.reserve(self.size_hint());

                // Status line
                let status_line = format!(
                    "HTTP/{} {} {}\r\n",
                    version,
                    status.as_u16(),
                    status.reason_phrase()
                );
                buf.put_slice(status_line.as_bytes());

                // Headers
                for (k, v) in headers {
                    buf.put_slice(k.as_bytes());
                    buf.put_slice(b": ");
                    buf.put_slice(v.as_bytes());
                    buf.put_slice(b"\r\n");
                }

                // Header/body separator
                buf.put_slice(b"\r\n");

                buf.put_slice(body);
            }
            OutboundFrame::Body(body) => buf.put_slice(body),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}
