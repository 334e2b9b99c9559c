use std::collections::HashMap;

use bytes::BytesMut;
use thiserror::Error;

use crate::http::request::RequestPacket;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("incomplete request head")]
    Incomplete,
}

/// Request line and headers of a request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    pub url: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub content_length: usize,
}

/// Parses a request head from the start of `buf`.
///
/// Returns the head and the number of bytes it occupied, including the
/// blank line. Header names are lower-cased. The method is not validated
/// here, unsupported verbs are answered by the connection engine.
pub fn parse_request_head(buf: &[u8]) -> Result<(RequestHead, usize), ParseError> {
    // Look for header/body separator
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let header_bytes = &buf[..headers_end];

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method = parts.next().ok_or(ParseError::InvalidRequest)?;
    let url = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;
    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidRequest);
    }

    // Headers
    let mut headers = HashMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let content_length = headers
        .get("content-length")
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength)
        })
        .transpose()?
        .unwrap_or(0);

    let head = RequestHead {
        method: method.to_string(),
        url: url.to_string(),
        version: version.to_string(),
        headers,
        content_length,
    };

    Ok((head, headers_end + 4))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Splits an inbound byte stream into request fragments.
///
/// The first fragment of every request carries the head plus whatever
/// body bytes are already buffered, later fragments carry at most
/// `max_fragment` body bytes each.
#[derive(Debug)]
pub struct RequestFramer {
    max_head: usize,
    max_fragment: usize,
    remaining_body: usize,
}

impl RequestFramer {
    pub fn new(max_head: usize, max_fragment: usize) -> Self {
        Self {
            max_head,
            max_fragment: max_fragment.max(1),
            remaining_body: 0,
        }
    }

    /// True while the body of a request is still being framed.
    pub fn in_body(&self) -> bool {
        self.remaining_body > 0
    }

    /// Takes the next fragment off `buf`, or `None` if more bytes are needed.
    pub fn next_packet(&mut self, buf: &mut BytesMut) -> Result<Option<RequestPacket>, ParseError> {
        if self.in_body() {
            if buf.is_empty() {
                return Ok(None);
            }
            let body = self.take_body(buf);
            return Ok(Some(RequestPacket::continuation(body, self.in_body())));
        }

        let (head, consumed) = match parse_request_head(buf) {
            Ok(parsed) => parsed,
            Err(ParseError::Incomplete) => {
                if buf.len() > self.max_head {
                    return Err(ParseError::HeadTooLarge(self.max_head));
                }
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if consumed > self.max_head {
            return Err(ParseError::HeadTooLarge(self.max_head));
        }

        let _ = buf.split_to(consumed);
        self.remaining_body = head.content_length;
        let body = self.take_body(buf);

        let mut packet = RequestPacket::head(head.method, head.url, head.headers, body, self.in_body());
        packet.version = head.version;
        Ok(Some(packet))
    }

    fn take_body(&mut self, buf: &mut BytesMut) -> BytesMut {
        let take = buf.len().min(self.remaining_body).min(self.max_fragment);
        self.remaining_body -= take;
        buf.split_to(take)
    }
}
