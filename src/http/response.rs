use std::collections::HashMap;

use bytes::Bytes;

pub const CONNECTION: &str = "Connection";
pub const KEEP_ALIVE: &str = "Keep-Alive";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TYPE: &str = "Content-Type";

/// HTTP status codes supported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 101 Switching Protocols
    SwitchingProtocols,
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 413 Payload Too Large
    PayloadTooLarge,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use ember::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::SwitchingProtocols => 101,
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::PayloadTooLarge => 413,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::SwitchingProtocols => "Switching Protocols",
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// Outcome of asking a producer for its next chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// A chunk was produced and more will follow.
    HasMoreData,
    /// A chunk was produced and it is the final one carrying data.
    LastData,
    /// The producer is exhausted.
    EndOfData,
    /// The producer failed; the connection must be closed.
    Error,
}

/// A response that is streamed to the client in bounded chunks.
///
/// The connection engine owns queued operations exclusively. It reads the
/// status code and headers once, when the operation starts, and then pulls
/// body chunks with [`get_data`](ResponseOperation::get_data) each time the
/// transport can accept more bytes.
pub trait ResponseOperation {
    fn headers(&self) -> &HashMap<String, String>;

    fn response_code(&self) -> StatusCode;

    /// Produces at most `max_size` bytes of body data.
    fn get_data(&mut self, max_size: usize) -> (ResponseStatus, Bytes);

    /// Adds a header unless one with the same name (ignoring case) exists.
    fn add_header(&mut self, key: &str, value: &str);

    /// Adds or replaces a header.
    fn set_header(&mut self, key: &str, value: &str);
}

/// Inserts `key: value` only if no header with that name is present.
pub fn add_header(headers: &mut HashMap<String, String>, key: &str, value: &str) {
    if !headers.keys().any(|k| k.eq_ignore_ascii_case(key)) {
        headers.insert(key.to_string(), value.to_string());
    }
}

/// Inserts `key: value`, replacing any header with that name regardless of case.
pub fn set_header(headers: &mut HashMap<String, String>, key: &str, value: &str) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(key));
    headers.insert(key.to_string(), value.to_string());
}

/// Looks up a header value ignoring ASCII case of the name.
pub fn find_header<'a>(headers: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// An in-memory response body handed out in chunks.
#[derive(Debug)]
pub struct StringResponse {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Bytes,
    offset: usize,
}

impl StringResponse {
    /// Creates a response without a body.
    pub fn new(status: StatusCode) -> Self {
        ResponseBuilder::new(status).build()
    }

    /// Creates a text/plain response with the given body.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(status)
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .build()
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::text(StatusCode::Ok, body)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::text(StatusCode::NotFound, "404 Not Found")
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::text(StatusCode::InternalServerError, "500 Internal Server Error")
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl ResponseOperation for StringResponse {
    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    fn response_code(&self) -> StatusCode {
        self.status
    }

    fn get_data(&mut self, max_size: usize) -> (ResponseStatus, Bytes) {
        let remaining = self.body.len() - self.offset;
        if remaining == 0 {
            return (ResponseStatus::EndOfData, Bytes::new());
        }

        let take = remaining.min(max_size);
        let chunk = self.body.slice(self.offset..self.offset + take);
        self.offset += take;

        if self.offset == self.body.len() {
            (ResponseStatus::LastData, chunk)
        } else {
            (ResponseStatus::HasMoreData, chunk)
        }
    }

    fn add_header(&mut self, key: &str, value: &str) {
        add_header(&mut self.headers, key, value);
    }

    fn set_header(&mut self, key: &str, value: &str) {
        set_header(&mut self.headers, key, value);
    }
}

/// Builder for constructing string responses in a fluent style.
///
/// # Example
///
/// ```
/// # use ember::http::response::{ResponseBuilder, ResponseOperation, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body("{}")
///     .build();
/// assert_eq!(response.headers().get("Content-Length").unwrap(), "2");
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        set_header(&mut self.headers, &key, &value.into());
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the final response.
    ///
    /// Adds the Content-Length header based on body size if not already present.
    /// 101 responses never carry a body and get no Content-Length.
    pub fn build(mut self) -> StringResponse {
        if self.status != StatusCode::SwitchingProtocols {
            add_header(&mut self.headers, CONTENT_LENGTH, &self.body.len().to_string());
        }

        StringResponse {
            status: self.status,
            headers: self.headers,
            body: self.body,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_response_streams_in_bounded_chunks() {
        let mut resp = StringResponse::ok("hello world");

        assert_eq!(
            resp.get_data(5),
            (ResponseStatus::HasMoreData, Bytes::from_static(b"hello"))
        );
        assert_eq!(
            resp.get_data(5),
            (ResponseStatus::HasMoreData, Bytes::from_static(b" worl"))
        );
        assert_eq!(
            resp.get_data(5),
            (ResponseStatus::LastData, Bytes::from_static(b"d"))
        );
        assert_eq!(resp.get_data(5).0, ResponseStatus::EndOfData);
    }

    #[test]
    fn empty_body_ends_immediately() {
        let mut resp = StringResponse::new(StatusCode::MethodNotAllowed);
        let (status, data) = resp.get_data(128);

        assert_eq!(status, ResponseStatus::EndOfData);
        assert!(data.is_empty());
        assert_eq!(resp.headers().get(CONTENT_LENGTH).unwrap(), "0");
    }

    #[test]
    fn add_header_keeps_existing_value() {
        let mut resp = StringResponse::new(StatusCode::Ok);
        resp.set_header("connection", "Upgrade");
        resp.add_header(CONNECTION, "keep-alive");

        assert_eq!(find_header(resp.headers(), CONNECTION), Some("Upgrade"));
    }

    #[test]
    fn set_header_replaces_regardless_of_case() {
        let mut resp = StringResponse::new(StatusCode::Ok);
        resp.set_header("connection", "keep-alive");
        resp.set_header(CONNECTION, "close");

        assert_eq!(resp.headers().len(), 2);
        assert_eq!(resp.headers().get(CONNECTION).unwrap(), "close");
    }
}
