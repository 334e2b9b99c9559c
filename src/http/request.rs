use std::collections::HashMap;

use bytes::Bytes;

/// HTTP request methods understood by the connection engine.
///
/// The set is closed: any other verb on the wire is answered with
/// 405 Method Not Allowed before a handler ever sees the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// Matching is exact and case-sensitive, HTTP verbs are case-sensitive
    /// (RFC 7230 section 3.1.1).
    ///
    /// # Example
    ///
    /// ```
    /// # use ember::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// assert_eq!(Method::from_str("PATCH"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
        }
    }
}

/// One inbound HTTP fragment as delivered by the framer.
///
/// A request arrives as a first fragment carrying the request line and
/// headers, optionally followed by continuation fragments carrying the
/// rest of the body. `continuation` marks a fragment that belongs to an
/// already started request, `continued` marks that more fragments follow.
#[derive(Debug, Clone, Default)]
pub struct RequestPacket {
    /// Raw request method as it appeared on the wire (empty on continuations)
    pub method: String,
    /// Raw request target, path plus optional query (empty on continuations)
    pub url: String,
    /// HTTP version, e.g. "HTTP/1.1"
    pub version: String,
    /// Request headers with lower-cased names
    pub headers: HashMap<String, String>,
    /// Body bytes carried by this fragment
    pub body: Bytes,
    /// This fragment continues an earlier one
    pub continuation: bool,
    /// More fragments follow this one
    pub continued: bool,
}

impl RequestPacket {
    /// Creates the first fragment of a request.
    pub fn head(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: HashMap<String, String>,
        body: impl Into<Bytes>,
        continued: bool,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            version: "HTTP/1.1".to_string(),
            headers,
            body: body.into(),
            continuation: false,
            continued,
        }
    }

    /// Creates a body-only fragment continuing the current request.
    pub fn continuation(body: impl Into<Bytes>, continued: bool) -> Self {
        Self {
            body: body.into(),
            continuation: true,
            continued,
            ..Default::default()
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.continuation
    }

    pub fn is_continued(&self) -> bool {
        self.continued
    }

    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}
