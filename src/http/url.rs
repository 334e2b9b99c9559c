//! Request target decoding.
//!
//! Splits a raw request target into its path and query parameters and
//! percent-decodes both. The query is decoded *before* it is split on `&`
//! and `=`, so an escaped `%26` or `%3D` inside a value acts as a separator.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlDecodeError {
    #[error("malformed percent escape at offset {0}")]
    MalformedEscape(usize),
    #[error("decoded url is not valid utf-8")]
    InvalidUtf8,
}

/// A decoded request target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedUrl {
    pub path: String,
    pub parameters: HashMap<String, String>,
}

/// Percent-decodes `input`.
///
/// Every `%` must be followed by two hex digits.
///
/// # Example
///
/// ```
/// # use ember::http::url::percent_decode;
/// assert_eq!(percent_decode("two%20words").unwrap(), "two words");
/// assert!(percent_decode("/x%2").is_err());
/// ```
pub fn percent_decode(input: &str) -> Result<String, UrlDecodeError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = bytes.get(i + 1).copied().and_then(hex_val);
                let lo = bytes.get(i + 2).copied().and_then(hex_val);
                match (hi, lo) {
                    (Some(h), Some(l)) => out.push(h << 4 | l),
                    _ => return Err(UrlDecodeError::MalformedEscape(i)),
                }
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| UrlDecodeError::InvalidUtf8)
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decodes `raw` into a path and its query parameters.
///
/// Pairs without `=` are discarded and later duplicates of a key win.
///
/// # Example
///
/// ```
/// # use ember::http::url::decode_url;
/// let url = decode_url("/path?a=1&b=two%20words").unwrap();
/// assert_eq!(url.path, "/path");
/// assert_eq!(url.parameters["a"], "1");
/// assert_eq!(url.parameters["b"], "two words");
/// ```
pub fn decode_url(raw: &str) -> Result<DecodedUrl, UrlDecodeError> {
    let mut parameters = HashMap::new();

    let path = match raw.split_once('?') {
        Some((path, query)) => {
            let query = percent_decode(query).map_err(|e| match e {
                // report offsets relative to the whole target
                UrlDecodeError::MalformedEscape(pos) => {
                    UrlDecodeError::MalformedEscape(pos + path.len() + 1)
                }
                other => other,
            })?;

            for pair in query.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    parameters.insert(key.to_string(), value.to_string());
                }
            }

            path
        }
        None => raw,
    };

    Ok(DecodedUrl {
        path: percent_decode(path)?,
        parameters,
    })
}
