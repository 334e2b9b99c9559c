//! Per-request body parsing state.
//!
//! The engine resets a [`MimeContext`] on the first fragment of every
//! request and hands the same instance to the request handler for each
//! following fragment.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use crate::http::response::find_header;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Default cap on buffered body bytes per request.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024;

#[derive(Debug)]
pub struct MimeContext {
    content_type: Option<String>,
    body: BytesMut,
    limit: usize,
    overflowed: bool,
    form: HashMap<String, String>,
    complete: bool,
}

impl Default for MimeContext {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_LIMIT)
    }
}

impl MimeContext {
    pub fn new(limit: usize) -> Self {
        Self {
            content_type: None,
            body: BytesMut::new(),
            limit,
            overflowed: false,
            form: HashMap::new(),
            complete: false,
        }
    }

    /// Forgets everything about the previous request.
    pub fn reset(&mut self) {
        self.content_type = None;
        self.body.clear();
        self.overflowed = false;
        self.form.clear();
        self.complete = false;
    }

    /// Feeds one body fragment.
    ///
    /// The content type is taken from `headers` on the first fragment.
    /// Once the last fragment arrives an urlencoded body is decoded into
    /// form fields. Returns `false` when the body exceeded the limit; the
    /// overflowing bytes are discarded.
    pub fn accept(
        &mut self,
        headers: &HashMap<String, String>,
        fragment: &[u8],
        first: bool,
        last: bool,
    ) -> bool {
        if first {
            self.content_type = find_header(headers, "content-type").map(|v| v.to_ascii_lowercase());
        }

        if self.body.len() + fragment.len() > self.limit {
            self.overflowed = true;
        } else if !self.overflowed {
            self.body.extend_from_slice(fragment);
        }

        if last {
            self.complete = true;
            if self.is_form() && !self.overflowed {
                self.form = url::form_urlencoded::parse(&self.body)
                    .into_owned()
                    .collect();
            }
        }

        !self.overflowed
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn is_form(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with(FORM_URLENCODED))
    }

    /// Decoded urlencoded form fields, available after the last fragment.
    pub fn form(&self) -> &HashMap<String, String> {
        &self.form
    }

    /// The buffered body so far.
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.body)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_headers() -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers
    }

    #[test]
    fn form_fields_decoded_after_last_fragment() {
        let mut mime = MimeContext::default();
        let headers = form_headers();

        assert!(mime.accept(&headers, b"name=Ada+L", true, false));
        assert!(mime.form().is_empty());
        assert!(mime.accept(&headers, b"&lang=rust%21", false, true));

        assert_eq!(mime.form()["name"], "Ada L");
        assert_eq!(mime.form()["lang"], "rust!");
        assert!(mime.is_complete());
    }

    #[test]
    fn overflow_is_reported_and_reset_clears_it() {
        let mut mime = MimeContext::new(4);
        let headers = form_headers();

        assert!(!mime.accept(&headers, b"a=12345", true, true));
        assert!(mime.overflowed());
        assert!(mime.form().is_empty());

        mime.reset();
        assert!(!mime.overflowed());
        assert!(mime.content_type().is_none());
        assert!(mime.body().is_empty());
    }
}
