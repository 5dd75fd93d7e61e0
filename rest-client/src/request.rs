use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Method;

use crate::error::Error;

static SEQUENCE_NUMBER: AtomicU64 = AtomicU64::new(0);

/// Correlates the log lines of one request. Never sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceTag(u64);

impl TraceTag {
    /// Issues the next tag of this process. The first tag is 1.
    pub fn next() -> Self {
        Self(SEQUENCE_NUMBER.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// The numeric value of the tag.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TraceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything needed to send one request, independent of the client.
#[derive(Debug)]
pub(crate) struct RequestDescriptor<'a> {
    pub method: Method,
    pub path: &'a str,
    pub headers: HeaderMap,
    /// `None` means the request has no payload at all (GET, DELETE).
    pub body: Option<String>,
    pub trace_tag: TraceTag,
}

impl<'a> RequestDescriptor<'a> {
    pub fn get(path: &'a str) -> Self {
        Self::bodiless(Method::GET, path)
    }

    pub fn delete(path: &'a str) -> Self {
        Self::bodiless(Method::DELETE, path)
    }

    /// An absent body still produces an (empty) payload.
    pub fn post(
        path: &'a str,
        body: Option<&str>,
        content_type: Option<HeaderValue>,
    ) -> Self {
        Self::with_payload(Method::POST, path, body.unwrap_or_default(), content_type)
    }

    /// # Errors
    /// If the credentials cannot be represented as a header value.
    pub fn post_with_basic_auth(
        path: &'a str,
        body: &str,
        username: &str,
        password: &str,
        content_type: Option<HeaderValue>,
    ) -> Result<Self, Error> {
        let mut request = Self::with_payload(Method::POST, path, body, content_type);
        request
            .headers
            .insert(header::AUTHORIZATION, basic_auth(username, password)?);
        Ok(request)
    }

    pub fn put(path: &'a str, body: &str) -> Self {
        Self::with_payload(
            Method::PUT,
            path,
            body,
            Some(HeaderValue::from_static("application/json")),
        )
    }

    fn bodiless(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            headers: HeaderMap::new(),
            body: None,
            trace_tag: TraceTag::next(),
        }
    }

    fn with_payload(
        method: Method,
        path: &'a str,
        body: &str,
        content_type: Option<HeaderValue>,
    ) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        // An empty payload must still be framed with a zero length.
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        Self {
            method,
            path,
            headers,
            body: Some(body.to_owned()),
            trace_tag: TraceTag::next(),
        }
    }
}

fn basic_auth(username: &str, password: &str) -> Result<HeaderValue, Error> {
    let credentials = base64::engine::general_purpose::STANDARD
        .encode(format!("{username}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))
        .map_err(|e| Error::transport(format!("invalid basic auth header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}
