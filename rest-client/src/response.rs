use encoding_rs::{Encoding, UTF_8};
use mime::Mime;
use reqwest::header::{self, HeaderMap};
use reqwest::{Response, StatusCode};

use crate::error::Error;

/// Status, headers and text body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEntity {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<String>,
}

impl ResponseEntity {
    /// Assembles an entity from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Option<String>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The body as received; `None` if the server sent zero bytes.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// The `Content-Type` header, if present and visible ASCII.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Same as [`to_body`], consuming the entity.
    pub fn into_body(self) -> String {
        to_body(self)
    }
}

/// Returns the body of `entity`, or an empty string if it had none.
pub fn to_body(entity: ResponseEntity) -> String {
    entity.body.unwrap_or_default()
}

/// Reads the whole body of `response` and turns it into an entity, or into
/// [`Error::Protocol`] for 4xx/5xx statuses.
pub(crate) async fn read_entity(
    response: Response,
    max_in_memory_size: Option<usize>,
) -> Result<ResponseEntity, Error> {
    let status = response.status();
    let headers = response.headers().clone();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body = read_bytes(response, max_in_memory_size)
        .await?
        .map(|bytes| decode_text(&bytes, content_type));

    if status.is_client_error() || status.is_server_error() {
        return Err(Error::Protocol {
            status,
            headers,
            body: body.unwrap_or_default(),
        });
    }

    Ok(ResponseEntity::new(status, headers, body))
}

async fn read_bytes(
    mut response: Response,
    max_in_memory_size: Option<usize>,
) -> Result<Option<Vec<u8>>, Error> {
    let mut buf = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::from_reqwest("failed reading response body", e))?
    {
        if let Some(limit) = max_in_memory_size
            && buf.len() + chunk.len() > limit
        {
            return Err(Error::transport(format!(
                "exceeded limit on max bytes to buffer: {limit}"
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    if buf.is_empty() {
        return Ok(None);
    }
    Ok(Some(buf))
}

/// Decodes `bytes` with the charset named in `content_type`, falling back to
/// UTF-8. Malformed sequences become U+FFFD.
fn decode_text(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(|v| v.parse::<Mime>().ok())
        .and_then(|media_type| {
            media_type
                .get_param(mime::CHARSET)
                .and_then(|charset| Encoding::for_label(charset.as_str().as_bytes()))
        })
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}
