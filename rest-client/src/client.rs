use std::fmt;

use reqwest::header::HeaderValue;
use reqwest::Client;
use tokio::sync::OnceCell;
use tracing::{debug, field, trace, Instrument as _};
use url::Url;

use crate::builder::build_http_client;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::request::RequestDescriptor;
use crate::response::{read_entity, to_body, ResponseEntity};

/// Generic asynchronous REST client bound to one base URL.
///
/// The underlying HTTP client is built on first use and then shared by all
/// requests; concurrent first requests still build it only once.
///
/// # Example
/// ```rust,no_run
/// use orb_rest_client::{AsyncRestClient, ClientConfig};
///
/// # async fn run() -> Result<(), orb_rest_client::Error> {
/// let client = AsyncRestClient::new(ClientConfig::new("http://localhost:8080"));
/// let item = client.get("/items/1").await?;
/// client.put("/items/1", &item).await?;
/// # Ok(())
/// # }
/// ```
pub struct AsyncRestClient {
    config: ClientConfig,
    client: OnceCell<Client>,
}

impl AsyncRestClient {
    /// Creates a client for `config`. No connection is made and nothing is
    /// built until the first request.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// The base URL every request path is appended to.
    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    /// The configuration this client was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the shared underlying client, building it if necessary.
    ///
    /// # Errors
    /// If the client cannot be built. Nothing is cached in that case, so
    /// the next call tries again.
    pub async fn client(&self) -> Result<&Client, Error> {
        self.client
            .get_or_try_init(|| async { build_http_client(&self.config) })
            .await
    }

    /// POSTs `body` (an empty payload when `None`) with an optional
    /// `Content-Type` and returns the whole response.
    ///
    /// # Errors
    /// [`Error::Protocol`] for a 4xx/5xx status, [`Error::Transport`] when no
    /// complete exchange happened.
    pub async fn post_for_entity(
        &self,
        path: &str,
        body: Option<&str>,
        content_type: Option<HeaderValue>,
    ) -> Result<ResponseEntity, Error> {
        let request = RequestDescriptor::post(path, body, content_type);
        self.log_request("POST", &request);
        self.retrieve(request).await
    }

    /// Like [`Self::post_for_entity`] but only returns the body text, `""`
    /// when the response had none.
    pub async fn post(
        &self,
        path: &str,
        body: Option<&str>,
        content_type: Option<HeaderValue>,
    ) -> Result<String, Error> {
        self.post_for_entity(path, body, content_type)
            .await
            .map(to_body)
    }

    /// POSTs with an `Authorization: Basic` header built from the credentials.
    pub async fn post_with_auth_header(
        &self,
        path: &str,
        body: &str,
        username: &str,
        password: &str,
        content_type: Option<HeaderValue>,
    ) -> Result<String, Error> {
        let request = RequestDescriptor::post_with_basic_auth(
            path,
            body,
            username,
            password,
            content_type,
        )?;
        self.log_request("POST (auth)", &request);
        self.retrieve(request).await.map(to_body)
    }

    /// PUTs a JSON document.
    pub async fn put_for_entity(
        &self,
        path: &str,
        body: &str,
    ) -> Result<ResponseEntity, Error> {
        let request = RequestDescriptor::put(path, body);
        self.log_request("PUT", &request);
        self.retrieve(request).await
    }

    /// Like [`Self::put_for_entity`] but only returns the body text.
    pub async fn put(&self, path: &str, body: &str) -> Result<String, Error> {
        self.put_for_entity(path, body).await.map(to_body)
    }

    /// GETs `path` and returns the whole response.
    pub async fn get_for_entity(&self, path: &str) -> Result<ResponseEntity, Error> {
        let request = RequestDescriptor::get(path);
        self.log_request("GET", &request);
        self.retrieve(request).await
    }

    /// GETs `path` and returns the body text, `""` when there was none.
    pub async fn get(&self, path: &str) -> Result<String, Error> {
        self.get_for_entity(path).await.map(to_body)
    }

    /// DELETEs `path` and returns the whole response.
    pub async fn delete_for_entity(&self, path: &str) -> Result<ResponseEntity, Error> {
        let request = RequestDescriptor::delete(path);
        self.log_request("DELETE", &request);
        self.retrieve(request).await
    }

    /// DELETEs `path` and returns the body text.
    pub async fn delete(&self, path: &str) -> Result<String, Error> {
        self.delete_for_entity(path).await.map(to_body)
    }

    /// Sends `request` and logs the outcome under its trace tag. The result
    /// is returned exactly as produced.
    async fn retrieve(
        &self,
        request: RequestDescriptor<'_>,
    ) -> Result<ResponseEntity, Error> {
        let trace_tag = request.trace_tag;
        let span = tracing::debug_span!(
            "http.request",
            trace_tag = %trace_tag,
            http.method = %request.method,
            http.url = %self.log_base_url(),
            http.path = request.path,
            http.status_code = field::Empty,
        );

        self.dispatch(request)
            .instrument(span.clone())
            .await
            .inspect(|entity| {
                span.record("http.status_code", entity.status().as_u16());
                trace!(
                    parent: &span,
                    trace_tag = %trace_tag,
                    "Received: {} {}",
                    entity.body().unwrap_or_default(),
                    entity.content_type().unwrap_or_default()
                );
            })
            .inspect_err(|err| match err {
                Error::Protocol { status, body, .. } => {
                    span.record("http.status_code", status.as_u16());
                    debug!(
                        parent: &span,
                        trace_tag = %trace_tag,
                        "HTTP error status = '{status}', body '{body}'"
                    );
                }
                Error::Transport { message, .. } => {
                    debug!(
                        parent: &span,
                        trace_tag = %trace_tag,
                        "HTTP error {message}"
                    );
                }
            })
    }

    fn log_request(&self, label: &str, request: &RequestDescriptor<'_>) {
        debug!(
            trace_tag = %request.trace_tag,
            "{label} uri = '{}'",
            join_url(&self.log_base_url(), request.path)
        );
        if let Some(body) = &request.body {
            trace!(trace_tag = %request.trace_tag, "{} body: {body}", request.method);
        }
    }

    async fn dispatch(
        &self,
        request: RequestDescriptor<'_>,
    ) -> Result<ResponseEntity, Error> {
        let client = self.client().await?;
        let url = join_url(self.config.base_url(), request.path);
        let url = Url::parse(&url)
            .map_err(|e| Error::transport(format!("invalid request uri '{url}': {e}")))?;

        let mut builder = client.request(request.method, url).headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest("error sending request", e))?;

        read_entity(response, self.config.max_in_memory_size()).await
    }

    fn log_base_url(&self) -> String {
        sanitize_url(self.config.base_url())
    }
}

impl fmt::Debug for AsyncRestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRestClient")
            .field("base_url", &self.log_base_url())
            .field("initialized", &self.client.initialized())
            .finish()
    }
}

/// Appends `path` to `base`, collapsing the `/` both sides would otherwise
/// contribute.
fn join_url(base: &str, path: &str) -> String {
    match base.strip_suffix('/') {
        Some(trimmed) if path.starts_with('/') => format!("{trimmed}{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Removes user info and query from a URL before it ends up in logs.
/// Unparsable input is returned unchanged.
fn sanitize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_owned();
    };
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_query(None);

    // `Url` always renders a path. Only keep the root `/` if it was there.
    let raw_path_has_slash = raw
        .split(['?', '#'])
        .next()
        .is_some_and(|before_query| before_query.ends_with('/'));
    let mut sanitized = url.to_string();
    if !raw_path_has_slash && url.path() == "/" {
        sanitized.pop();
    }
    sanitized
}
