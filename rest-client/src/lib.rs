//! # orb-rest-client
//!
//! A generic asynchronous REST client built on [`reqwest`].
//!
//! One [`AsyncRestClient`] talks to one base URL, optionally over TLS
//! ([`TlsContext`]) and/or through an HTTP forward proxy
//! ([`HttpProxyConfig`]). Every request
//!  - gets a process-wide, strictly increasing [`TraceTag`] that ties its log
//!    lines together,
//!  - is bounded by connect (10s), read (30s) and write (30s) timeouts,
//!  - resolves to a [`ResponseEntity`], or to just its body text, or fails
//!    with an [`Error`] that is either a protocol failure (4xx/5xx with the
//!    response body) or a transport failure (no complete exchange).
//!
//! Nothing is retried. Failures are logged at `debug` and handed back
//! unchanged.
//!
//! ## Example
//! ```rust,no_run
//! use orb_rest_client::{AsyncRestClient, ClientConfig, HttpProxyConfig};
//! use orb_rest_client::reqwest::header::HeaderValue;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), orb_rest_client::Error> {
//!     let client = AsyncRestClient::new(
//!         ClientConfig::new("http://message-router:3904")
//!             .with_proxy(HttpProxyConfig::new("proxy.local", 8080)),
//!     );
//!
//!     client
//!         .post(
//!             "/events/unauthenticated.dmaapadp.json",
//!             Some(r#"{"id":1}"#),
//!             Some(HeaderValue::from_static("application/json")),
//!         )
//!         .await?;
//!
//!     match client.get("/events/missing").await {
//!         Err(err) if err.status().is_some_and(|s| s.as_u16() == 404) => {
//!             println!("not there: {}", err.body().unwrap_or_default());
//!         }
//!         other => println!("{other:?}"),
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]

mod builder;
mod client;
mod config;
mod error;
mod request;
mod response;

pub use client::AsyncRestClient;
pub use config::{
    ClientConfig, HttpProxyConfig, Timeouts, TlsContext, CONNECT_TIMEOUT,
    READ_TIMEOUT, WRITE_TIMEOUT,
};
pub use error::{Error, TlsError};
pub use request::TraceTag;
pub use response::{to_body, ResponseEntity};

pub use reqwest;
