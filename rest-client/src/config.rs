use std::time::Duration;

use reqwest::{Certificate, ClientBuilder, Identity};
use serde::Deserialize;

use crate::error::TlsError;

/// Maximum time allowed for establishing a TCP (and proxy) connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Maximum time a single read on an established connection may stall.
pub const READ_TIMEOUT: Duration = Duration::from_millis(30_000);
/// Maximum time written data may stay unacknowledged by the peer.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Everything an [`AsyncRestClient`](crate::AsyncRestClient) needs to know
/// about the remote side. Immutable once handed over to the client.
///
/// # Example
/// ```rust
/// use orb_rest_client::{ClientConfig, HttpProxyConfig};
///
/// let config = ClientConfig::new("http://dmaap-mr:3904")
///     .with_proxy(HttpProxyConfig::new("proxy.local", 8080));
/// assert!(config.proxy().is_some_and(HttpProxyConfig::is_configured));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    tls: Option<TlsContext>,
    proxy: Option<HttpProxyConfig>,
    timeouts: Timeouts,
    max_in_memory_size: Option<usize>,
}

impl ClientConfig {
    /// Creates a config for plain connections to `base_url`, with default
    /// timeouts and no limit on buffered response bodies.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            tls: None,
            proxy: None,
            timeouts: Timeouts::default(),
            max_in_memory_size: None,
        }
    }

    /// Secures connections with the given TLS context.
    #[must_use]
    pub fn with_tls(self, tls: TlsContext) -> Self {
        Self {
            tls: Some(tls),
            ..self
        }
    }

    /// Routes connections through an HTTP forward proxy, if
    /// [`HttpProxyConfig::is_configured`] holds for it.
    #[must_use]
    pub fn with_proxy(self, proxy: HttpProxyConfig) -> Self {
        Self {
            proxy: Some(proxy),
            ..self
        }
    }

    /// Overrides the default connect/read/write timeouts.
    #[must_use]
    pub fn with_timeouts(self, timeouts: Timeouts) -> Self {
        Self { timeouts, ..self }
    }

    /// Caps how many bytes of a response body are buffered in memory.
    ///
    /// The default is `None`: bodies of any size are read completely. This
    /// avoids truncating large payloads but lets a misbehaving peer make us
    /// allocate without bound.
    #[must_use]
    pub fn with_max_in_memory_size(self, limit: Option<usize>) -> Self {
        Self {
            max_in_memory_size: limit,
            ..self
        }
    }

    /// The URL request paths are appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// TLS settings, `None` for the platform defaults.
    pub fn tls(&self) -> Option<&TlsContext> {
        self.tls.as_ref()
    }

    /// The proxy config, if one was set. It may still be unconfigured.
    pub fn proxy(&self) -> Option<&HttpProxyConfig> {
        self.proxy.as_ref()
    }

    /// Connection timeouts.
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Cap on buffered response bytes, `None` for unlimited.
    pub fn max_in_memory_size(&self) -> Option<usize> {
        self.max_in_memory_size
    }
}

/// Connection level timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bounds establishing the TCP connection, proxy included.
    pub connect: Duration,
    /// Applies to each read, including waiting for the response head.
    pub read: Duration,
    /// Installed as `TCP_USER_TIMEOUT` where the platform supports it.
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: CONNECT_TIMEOUT,
            read: READ_TIMEOUT,
            write: WRITE_TIMEOUT,
        }
    }
}

/// Location of an HTTP forward proxy.
///
/// An empty host or a zero port means "no proxy", so a config file can
/// carry the keys without enabling anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HttpProxyConfig {
    /// Host name or IP address of the proxy.
    #[serde(default)]
    pub host: String,
    /// Proxy port.
    #[serde(default)]
    pub port: u16,
}

impl HttpProxyConfig {
    /// Creates a proxy config. See [`Self::is_configured`].
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// True iff the host is non-empty and the port is greater than zero.
    pub fn is_configured(&self) -> bool {
        self.port > 0 && !self.host.is_empty()
    }

    pub(crate) fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Opaque TLS settings applied to the secure transport of the client.
#[derive(Clone)]
pub struct TlsContext {
    inner: TlsInner,
}

#[derive(Clone)]
enum TlsInner {
    Rustls(rustls::ClientConfig),
    Pem {
        roots: Vec<Certificate>,
        identity: Option<Identity>,
        built_in_roots: bool,
    },
}

impl TlsContext {
    /// Uses a fully prepared rustls configuration as is.
    pub fn from_rustls(config: rustls::ClientConfig) -> Self {
        Self {
            inner: TlsInner::Rustls(config),
        }
    }

    /// Trusts exactly the certificates of a PEM encoded CA bundle.
    ///
    /// # Errors
    /// If the bundle cannot be parsed or contains no certificate.
    pub fn from_pem(ca_bundle: &[u8]) -> Result<Self, TlsError> {
        let roots = Certificate::from_pem_bundle(ca_bundle)
            .map_err(TlsError::Certificate)?;
        if roots.is_empty() {
            return Err(TlsError::NoCertificates);
        }

        Ok(Self {
            inner: TlsInner::Pem {
                roots,
                identity: None,
                built_in_roots: false,
            },
        })
    }

    /// Presents a client certificate. `pem` must hold the certificate chain
    /// and the private key. Ignored for contexts made with
    /// [`TlsContext::from_rustls`], which carry their own client auth.
    ///
    /// # Errors
    /// If the identity cannot be parsed.
    pub fn with_identity_pem(self, pem: &[u8]) -> Result<Self, TlsError> {
        let inner = match self.inner {
            TlsInner::Pem {
                roots,
                built_in_roots,
                ..
            } => TlsInner::Pem {
                roots,
                identity: Some(Identity::from_pem(pem).map_err(TlsError::Identity)?),
                built_in_roots,
            },
            rustls @ TlsInner::Rustls(_) => rustls,
        };

        Ok(Self { inner })
    }

    /// Additionally trusts the web PKI roots bundled with the client.
    #[must_use]
    pub fn with_built_in_roots(self, enabled: bool) -> Self {
        let inner = match self.inner {
            TlsInner::Pem {
                roots, identity, ..
            } => TlsInner::Pem {
                roots,
                identity,
                built_in_roots: enabled,
            },
            rustls @ TlsInner::Rustls(_) => rustls,
        };

        Self { inner }
    }

    pub(crate) fn apply(&self, builder: ClientBuilder) -> ClientBuilder {
        match &self.inner {
            TlsInner::Rustls(config) => builder.use_preconfigured_tls(config.clone()),
            TlsInner::Pem {
                roots,
                identity,
                built_in_roots,
            } => {
                let mut builder = builder.tls_built_in_root_certs(*built_in_roots);
                for cert in roots {
                    builder = builder.add_root_certificate(cert.clone());
                }
                if let Some(identity) = identity {
                    builder = builder.identity(identity.clone());
                }
                builder
            }
        }
    }
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            TlsInner::Rustls(_) => f
                .debug_struct("TlsContext")
                .field("kind", &"rustls")
                .finish(),
            TlsInner::Pem {
                roots,
                identity,
                built_in_roots,
            } => f
                .debug_struct("TlsContext")
                .field("roots", &roots.len())
                .field("identity", &identity.is_some())
                .field("built_in_roots", built_in_roots)
                .finish(),
        }
    }
}
