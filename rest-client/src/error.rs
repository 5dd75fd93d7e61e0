use reqwest::{header::HeaderMap, StatusCode};

/// The ways a single request can fail.
///
/// Every variant is terminal for the request that produced it: nothing is
/// retried and nothing is replaced by a fallback value.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The server answered, but with a 4xx or 5xx status.
    #[error("HTTP error status = '{status}', body '{body}'")]
    Protocol {
        /// The 4xx or 5xx status.
        status: StatusCode,
        /// Response headers.
        headers: HeaderMap,
        /// Response body text, empty if there was none.
        body: String,
    },
    /// No complete HTTP exchange took place: connect, DNS, TLS, proxy,
    /// timeout or body read failures.
    #[error("{message}")]
    Transport {
        /// What went wrong, including the underlying causes.
        message: String,
        /// The reqwest error, if the failure came from the HTTP stack.
        #[source]
        source: Option<reqwest::Error>,
    },
}

impl Error {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a reqwest error, keeping its full source chain in the message.
    pub(crate) fn from_reqwest(context: &str, err: reqwest::Error) -> Self {
        let mut message = format!("{context}: {err}");
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self::Transport {
            message,
            source: Some(err),
        }
    }

    /// The response status, for protocol failures only.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }

    /// The raw response body, for protocol failures only.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Protocol { body, .. } => Some(body),
            Self::Transport { .. } => None,
        }
    }

    /// True for [`Error::Protocol`].
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// True for [`Error::Transport`].
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Failures while preparing a [`TlsContext`](crate::TlsContext).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TlsError {
    /// The CA bundle parsed but was empty.
    #[error("PEM bundle did not contain any certificate")]
    NoCertificates,
    /// A CA certificate could not be parsed.
    #[error("failed parsing x509 certificate from PEM bytes")]
    Certificate(#[source] reqwest::Error),
    /// The client certificate or key could not be parsed.
    #[error("failed parsing client identity from PEM bytes")]
    Identity(#[source] reqwest::Error),
}
