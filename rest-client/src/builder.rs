use reqwest::{redirect, Client, Proxy};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::Error;

const APP_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Assembles the underlying [`Client`] for `config`.
///
/// Redirects are not followed: a 3xx is handed back to the caller as is.
pub(crate) fn build_http_client(config: &ClientConfig) -> Result<Client, Error> {
    let timeouts = config.timeouts();
    let mut builder = Client::builder()
        .connect_timeout(timeouts.connect)
        .read_timeout(timeouts.read)
        .redirect(redirect::Policy::none())
        .user_agent(APP_USER_AGENT);

    #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
    {
        builder = builder.tcp_user_timeout(timeouts.write);
    }

    if let Some(tls) = config.tls() {
        builder = tls.apply(builder);
    }

    builder = match config.proxy().filter(|p| p.is_configured()) {
        Some(proxy) => {
            let proxy = Proxy::all(proxy.url())
                .map_err(|e| Error::from_reqwest("invalid HTTP proxy", e))?;
            builder.proxy(proxy)
        }
        // Never pick up proxies from the environment behind the caller's back.
        None => builder.no_proxy(),
    };

    let client = builder
        .build()
        .map_err(|e| Error::from_reqwest("failed initializing HTTP client", e))?;
    debug!(
        base_url = config.base_url(),
        tls = config.tls().is_some(),
        proxy = ?config.proxy().filter(|p| p.is_configured()),
        "built HTTP client"
    );

    Ok(client)
}
