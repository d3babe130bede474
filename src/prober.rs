//! HTTP liveness probe for bookmarked URLs.
//!
//! A probe is a single GET with a bounded timeout. Only the numeric status
//! line matters; the body is never read. Every failure to obtain a status
//! (malformed URL, DNS, connect, TLS, timeout) collapses into
//! [`FAILURE_STATUS`] instead of an error.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tokio::time::timeout;
use tracing::debug;

/// Status recorded when a probe did not yield a real HTTP status.
pub const FAILURE_STATUS: u16 = 0;

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Performs one liveness check of a URL.
///
/// Implementations must never fail: anything that is not an HTTP status is
/// reported as [`FAILURE_STATUS`]. Dropping the returned future must abort
/// the in-flight request, which is how run cancellation reaches the network.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> u16;
}

/// Installs the process-wide rustls crypto provider exactly once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Prober backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
    user_agent: String,
    timeout: Duration,
}

impl HttpProber {
    /// Builds a prober sending `user_agent` on every request.
    ///
    /// # Errors
    /// Returns the `reqwest` error if the HTTP client cannot be built.
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        install_rustls_provider();

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl std::fmt::Debug for HttpProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProber")
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> u16 {
        let request = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str());

        match timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                // Releases the connection without reading the body.
                drop(response);
                debug!(url, status, "probe completed");
                status
            }
            Ok(Err(e)) => {
                debug!(url, error = %e, "probe failed");
                FAILURE_STATUS
            }
            Err(_) => {
                debug!(
                    url,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "probe timed out"
                );
                FAILURE_STATUS
            }
        }
    }
}
