use std::fmt;

use reqwest::Client;
use viewfinder_model::ResourceUrl;

use crate::config::LoaderConfig;
use crate::error::ProbeError;

/// Caller-supplied transfer priority, forwarded to the transport as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPriority {
    /// Above-the-fold placement.
    High,
    /// Speculative prefetch.
    Low,
    #[default]
    Auto,
}

/// Fetches a resource so the platform cache holds its bytes.
///
/// A successful probe means a subsequent render of the same URL resolves
/// locally. No automatic retries: a fresh mount is the retry mechanism.
#[async_trait::async_trait]
pub trait ImageProber: Send + Sync {
    /// Fetch `url` to completion, discarding the body.
    async fn probe(
        &self,
        url: &ResourceUrl,
        priority: FetchPriority,
    ) -> Result<(), ProbeError>;
}

impl fmt::Debug for dyn ImageProber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ImageProber")
    }
}

/// HTTP prober with connection pooling and the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    /// Build a prober from the loader configuration.
    pub fn new(config: &LoaderConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(config.probe_timeout())
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

// RFC 9218 urgency values for the extensible priority header.
fn priority_header_value(priority: FetchPriority) -> Option<&'static str> {
    match priority {
        FetchPriority::High => Some("u=1"),
        FetchPriority::Low => Some("u=6"),
        FetchPriority::Auto => None,
    }
}

#[async_trait::async_trait]
impl ImageProber for HttpProber {
    async fn probe(
        &self,
        url: &ResourceUrl,
        priority: FetchPriority,
    ) -> Result<(), ProbeError> {
        let mut request = self.client.get(url.as_str());
        if let Some(value) = priority_header_value(priority) {
            request = request.header("priority", value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout
            } else {
                ProbeError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
                url: url.as_str().to_owned(),
            });
        }

        // Drain the body so the transfer completes and the bytes land in
        // the platform cache.
        response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout
            } else {
                ProbeError::Network(e.to_string())
            }
        })?;

        Ok(())
    }
}
