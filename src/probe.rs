//! Deployed-version querying.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Abstraction over the deployed-version query endpoint for testability.
#[async_trait]
pub trait VersionProbe: Send + Sync {
    /// Queries the currently deployed application version.
    ///
    /// Returns `Ok(None)` when the endpoint answers with anything other than
    /// a success body; per the protocol such responses are ignored rather
    /// than treated as failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the request itself fails or the body cannot be
    /// decoded.
    async fn deployed_version(&self) -> Result<Option<String>>;
}

/// HTTP implementation querying a configured URL for `{"version": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpVersionProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpVersionProbe {
    /// Creates a probe for `url` with a fresh HTTP client.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Creates a probe for `url` reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Returns the endpoint URL this probe queries.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl VersionProbe for HttpVersionProbe {
    async fn deployed_version(&self) -> Result<Option<String>> {
        let response = self.client.get(&self.url).send().await?;

        if response.status() != reqwest::StatusCode::OK {
            log::debug!(
                "version endpoint {} returned {}, ignoring",
                self.url,
                response.status()
            );
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        let body: VersionResponse = serde_json::from_slice(&bytes)?;
        Ok(Some(body.version))
    }
}
