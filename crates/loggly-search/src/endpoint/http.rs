//! HTTP client for the Loggly search API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{EventsPage, SearchEndpoint, SessionHandle};
use crate::error::{Error, Result};

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("loggly-cli/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`LogglyClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Loggly account (subdomain).
    pub account: String,
    /// API token sent as a bearer token.
    pub token: String,
    /// Overrides `https://{account}.loggly.com/apiv2`.
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent header value.
    pub user_agent: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("account", &self.account)
            .field("token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a configuration for `account` authenticated with `token`.
    #[must_use]
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            token: token.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Points the client at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the API root all request paths are appended to.
    #[must_use]
    pub fn api_root(&self) -> String {
        self.base_url.as_ref().map_or_else(
            || format!("https://{}.loggly.com/apiv2", self.account),
            |url| url.trim_end_matches('/').to_string(),
        )
    }

    /// Validates required settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the account or token is empty.
    pub fn validate(&self) -> Result<()> {
        if self.account.trim().is_empty() {
            return Err(Error::configuration("account is required"));
        }
        if self.token.trim().is_empty() {
            return Err(Error::configuration("token is required"));
        }
        Ok(())
    }
}

/// Loggly search API client.
#[derive(Debug, Clone)]
pub struct LogglyClient {
    client: reqwest::Client,
    api_root: String,
    token: String,
}

impl LogglyClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::transport("failed to create HTTP client", e))?;

        Ok(Self {
            client,
            api_root: config.api_root(),
            token: config.token.clone(),
        })
    }

    /// Returns the API root requests are sent to.
    #[must_use]
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path_and_query: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let url = format!("{}{path_and_query}", self.api_root);
        let request = async {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| Error::transport("failed to send request", e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = if body.is_empty() {
                    status.canonical_reason().unwrap_or("unknown status").to_string()
                } else {
                    body
                };
                return Err(Error::Remote {
                    status: status.as_u16(),
                    message,
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::transport("failed to read response body", e))?;
            serde_json::from_slice(&bytes)
                .map_err(|e| Error::invalid_response(format!("malformed JSON body: {e}")))
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = request => result,
        }
    }
}

#[async_trait]
impl SearchEndpoint for LogglyClient {
    async fn create_search(
        &self,
        query_string: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionHandle> {
        let body: Value = self.get_json(&format!("/search?{query_string}"), cancel).await?;

        body.pointer("/rsid/id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(SessionHandle::new)
            .ok_or_else(|| Error::invalid_response("search response is missing rsid.id"))
    }

    async fn fetch_events_page(
        &self,
        session: &SessionHandle,
        page: u64,
        cancel: &CancellationToken,
    ) -> Result<EventsPage> {
        let page_str = page.to_string();
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("page", &page_str)
            .append_pair("rsid", session.as_str())
            .finish();

        self.get_json(&format!("/events?{query}"), cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_api_root() {
        let config = ClientConfig::new("acme", "secret");
        assert_eq!(config.api_root(), "https://acme.loggly.com/apiv2");
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let config = ClientConfig::new("acme", "secret").with_base_url("http://127.0.0.1:9000/apiv2/");
        assert_eq!(config.api_root(), "http://127.0.0.1:9000/apiv2");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ClientConfig::new("acme", "super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_requires_credentials() {
        assert!(ClientConfig::new("", "t").validate().is_err());
        assert!(ClientConfig::new("a", " ").validate().is_err());
        assert!(LogglyClient::new(&ClientConfig::new("a", "")).is_err());
        assert!(ClientConfig::new("a", "t").validate().is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits_request() {
        let client =
            LogglyClient::new(&ClientConfig::new("acme", "t").with_base_url("http://127.0.0.1:9"))
                .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.create_search("q=x", &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
