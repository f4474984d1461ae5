//! Thin HTTP transport wrapper
//!
//! A single-attempt client: all retry policy belongs to the API
//! client, where it is a visible, testable control path. Redirect
//! following is disabled because the login protocol inspects 3xx
//! statuses directly and a redirect back to the login page is an
//! auth-failure signal, not something to follow.

use std::time::Duration;

use envoyweb_domain::{EnvoyWebError, Result};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

/// HTTP client with a fixed per-request deadline and redirects off.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder.
    ///
    /// Transport outcomes are mapped into the error taxonomy: a
    /// deadline overrun becomes [`EnvoyWebError::Timeout`], any other
    /// transport failure becomes [`EnvoyWebError::Network`]. Non-2xx
    /// statuses are returned as-is; classification is the caller's
    /// concern.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder
            .build()
            .map_err(|err| EnvoyWebError::Network(format!("failed to build request: {err}")))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                debug!(%method, %url, %status, "received HTTP response");
                Ok(response)
            }
            Err(err) if err.is_timeout() => {
                debug!(%method, %url, "HTTP request timed out");
                Err(EnvoyWebError::Timeout(self.timeout))
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(EnvoyWebError::Network(err.to_string()))
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(envoyweb_domain::constants::DEFAULT_TIMEOUT_SECS),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        // No cookie store: cookie handling is explicit, the session
        // layer owns the jar and renders the Cookie header itself.
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|err| EnvoyWebError::Network(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client, timeout: self.timeout })
    }
}
