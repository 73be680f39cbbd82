//! HTTP client for the cookie-session automation with rate limiting
//!
//! Provides the single shared client the whole run goes through. Cookies are
//! kept in the client's jar so the sign-in session carries over to the
//! ownership-query requests.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT},
    Client, Response,
};

/// HTTP client configuration
#[derive(Debug, Clone, serde::Serialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let defaults = crate::infrastructure::config::AdvancedConfig::default();
        Self {
            user_agent: defaults.user_agent,
            timeout_seconds: defaults.request_timeout_seconds,
            max_requests_per_second: defaults.max_requests_per_second,
        }
    }
}

/// Rate-limited HTTP client with a persistent cookie jar
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    /// Fetch a URL with rate limiting, following redirects.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "HTTP request failed with status {}: {}",
                response.status(),
                url
            );
        }

        Ok(response)
    }

    /// Fetch URL and return text content together with the final URL after
    /// redirects.
    pub async fn get_text(&self, url: &str) -> Result<(String, String)> {
        let response = self.get(url).await?;
        let final_url = response.url().to_string();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;

        Ok((text, final_url))
    }

    /// Fetch URL and return the raw body bytes.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;
        Ok(bytes.to_vec())
    }

    /// POST a form-encoded body and return text content with the final URL.
    /// A JSON-leaning Accept header matches what the site's own frontend
    /// sends to its query endpoints.
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<(String, String)> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .form(fields)
            .send()
            .await
            .with_context(|| format!("Failed to post to URL: {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "HTTP request failed with status {}: {}",
                response.status(),
                url
            );
        }

        let final_url = response.url().to_string();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;

        Ok((text, final_url))
    }

    /// Get the configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}
