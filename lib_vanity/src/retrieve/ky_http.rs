//! # HTTP Retrieval Utilities
//!
//! Two layers over `reqwest`:
//!
//! - `ApiClient`: a `reqwest_middleware` client bound to a base URL and an
//!   authorization header, with an optional exponential-backoff retry policy for
//!   transient failures. Used for authenticated, direct-egress calls.
//! - `Transport`: plain `reqwest` clients keyed by egress proxy, built lazily and
//!   reused, all sharing one request timeout. Used for calls routed through the
//!   proxy pool.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::{header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE}, Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ConfigError, RemoteError};
use crate::retrieve::proxy_pool::ProxyDescriptor;

/// User agent sent on every request.
pub const USER_AGENT: &str = "VanityMonitor/1.0";

/// A standardized container for API responses.
///
/// This struct wraps the deserialized data along with metadata about the
/// HTTP transaction, such as status codes and headers.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// Joins `path` onto `base`, tolerating a base without a trailing slash.
pub fn join_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    if base.path().ends_with('/') {
        base.join(path.trim_start_matches('/'))
    } else {
        let mut with_slash = base.clone();
        with_slash.set_path(&format!("{}/", base.path()));
        with_slash.join(path.trim_start_matches('/'))
    }
}

/// Parses an absolute base URL.
pub fn parse_base_url(base_url: &str) -> Result<Url, ConfigError> {
    Url::parse(base_url).map_err(|e| ConfigError::InvalidEndpoint(format!("{base_url}: {e}")))
}

/// Authenticated middleware client bound to a base URL.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// Full `Authorization` header value (e.g. `Bot <token>`), if any.
    authorization: Option<String>,
}

impl ApiClient {
    /// Creates a client. `max_retries == 0` disables the retry middleware.
    ///
    /// # Errors
    /// Fails if `base_url` is not an absolute URL or the client cannot be built.
    pub fn new(
        base_url: &str,
        authorization: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ConfigError> {
        let url = parse_base_url(base_url)?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()
            .map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))?;

        let mut builder = ClientBuilder::new(http);
        if max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self { inner: builder.build(), base_url: url, authorization })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs a request and captures the outcome without treating non-2xx as an error.
    ///
    /// # Errors
    /// Returns a `RemoteError` if URL joining, sending, or decoding a 2xx body fails.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: Option<HeaderMap>,
    ) -> Result<ApiResponse<T>, RemoteError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let full_url = join_url(&self.base_url, path)?;
        let mut req = self.inner.request(method, full_url);

        if let Some(h) = headers {
            req = req.headers(h);
        }

        if let Some(value) = &self.authorization {
            req = req.header(AUTHORIZATION, value);
        }

        if let Some(b) = body {
            let json_body = serde_json::to_string(b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        let response = req.send().await?;
        let status = response.status();
        let resp_headers = response.headers().clone();

        if status.is_success() {
            // Some endpoints answer 204 or an empty 200.
            let bytes = response.bytes().await?;
            let data = if bytes.is_empty() { None } else { Some(serde_json::from_slice::<T>(&bytes)?) };
            Ok(ApiResponse { data, error_body: None, status: status.as_u16(), success: true, headers: resp_headers })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }
}

/// Plain clients keyed by egress proxy.
pub struct Transport {
    timeout: Duration,
    direct: reqwest::Client,
    proxied: Mutex<HashMap<ProxyDescriptor, reqwest::Client>>,
}

impl Transport {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let direct = Self::builder(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))?;
        Ok(Self { timeout, direct, proxied: Mutex::new(HashMap::new()) })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Egress is decided by the proxy pool only, never by `HTTP(S)_PROXY`.
    fn builder(timeout: Duration) -> reqwest::ClientBuilder {
        reqwest::Client::builder().timeout(timeout).user_agent(USER_AGENT).no_proxy()
    }

    /// Client routed through `proxy`, or the direct client for `None`.
    ///
    /// # Errors
    /// Fails if a proxied client cannot be built for this descriptor.
    pub fn client_for(&self, proxy: Option<&ProxyDescriptor>) -> Result<reqwest::Client, RemoteError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut cache = self.proxied.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = cache.get(proxy) {
            return Ok(client.clone());
        }

        let route = reqwest::Proxy::all(proxy.endpoint())?.basic_auth(&proxy.username, &proxy.password);
        let client = Self::builder(self.timeout).proxy(route).build()?;
        cache.insert(proxy.clone(), client.clone());
        log::debug!("Built HTTP client for proxy {}", proxy);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_both_slash_styles() {
        let with = Url::parse("https://example.com/api/v10/").unwrap();
        let without = Url::parse("https://example.com/api/v10").unwrap();
        for base in [&with, &without] {
            assert_eq!(
                join_url(base, "/invites/abc").unwrap().as_str(),
                "https://example.com/api/v10/invites/abc"
            );
            assert_eq!(
                join_url(base, "guilds/1/vanity-url").unwrap().as_str(),
                "https://example.com/api/v10/guilds/1/vanity-url"
            );
        }
    }

    #[test]
    fn relative_base_url_is_rejected() {
        assert!(ApiClient::new("not a url", None, Duration::from_secs(5), 0).is_err());
    }

    #[test]
    fn proxied_clients_are_cached_per_descriptor() {
        let transport = Transport::new(Duration::from_secs(5)).unwrap();
        let proxy = ProxyDescriptor::parse("127.0.0.1:3128:u:p", 0).unwrap();

        transport.client_for(Some(&proxy)).unwrap();
        transport.client_for(Some(&proxy)).unwrap();
        transport.client_for(None).unwrap();

        assert_eq!(transport.proxied.lock().unwrap().len(), 1);
    }
}
