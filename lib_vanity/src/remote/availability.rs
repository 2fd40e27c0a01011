//! # Remote Availability Client
//!
//! Single read-only existence check against the invite endpoint
//! (`GET invites/{code}`), optionally through an egress proxy.
//!
//! Only an explicit not-found answer (HTTP 404, or the `Unknown Invite` error
//! code in the payload) counts as `NotFound`. Everything else, including
//! timeouts, proxy failures, rate limiting and server errors, reads as `Exists`:
//! a missed window is worse than a wasted claim attempt.

use std::future::Future;
use std::sync::Arc;

use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::{ConfigError, RemoteError};
use crate::retrieve::ky_http::{join_url, parse_base_url, Transport};
use crate::retrieve::proxy_pool::ProxyDescriptor;

/// JSON error code the remote API uses for an unknown invite.
pub const UNKNOWN_INVITE_CODE: u64 = 10006;

/// Outcome of an existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The name is held by someone (or the answer was ambiguous).
    Exists,
    /// The remote explicitly reported the name as unknown.
    NotFound,
}

/// Existence-check seam used by the scheduler and the request handlers.
///
/// `Err` means the check could not even be attempted; callers skip the entry
/// and retry on the next tick.
pub trait AvailabilityCheck {
    fn exists(
        &self,
        resource_name: &str,
        proxy: Option<&ProxyDescriptor>,
    ) -> impl Future<Output = Result<Availability, RemoteError>> + Send;
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: Option<u64>,
}

/// Classifies a finished HTTP exchange.
pub fn classify(status: StatusCode, body: &str) -> Availability {
    if status == StatusCode::NOT_FOUND {
        return Availability::NotFound;
    }
    if !status.is_success() {
        if let Ok(ErrorPayload { code: Some(UNKNOWN_INVITE_CODE) }) = serde_json::from_str(body) {
            return Availability::NotFound;
        }
    }
    Availability::Exists
}

/// HTTP implementation of `AvailabilityCheck`.
pub struct HttpAvailabilityClient {
    base_url: Url,
    transport: Arc<Transport>,
}

impl HttpAvailabilityClient {
    pub fn new(base_url: &str, transport: Arc<Transport>) -> Result<Self, ConfigError> {
        Ok(Self { base_url: parse_base_url(base_url)?, transport })
    }
}

impl AvailabilityCheck for HttpAvailabilityClient {
    async fn exists(&self, resource_name: &str, proxy: Option<&ProxyDescriptor>) -> Result<Availability, RemoteError> {
        let url = join_url(&self.base_url, &format!("invites/{resource_name}"))?;

        let client = match self.transport.client_for(proxy) {
            Ok(client) => client,
            Err(e) => {
                log::warn!("Proxy client unavailable for '{}': {}. Treating as taken.", resource_name, e);
                return Ok(Availability::Exists);
            }
        };

        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Existence check for '{}' failed in transport: {}. Treating as taken.", resource_name, e);
                return Ok(Availability::Exists);
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let availability = classify(status, &body);

        if status != StatusCode::NOT_FOUND && !status.is_success() {
            log::debug!("Existence check for '{}' returned {}: {:?}", resource_name, status, availability);
        }
        Ok(availability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status_is_not_found() {
        assert_eq!(classify(StatusCode::NOT_FOUND, ""), Availability::NotFound);
    }

    #[test]
    fn unknown_invite_payload_is_not_found() {
        let body = r#"{"message": "Unknown Invite", "code": 10006}"#;
        assert_eq!(classify(StatusCode::BAD_REQUEST, body), Availability::NotFound);
    }

    #[test]
    fn everything_else_biases_to_exists() {
        assert_eq!(classify(StatusCode::OK, r#"{"code":"coolname"}"#), Availability::Exists);
        assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS, r#"{"retry_after": 1.5}"#), Availability::Exists);
        assert_eq!(classify(StatusCode::INTERNAL_SERVER_ERROR, "oops"), Availability::Exists);
        assert_eq!(classify(StatusCode::FORBIDDEN, r#"{"code": 50013}"#), Availability::Exists);
    }
}
