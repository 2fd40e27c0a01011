//! # Claim Client
//!
//! Claims a vanity code for a target scope (`PATCH guilds/{id}/vanity-url` with
//! `{"code": ...}`).
//!
//! ## Flow
//! 1. **Preconditions**: the scope directory is asked, at call time, whether the
//!    runtime still administers the target scope with the manage capability. If
//!    not, the claim fails with `Precondition` and no claim request is sent.
//! 2. **Primary**: the authenticated `ApiClient` (direct egress, no retries).
//! 3. **Fallback**: on any primary failure, one raw request with an explicit
//!    authorization header through a freshly drawn proxy. Its failures are
//!    classified (`rate_limited`, `bad_request`, `forbidden`, `generic`).
//!
//! The client never retries beyond that single fallback. Every failure kind is
//! logged with its tag; callers only see `Failed`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, RemoteError};
use crate::remote::scopes::{ScopeAccess, ScopeDirectory};
use crate::retrieve::ky_http::{join_url, ApiClient, Transport};
use crate::retrieve::proxy_pool::ProxyPool;

/// Why a claim was not attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionFailure {
    /// The runtime is no longer a member of the target scope.
    NotAdministered,
    /// Still a member, but without the manage capability.
    InsufficientPrivilege,
    /// The privilege lookup itself failed.
    Unverifiable(String),
}

/// Classified claim failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimFailure {
    Precondition(PreconditionFailure),
    /// HTTP 429. `retry_after_ms` is the server's hint, when given.
    RateLimited { retry_after_ms: Option<u64> },
    /// HTTP 400: the code can no longer be claimed by this scope (taken again,
    /// or the scope lacks the required tier).
    BadRequest(String),
    /// HTTP 403: privilege revoked between the check and the call.
    Forbidden(String),
    /// Transport errors and any other status.
    Generic(String),
}

impl ClaimFailure {
    /// Stable tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "precondition",
            Self::RateLimited { .. } => "rate_limited",
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::Generic(_) => "generic",
        }
    }
}

impl fmt::Display for ClaimFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition(PreconditionFailure::NotAdministered) => write!(f, "not a member of the target scope"),
            Self::Precondition(PreconditionFailure::InsufficientPrivilege) => write!(f, "missing manage permission"),
            Self::Precondition(PreconditionFailure::Unverifiable(e)) => write!(f, "privilege lookup failed: {e}"),
            Self::RateLimited { retry_after_ms: Some(ms) } => write!(f, "rate limited, retry after {ms}ms"),
            Self::RateLimited { retry_after_ms: None } => write!(f, "rate limited"),
            Self::BadRequest(body) => write!(f, "bad request: {body}"),
            Self::Forbidden(body) => write!(f, "forbidden: {body}"),
            Self::Generic(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    Failed(ClaimFailure),
}

/// Claim seam used by the scheduler.
///
/// `Err` is reserved for failures that could not be classified at all; the
/// scheduler then keeps the entry for the next tick.
pub trait Claimer {
    fn claim(
        &self,
        resource_name: &str,
        target_scope_id: &str,
    ) -> impl Future<Output = Result<ClaimOutcome, RemoteError>> + Send;
}

#[derive(Serialize)]
struct ClaimBody<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
}

fn vanity_path(target_scope_id: &str) -> String {
    format!("guilds/{target_scope_id}/vanity-url")
}

/// Classifies a fallback response.
pub fn classify_failure(status: StatusCode, retry_after_header: Option<&str>, body: &str) -> ClaimFailure {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let from_body = serde_json::from_str::<RateLimitBody>(body).ok().and_then(|b| b.retry_after);
            let from_header = retry_after_header.and_then(|h| h.trim().parse::<f64>().ok());
            let retry_after_ms = from_body.or(from_header).map(|secs| (secs * 1000.0).round() as u64);
            ClaimFailure::RateLimited { retry_after_ms }
        }
        StatusCode::BAD_REQUEST => ClaimFailure::BadRequest(body.to_string()),
        StatusCode::FORBIDDEN => ClaimFailure::Forbidden(body.to_string()),
        other => ClaimFailure::Generic(format!("unexpected status {other}: {body}")),
    }
}

/// HTTP implementation of `Claimer`.
pub struct HttpClaimClient<D> {
    primary: ApiClient,
    base_url: Url,
    authorization: String,
    transport: Arc<Transport>,
    proxies: Arc<ProxyPool>,
    scopes: D,
}

impl<D: ScopeDirectory + Sync> HttpClaimClient<D> {
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        transport: Arc<Transport>,
        proxies: Arc<ProxyPool>,
        scopes: D,
    ) -> Result<Self, ConfigError> {
        let authorization = format!("Bot {token}");
        let primary = ApiClient::new(base_url, Some(authorization.clone()), timeout, 0)?;
        let base_url = primary.base_url().clone();
        Ok(Self { primary, base_url, authorization, transport, proxies, scopes })
    }

    async fn check_preconditions(&self, target_scope_id: &str) -> Result<String, PreconditionFailure> {
        match self.scopes.access(target_scope_id).await {
            Ok(ScopeAccess::Manageable { label }) => Ok(label),
            Ok(ScopeAccess::Insufficient { .. }) => Err(PreconditionFailure::InsufficientPrivilege),
            Ok(ScopeAccess::NotAdministered) => Err(PreconditionFailure::NotAdministered),
            Err(e) => Err(PreconditionFailure::Unverifiable(e.to_string())),
        }
    }

    async fn primary(&self, resource_name: &str, target_scope_id: &str) -> Result<(), String> {
        let body = ClaimBody { code: resource_name };
        match self
            .primary
            .request::<Value, _>(Method::PATCH, &vanity_path(target_scope_id), Some(&body), None)
            .await
        {
            Ok(resp) if resp.success => Ok(()),
            Ok(resp) => Err(format!("status {}: {}", resp.status, resp.error_body.unwrap_or_default())),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn fallback(&self, resource_name: &str, target_scope_id: &str) -> ClaimOutcome {
        let proxy = self.proxies.next();
        let client = match self.transport.client_for(proxy.as_ref()) {
            Ok(client) => client,
            Err(e) => return ClaimOutcome::Failed(ClaimFailure::Generic(format!("proxy client: {e}"))),
        };
        let url = match join_url(&self.base_url, &vanity_path(target_scope_id)) {
            Ok(url) => url,
            Err(e) => return ClaimOutcome::Failed(ClaimFailure::Generic(e.to_string())),
        };

        let response = client
            .patch(url)
            .header(AUTHORIZATION, &self.authorization)
            .json(&ClaimBody { code: resource_name })
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let via = proxy.map(|p| p.to_string()).unwrap_or_else(|| "direct".to_string());
                return ClaimOutcome::Failed(ClaimFailure::Generic(format!("transport via {via}: {e}")));
            }
        };

        let status = response.status();
        if status.is_success() {
            return ClaimOutcome::Claimed;
        }
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        ClaimOutcome::Failed(classify_failure(status, retry_after.as_deref(), &body))
    }
}

impl<D: ScopeDirectory + Sync> Claimer for HttpClaimClient<D> {
    async fn claim(&self, resource_name: &str, target_scope_id: &str) -> Result<ClaimOutcome, RemoteError> {
        let label = match self.check_preconditions(target_scope_id).await {
            Ok(label) => label,
            Err(reason) => {
                let failure = ClaimFailure::Precondition(reason);
                log::warn!(
                    "Claim of '{}' for {} skipped [{}]: {}",
                    resource_name, target_scope_id, failure.kind(), failure
                );
                return Ok(ClaimOutcome::Failed(failure));
            }
        };

        match self.primary(resource_name, target_scope_id).await {
            Ok(()) => {
                log::info!("Claimed vanity '{}' for {} ({})", resource_name, label, target_scope_id);
                return Ok(ClaimOutcome::Claimed);
            }
            Err(reason) => {
                log::warn!("Primary claim of '{}' for {} failed: {}. Falling back.", resource_name, label, reason);
            }
        }

        let outcome = self.fallback(resource_name, target_scope_id).await;
        match &outcome {
            ClaimOutcome::Claimed => {
                log::info!("Claimed vanity '{}' for {} ({}) via fallback", resource_name, label, target_scope_id);
            }
            ClaimOutcome::Failed(failure) => {
                log::error!(
                    "Claim of '{}' for {} failed [{}]: {}",
                    resource_name, label, failure.kind(), failure
                );
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fallback_statuses() {
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, None, r#"{"message":"You are being rate limited.","retry_after":1.25}"#),
            ClaimFailure::RateLimited { retry_after_ms: Some(1250) }
        );
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, Some("3"), "not json"),
            ClaimFailure::RateLimited { retry_after_ms: Some(3000) }
        );
        assert_eq!(classify_failure(StatusCode::BAD_REQUEST, None, "tier").kind(), "bad_request");
        assert_eq!(classify_failure(StatusCode::FORBIDDEN, None, "").kind(), "forbidden");
        assert_eq!(classify_failure(StatusCode::BAD_GATEWAY, None, "").kind(), "generic");
    }

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            ClaimFailure::Precondition(PreconditionFailure::NotAdministered).kind(),
            ClaimFailure::RateLimited { retry_after_ms: None }.kind(),
            ClaimFailure::BadRequest(String::new()).kind(),
            ClaimFailure::Forbidden(String::new()).kind(),
            ClaimFailure::Generic(String::new()).kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
