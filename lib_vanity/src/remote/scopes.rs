//! # Scope Directory
//!
//! Answers "does this runtime administer scope X, and may it manage it?".
//! Asked when an auto-claim is created and again right before every claim.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;

use crate::error::{ConfigError, RemoteError};
use crate::retrieve::ky_http::ApiClient;

/// MANAGE_GUILD permission bit.
pub const MANAGE_SCOPE: u64 = 1 << 5;
/// ADMINISTRATOR permission bit; implies every other permission.
pub const ADMINISTRATOR: u64 = 1 << 3;
/// Largest page `users/@me/guilds` returns.
pub const PAGE_LIMIT: usize = 200;

/// What the runtime may do in a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeAccess {
    /// The runtime is not a member of the scope.
    NotAdministered,
    /// Member, but without the manage capability.
    Insufficient { label: String },
    /// Member with the manage capability.
    Manageable { label: String },
}

impl ScopeAccess {
    /// Builds the access level from a membership's permission bitfield.
    pub fn from_permissions(label: String, permissions: u64, owner: bool) -> Self {
        if owner || permissions & (MANAGE_SCOPE | ADMINISTRATOR) != 0 {
            Self::Manageable { label }
        } else {
            Self::Insufficient { label }
        }
    }
}

/// Privilege lookup seam.
pub trait ScopeDirectory {
    fn access(&self, scope_id: &str) -> impl Future<Output = Result<ScopeAccess, RemoteError>> + Send;
}

/// Lets one directory serve both the claim client and the request handler.
impl<T: ScopeDirectory + Send + Sync> ScopeDirectory for Arc<T> {
    fn access(&self, scope_id: &str) -> impl Future<Output = Result<ScopeAccess, RemoteError>> + Send {
        T::access(self, scope_id)
    }
}

#[derive(Debug, Deserialize)]
struct PartialScope {
    id: String,
    name: String,
    #[serde(default)]
    owner: bool,
    /// Serialized as a decimal string.
    #[serde(default)]
    permissions: Option<String>,
}

/// Lists the runtime's scopes via `GET users/@me/guilds`, page by page.
pub struct RestScopeDirectory {
    api: ApiClient,
}

impl RestScopeDirectory {
    /// Read-only lookups may retry transient failures.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let api = ApiClient::new(base_url, Some(format!("Bot {token}")), timeout, 2)?;
        Ok(Self { api })
    }

    /// One page of memberships with ids greater than `after`.
    async fn page(&self, after: Option<&str>) -> Result<Vec<PartialScope>, RemoteError> {
        let path = match after {
            Some(after) => format!("users/@me/guilds?limit={PAGE_LIMIT}&after={after}"),
            None => format!("users/@me/guilds?limit={PAGE_LIMIT}"),
        };
        let response = self.api.request::<Vec<PartialScope>, ()>(Method::GET, &path, None, None).await?;

        if !response.success {
            return Err(RemoteError::UnexpectedResponse {
                status: response.status,
                body: response.error_body.unwrap_or_default(),
            });
        }
        Ok(response.data.unwrap_or_default())
    }
}

impl ScopeDirectory for RestScopeDirectory {
    /// Walks the membership pages until the scope turns up or a short page ends the list.
    async fn access(&self, scope_id: &str) -> Result<ScopeAccess, RemoteError> {
        let mut after: Option<String> = None;
        loop {
            let page = self.page(after.as_deref()).await?;
            let full = page.len() >= PAGE_LIMIT;
            let last = page.last().map(|s| s.id.clone());

            if let Some(scope) = page.into_iter().find(|s| s.id == scope_id) {
                let bits = scope.permissions.as_deref().and_then(|p| p.parse::<u64>().ok()).unwrap_or(0);
                return Ok(ScopeAccess::from_permissions(scope.name, bits, scope.owner));
            }

            match last {
                // A cursor that does not move would loop forever.
                Some(last) if full && after.as_deref() != Some(last.as_str()) => after = Some(last),
                _ => return Ok(ScopeAccess::NotAdministered),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manage_or_admin_or_owner_is_manageable() {
        let label = || "S".to_string();
        assert!(matches!(ScopeAccess::from_permissions(label(), MANAGE_SCOPE, false), ScopeAccess::Manageable { .. }));
        assert!(matches!(ScopeAccess::from_permissions(label(), ADMINISTRATOR, false), ScopeAccess::Manageable { .. }));
        assert!(matches!(ScopeAccess::from_permissions(label(), 0, true), ScopeAccess::Manageable { .. }));
        assert_eq!(
            ScopeAccess::from_permissions(label(), 1 << 11, false),
            ScopeAccess::Insufficient { label: label() }
        );
    }
}
