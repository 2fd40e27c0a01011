//! # Watch Requests
//!
//! The core side of add/remove/list requests coming from a command frontend.
//!
//! An entry is only created for a name that is currently taken: a name that is
//! already free has nothing to monitor. A composite key belongs to at most one
//! requester per registry, and only that requester may remove it.
//!
//! Every accepted mutation is persisted before returning. If persisting fails
//! the in-memory change is reverted and the request is rejected.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::core::entry::{
    composite_key, is_valid_target_scope_id, normalize_name, valid_name, AutoClaimEntry, RegistryEntry, WatchEntry,
};
use crate::core::registry::Registry;
use crate::remote::availability::{Availability, AvailabilityCheck};
use crate::remote::scopes::{ScopeAccess, ScopeDirectory};
use crate::retrieve::proxy_pool::ProxyPool;

/// Who is asking, from where, and where to report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub scope_id: String,
    pub requester_id: String,
    pub notify_target_id: String,
}

/// Why a request was turned down. The `Display` text is meant for the requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestRejection {
    #[error("Please provide a valid vanity URL (letters, numbers, and hyphens only).")]
    InvalidName,

    #[error("Please provide a valid guild ID (17-19 digits).")]
    InvalidTargetScope,

    #[error("I'm not in the server with ID: **{0}**. Please make sure the bot is added to that server.")]
    TargetNotAdministered(String),

    #[error("I don't have **Manage Server** permissions in **{0}**. Please grant me the necessary permissions.")]
    TargetInsufficient(String),

    #[error("Could not verify permissions in **{0}** right now. Please try again later.")]
    TargetUnverifiable(String),

    #[error("You are already monitoring the vanity: **{0}**")]
    AlreadyWatching(String),

    #[error("Someone else is already monitoring the vanity: **{0}**")]
    HeldByOther(String),

    #[error("The vanity **{0}** is currently available! You can claim it now.")]
    AlreadyAvailable(String),

    #[error("Could not check the vanity **{0}** right now. Please try again later.")]
    CheckFailed(String),

    #[error("You are not monitoring the vanity: **{0}**")]
    NotWatching(String),

    #[error("Could not save your change, please try again.")]
    Persist,
}

/// Handles add/remove/list requests against the two registries.
pub struct RequestHandler<A, S> {
    availability: Arc<A>,
    scopes: Arc<S>,
    proxies: Arc<ProxyPool>,
}

impl<A, S> RequestHandler<A, S>
where
    A: AvailabilityCheck,
    S: ScopeDirectory,
{
    pub fn new(availability: Arc<A>, scopes: Arc<S>, proxies: Arc<ProxyPool>) -> Self {
        Self { availability, scopes, proxies }
    }

    /// Rejects names that are free right now.
    async fn ensure_taken(&self, name: &str) -> Result<(), RequestRejection> {
        let proxy = self.proxies.next();
        match self.availability.exists(name, proxy.as_ref()).await {
            Ok(Availability::Exists) => Ok(()),
            Ok(Availability::NotFound) => Err(RequestRejection::AlreadyAvailable(name.to_string())),
            Err(e) => {
                log::warn!("Availability check for '{}' failed during add: {}", name, e);
                Err(RequestRejection::CheckFailed(name.to_string()))
            }
        }
    }

    /// Starts watching `raw_name` for `ctx.requester_id`.
    pub async fn add_watch(
        &self,
        watches: &mut Registry<WatchEntry>,
        ctx: &RequestContext,
        raw_name: &str,
    ) -> Result<WatchEntry, RequestRejection> {
        let name = valid_name(raw_name).ok_or(RequestRejection::InvalidName)?;
        let key = composite_key(&ctx.scope_id, &name);
        check_vacant(watches, &key, &name, &ctx.requester_id)?;

        self.ensure_taken(&name).await?;

        let entry = WatchEntry::new(&ctx.scope_id, &name, &ctx.requester_id, &ctx.notify_target_id);
        insert_and_persist(watches, key, entry.clone())?;
        log::info!("{} now watching '{}' in scope {}", ctx.requester_id, name, ctx.scope_id);
        Ok(entry)
    }

    /// Starts watching `raw_name` and claiming it for `target_scope_id` once free.
    pub async fn add_autoclaim(
        &self,
        autoclaims: &mut Registry<AutoClaimEntry>,
        ctx: &RequestContext,
        raw_name: &str,
        target_scope_id: &str,
    ) -> Result<AutoClaimEntry, RequestRejection> {
        let name = valid_name(raw_name).ok_or(RequestRejection::InvalidName)?;
        if !is_valid_target_scope_id(target_scope_id) {
            return Err(RequestRejection::InvalidTargetScope);
        }

        let label = match self.scopes.access(target_scope_id).await {
            Ok(ScopeAccess::Manageable { label }) => label,
            Ok(ScopeAccess::Insufficient { label }) => return Err(RequestRejection::TargetInsufficient(label)),
            Ok(ScopeAccess::NotAdministered) => {
                return Err(RequestRejection::TargetNotAdministered(target_scope_id.to_string()))
            }
            Err(e) => {
                log::warn!("Scope lookup for {} failed: {}", target_scope_id, e);
                return Err(RequestRejection::TargetUnverifiable(target_scope_id.to_string()));
            }
        };

        let key = composite_key(&ctx.scope_id, &name);
        check_vacant(autoclaims, &key, &name, &ctx.requester_id)?;

        self.ensure_taken(&name).await?;

        let watch = WatchEntry::new(&ctx.scope_id, &name, &ctx.requester_id, &ctx.notify_target_id);
        let entry = AutoClaimEntry::new(watch, target_scope_id, label);
        insert_and_persist(autoclaims, key, entry.clone())?;
        log::info!(
            "{} now auto-claiming '{}' for {} ({})",
            ctx.requester_id, name, entry.target_scope_label, target_scope_id
        );
        Ok(entry)
    }
}

fn check_vacant<E>(registry: &Registry<E>, key: &str, name: &str, requester_id: &str) -> Result<(), RequestRejection>
where
    E: RegistryEntry + Serialize + DeserializeOwned,
{
    match registry.get(key) {
        None => Ok(()),
        Some(existing) if existing.watch().requester_id == requester_id => {
            Err(RequestRejection::AlreadyWatching(name.to_string()))
        }
        Some(_) => Err(RequestRejection::HeldByOther(name.to_string())),
    }
}

fn insert_and_persist<E>(registry: &mut Registry<E>, key: String, entry: E) -> Result<(), RequestRejection>
where
    E: RegistryEntry + Serialize + DeserializeOwned,
{
    let (name, requester_id) = (entry.watch().resource_name.clone(), entry.watch().requester_id.clone());
    if let Err(occupied) = registry.insert_vacant(key.clone(), entry) {
        return Err(if occupied.requester_id == requester_id {
            RequestRejection::AlreadyWatching(name)
        } else {
            RequestRejection::HeldByOther(name)
        });
    }
    if let Err(e) = registry.save() {
        log::error!("Failed to persist {}: {}", registry.path().display(), e);
        registry.remove(&key);
        return Err(RequestRejection::Persist);
    }
    Ok(())
}

fn remove_and_persist<E>(
    registry: &mut Registry<E>,
    ctx: &RequestContext,
    raw_name: &str,
) -> Result<E, RequestRejection>
where
    E: RegistryEntry + Serialize + DeserializeOwned,
{
    let name = normalize_name(raw_name);
    let key = composite_key(&ctx.scope_id, &name);
    let removed = registry
        .remove_owned(&key, &ctx.requester_id)
        .ok_or(RequestRejection::NotWatching(name))?;

    if let Err(e) = registry.save() {
        log::error!("Failed to persist {}: {}", registry.path().display(), e);
        let _ = registry.insert_vacant(key, removed);
        return Err(RequestRejection::Persist);
    }
    Ok(removed)
}

/// Stops a watch. Only its requester may remove it.
pub fn remove_watch(
    watches: &mut Registry<WatchEntry>,
    ctx: &RequestContext,
    raw_name: &str,
) -> Result<WatchEntry, RequestRejection> {
    remove_and_persist(watches, ctx, raw_name)
}

/// Stops an auto-claim. Only its requester may remove it.
pub fn remove_autoclaim(
    autoclaims: &mut Registry<AutoClaimEntry>,
    ctx: &RequestContext,
    raw_name: &str,
) -> Result<AutoClaimEntry, RequestRejection> {
    remove_and_persist(autoclaims, ctx, raw_name)
}

/// The requester's watches in the request's scope.
pub fn list_watches<'a>(watches: &'a Registry<WatchEntry>, ctx: &'a RequestContext) -> Vec<&'a WatchEntry> {
    watches.owned_in_scope(&ctx.scope_id, &ctx.requester_id).collect()
}

/// The requester's auto-claims in the request's scope.
pub fn list_autoclaims<'a>(
    autoclaims: &'a Registry<AutoClaimEntry>,
    ctx: &'a RequestContext,
) -> Vec<&'a AutoClaimEntry> {
    autoclaims.owned_in_scope(&ctx.scope_id, &ctx.requester_id).collect()
}
