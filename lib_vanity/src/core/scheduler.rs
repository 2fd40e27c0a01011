//! # Monitoring Scheduler
//!
//! Periodically scans both registries and reacts when a watched name frees up.
//!
//! ## Tick
//! 1. Snapshot the watch registry's keys. For each entry, draw a proxy and run
//!    the existence check. On `NotFound`: remove the entry, persist, notify
//!    the requester.
//! 2. Same for the auto-claim registry, except that on `NotFound` the claim is
//!    attempted first and a success or failure event is emitted. The entry is
//!    removed whatever the claim outcome (one attempt per entry).
//!
//! A check or claim that errors instead of returning a classified result only
//! skips that entry for this tick; the entry stays and is retried next tick.
//! Notification and persistence failures are logged and never stop the scan.
//!
//! ## Ordering
//! `tick` borrows the registries mutably for its whole duration, so two ticks
//! (or a tick and a request handler) can never interleave. Frontends drive
//! ticks from a single task with `ticker()`, which uses
//! `MissedTickBehavior::Delay`: an overrunning tick is followed immediately by
//! the next one, with no burst of catch-up ticks.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::time::{interval, MissedTickBehavior};

use crate::core::entry::{AutoClaimEntry, RegistryEntry, WatchEntry};
use crate::core::notify::{NotificationEvent, NotificationSink};
use crate::core::registry::Registry;
use crate::remote::availability::{Availability, AvailabilityCheck};
use crate::remote::claim::{ClaimOutcome, Claimer};
use crate::retrieve::proxy_pool::ProxyPool;

/// Default interval between ticks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// The two registries, owned together so a tick can hold both.
pub struct Registries {
    pub watches: Registry<WatchEntry>,
    pub autoclaims: Registry<AutoClaimEntry>,
}

/// What a single tick did. Mostly useful for logs and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub available: usize,
    pub claimed: usize,
    pub claim_failed: usize,
    pub skipped: usize,
}

pub struct Scheduler<A, C, N> {
    availability: Arc<A>,
    claimer: Arc<C>,
    sink: Arc<N>,
    proxies: Arc<ProxyPool>,
    interval: Duration,
}

impl<A, C, N> Scheduler<A, C, N>
where
    A: AvailabilityCheck,
    C: Claimer,
    N: NotificationSink,
{
    pub fn new(availability: Arc<A>, claimer: Arc<C>, sink: Arc<N>, proxies: Arc<ProxyPool>, interval: Duration) -> Self {
        Self { availability, claimer, sink, proxies, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Interval for driving `tick`. Its first tick completes immediately.
    pub fn ticker(&self) -> tokio::time::Interval {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// One full scan of both registries.
    pub async fn tick(&self, registries: &mut Registries) -> TickReport {
        let mut report = TickReport::default();
        self.scan_watches(&mut registries.watches, &mut report).await;
        self.scan_autoclaims(&mut registries.autoclaims, &mut report).await;

        if report.available > 0 || report.skipped > 0 {
            log::info!("Tick finished: {:?}", report);
        } else {
            log::debug!("Tick finished: {:?}", report);
        }
        report
    }

    async fn check(&self, name: &str, report: &mut TickReport) -> Option<Availability> {
        report.checked += 1;
        let proxy = self.proxies.next();
        match self.availability.exists(name, proxy.as_ref()).await {
            Ok(availability) => Some(availability),
            Err(e) => {
                log::warn!("Existence check for '{}' failed: {}. Retrying next tick.", name, e);
                report.skipped += 1;
                None
            }
        }
    }

    async fn notify(&self, event: NotificationEvent) {
        if let Err(e) = self.sink.deliver(&event).await {
            log::error!("Failed to deliver notification for '{}': {}", event.resource_name(), e);
        }
    }

    async fn scan_watches(&self, watches: &mut Registry<WatchEntry>, report: &mut TickReport) {
        for key in watches.keys() {
            let Some(entry) = watches.get(&key).cloned() else {
                continue;
            };
            if self.check(&entry.resource_name, report).await != Some(Availability::NotFound) {
                continue;
            }

            report.available += 1;
            log::info!("Vanity '{}' is available (watched by {}).", entry.resource_name, entry.requester_id);

            // Remove before notifying so the transition is reported once.
            if watches.remove(&key).is_none() {
                continue;
            }
            persist(watches);

            self.notify(NotificationEvent::WatchAvailable {
                resource_name: entry.resource_name,
                requester_id: entry.requester_id,
                notify_target_id: entry.notify_target_id,
            })
            .await;
        }
    }

    async fn scan_autoclaims(&self, autoclaims: &mut Registry<AutoClaimEntry>, report: &mut TickReport) {
        for key in autoclaims.keys() {
            let Some(entry) = autoclaims.get(&key).cloned() else {
                continue;
            };
            let name = entry.watch.resource_name.as_str();
            if self.check(name, report).await != Some(Availability::NotFound) {
                continue;
            }

            report.available += 1;
            log::info!(
                "Vanity '{}' is available, claiming for {} ({}).",
                name, entry.target_scope_label, entry.target_scope_id
            );

            let outcome = match self.claimer.claim(name, &entry.target_scope_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!("Claim of '{}' could not be attempted: {}. Retrying next tick.", name, e);
                    report.skipped += 1;
                    continue;
                }
            };

            if autoclaims.remove(&key).is_none() {
                continue;
            }
            persist(autoclaims);

            let AutoClaimEntry { watch, target_scope_label, .. } = entry;
            let event = match outcome {
                ClaimOutcome::Claimed => {
                    report.claimed += 1;
                    NotificationEvent::ClaimSucceeded {
                        resource_name: watch.resource_name,
                        requester_id: watch.requester_id,
                        notify_target_id: watch.notify_target_id,
                        target_scope_label,
                    }
                }
                ClaimOutcome::Failed(reason) => {
                    report.claim_failed += 1;
                    NotificationEvent::ClaimFailed {
                        resource_name: watch.resource_name,
                        requester_id: watch.requester_id,
                        notify_target_id: watch.notify_target_id,
                        target_scope_label,
                        reason,
                    }
                }
            };
            self.notify(event).await;
        }
    }
}

fn persist<E>(registry: &Registry<E>)
where
    E: RegistryEntry + Serialize + DeserializeOwned,
{
    if let Err(e) = registry.save() {
        log::error!("Failed to persist {}: {}", registry.path().display(), e);
    }
}
