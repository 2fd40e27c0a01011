//! # Remote Service Clients
//!
//! Everything that talks to the remote API lives here, each behind a small
//! trait so the scheduler and the request handlers can be driven by fakes.
//!
//! ## Contained Modules:
//!
//! - **`availability`**: the read-only existence check (`AvailabilityCheck`).
//! - **`claim`**: the privileged claim with primary/fallback strategy (`Claimer`).
//! - **`scopes`**: privilege lookups for claim targets (`ScopeDirectory`).
//! - **`channel`**: a `NotificationSink` that posts messages to channels.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Existence check against the invite endpoint.
pub mod availability;
/// Claim mutation with precondition checks and fallback.
pub mod claim;
/// Scope membership and privilege lookups.
pub mod scopes;
/// Channel message notification sink.
pub mod channel;

// --- Public API Re-exports ---
pub use availability::{Availability, AvailabilityCheck, HttpAvailabilityClient};
pub use claim::{ClaimFailure, ClaimOutcome, Claimer, HttpClaimClient, PreconditionFailure};
pub use scopes::{RestScopeDirectory, ScopeAccess, ScopeDirectory};
pub use channel::RestChannelSink;
