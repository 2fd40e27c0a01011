//! # Core Monitoring Engine
//!
//! Everything that decides *what* happens to a watched name, independent of
//! how the remote service is reached or how requests arrive.
//!
//! ## Core Components:
//!
//! - **`entry`**: the persisted record types (`WatchEntry`, `AutoClaimEntry`),
//!   name normalization and composite keys.
//!
//! - **`registry`**: the keyed, file-backed store for entries. Loads leniently,
//!   migrates legacy keys and saves whole snapshots atomically.
//!
//! - **`requests`**: add/remove/list on behalf of a requester, with ownership
//!   and "already available" checks.
//!
//! - **`commands`**: the `,command` grammar frontends parse into requests.
//!
//! - **`notify`**: structured notification events and the sink seam.
//!
//! - **`scheduler`**: the periodic scan that detects freed names, notifies
//!   watchers and triggers claims.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Persisted entry types and key rules.
pub mod entry;
/// File-backed keyed store for entries.
pub mod registry;
/// Requester-facing add/remove/list operations.
pub mod requests;
/// Command line grammar.
pub mod commands;
/// Notification events and sinks.
pub mod notify;
/// Periodic scan of both registries.
pub mod scheduler;

// --- Public API Re-exports ---
pub use entry::{AutoClaimEntry, RegistryEntry, WatchEntry};
pub use registry::Registry;
pub use requests::{RequestContext, RequestHandler, RequestRejection};
pub use commands::{Command, UsageError};
pub use notify::{LogSink, NotificationEvent, NotificationSink};
pub use scheduler::{Registries, Scheduler, TickReport};
