//! # Data Retrieval Module
//!
//! Shared HTTP plumbing for the remote clients.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: an authenticated `ApiClient` built on `reqwest` and
//!   `reqwest-middleware` with optional exponential-backoff retries, plus a
//!   `Transport` that hands out per-proxy `reqwest` clients.
//!
//! - **`proxy_pool`**: parsing of `host:port:user:pass` proxy descriptors and
//!   the round-robin pool that every outbound check draws from.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// HTTP API client with retry middleware and per-proxy transports.
pub mod ky_http;
/// Egress proxy descriptors and rotation.
pub mod proxy_pool;

pub use ky_http::{ApiClient, ApiResponse, Transport};
pub use proxy_pool::{ProxyDescriptor, ProxyPool};
