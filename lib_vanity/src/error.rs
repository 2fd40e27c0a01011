//! # Error Types
//!
//! Errors raised by the monitoring core. Request rejections (invalid names,
//! ownership conflicts, "already available") are not errors; they live in
//! `core::requests::RequestRejection`.

use std::path::PathBuf;
use thiserror::Error;

/// Startup-time configuration failures. These are the only errors allowed to
/// stop the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A proxy line did not have the `host:port:user:pass` shape.
    #[error("Malformed proxy descriptor on entry {index}: {reason}")]
    MalformedProxy {
        /// Zero-based position of the offending entry in the input list.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The proxy list file could not be read.
    #[error("Failed to read proxy file {path}: {source}")]
    ProxyFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A base URL or proxy URL could not be turned into a client.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Failures while persisting a registry snapshot.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Unclassified failures talking to the remote service.
///
/// The HTTP clients in `remote` classify almost everything themselves; this
/// type only surfaces what could not be turned into a classified outcome.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("Unexpected response ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A notification could not be delivered to its target.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery to {target} failed: {reason}")]
    Delivery { target: String, reason: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
