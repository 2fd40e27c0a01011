//! Vanity name monitoring: watch remote names, report when they free up, and
//! claim them for a target scope.

pub mod error;
pub mod core;
pub mod retrieve;
pub mod remote;

pub use error::{ConfigError, NotifyError, RegistryError, RemoteError};
