//! # Notification Events
//!
//! Structured events the scheduler hands to a `NotificationSink`. How an event
//! is rendered and delivered belongs to the sink.

use std::future::Future;

use crate::error::NotifyError;
use crate::remote::claim::ClaimFailure;

/// Something the requester of an entry should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A watched name became available.
    WatchAvailable {
        resource_name: String,
        requester_id: String,
        notify_target_id: String,
    },
    /// A name was claimed for the target scope.
    ClaimSucceeded {
        resource_name: String,
        requester_id: String,
        notify_target_id: String,
        target_scope_label: String,
    },
    /// A name became available but the claim did not go through.
    ClaimFailed {
        resource_name: String,
        requester_id: String,
        notify_target_id: String,
        target_scope_label: String,
        reason: ClaimFailure,
    },
}

impl NotificationEvent {
    pub fn resource_name(&self) -> &str {
        match self {
            Self::WatchAvailable { resource_name, .. }
            | Self::ClaimSucceeded { resource_name, .. }
            | Self::ClaimFailed { resource_name, .. } => resource_name,
        }
    }

    pub fn notify_target_id(&self) -> &str {
        match self {
            Self::WatchAvailable { notify_target_id, .. }
            | Self::ClaimSucceeded { notify_target_id, .. }
            | Self::ClaimFailed { notify_target_id, .. } => notify_target_id,
        }
    }

    pub fn requester_id(&self) -> &str {
        match self {
            Self::WatchAvailable { requester_id, .. }
            | Self::ClaimSucceeded { requester_id, .. }
            | Self::ClaimFailed { requester_id, .. } => requester_id,
        }
    }

    /// Plain-text rendering used by the bundled sinks.
    pub fn message(&self) -> String {
        match self {
            Self::WatchAvailable { resource_name, .. } => {
                format!("Vanity **{resource_name}** is now available!")
            }
            Self::ClaimSucceeded { resource_name, target_scope_label, .. } => {
                format!("Successfully claimed vanity **{resource_name}** for **{target_scope_label}**!")
            }
            Self::ClaimFailed { resource_name, target_scope_label, .. } => {
                format!("Failed to claim vanity **{resource_name}** for **{target_scope_label}**.")
            }
        }
    }
}

/// Delivery seam for notification events.
pub trait NotificationSink {
    fn deliver(&self, event: &NotificationEvent) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Writes events to the log instead of delivering them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        log::info!("[notify {} -> {}] {}", event.requester_id(), event.notify_target_id(), event.message());
        Ok(())
    }
}
