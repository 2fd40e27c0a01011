//! In-memory fakes for the remote seams, plus a local HTTP stand-in.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use lib_vanity::core::notify::{NotificationEvent, NotificationSink};
use lib_vanity::error::{NotifyError, RemoteError};
use lib_vanity::remote::availability::{Availability, AvailabilityCheck};
use lib_vanity::remote::claim::{ClaimOutcome, Claimer};
use lib_vanity::remote::scopes::{ScopeAccess, ScopeDirectory};
use lib_vanity::retrieve::proxy_pool::ProxyDescriptor;

pub const TARGET_SCOPE: &str = "123456789012345678";

pub fn unreachable() -> RemoteError {
    RemoteError::UnexpectedResponse { status: 0, body: "unreachable".to_string() }
}

/// Answers per name; unknown names read as `Exists`. `None` answers error.
#[derive(Default)]
pub struct FakeAvailability {
    answers: Mutex<HashMap<String, Option<Availability>>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeAvailability {
    pub fn set(&self, name: &str, answer: Option<Availability>) {
        self.answers.lock().unwrap().insert(name.to_string(), answer);
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(n, _)| n == name).count()
    }
}

impl AvailabilityCheck for FakeAvailability {
    async fn exists(&self, name: &str, proxy: Option<&ProxyDescriptor>) -> Result<Availability, RemoteError> {
        self.calls.lock().unwrap().push((name.to_string(), proxy.map(|p| p.host.clone())));
        match self.answers.lock().unwrap().get(name).cloned() {
            None => Ok(Availability::Exists),
            Some(Some(answer)) => Ok(answer),
            Some(None) => Err(unreachable()),
        }
    }
}

/// Returns the configured outcome for every claim. `None` errors.
pub struct FakeClaimer {
    outcome: Mutex<Option<ClaimOutcome>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeClaimer {
    pub fn new(outcome: Option<ClaimOutcome>) -> Self {
        Self { outcome: Mutex::new(outcome), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Claimer for FakeClaimer {
    async fn claim(&self, name: &str, target: &str) -> Result<ClaimOutcome, RemoteError> {
        self.calls.lock().unwrap().push((name.to_string(), target.to_string()));
        self.outcome.lock().unwrap().clone().ok_or_else(unreachable)
    }
}

/// Fixed scope access. `None` errors.
pub struct FakeScopes {
    access: Option<ScopeAccess>,
    pub lookups: AtomicUsize,
}

impl FakeScopes {
    pub fn new(access: Option<ScopeAccess>) -> Self {
        Self { access, lookups: AtomicUsize::new(0) }
    }

    pub fn manageable(label: &str) -> Self {
        Self::new(Some(ScopeAccess::Manageable { label: label.to_string() }))
    }
}

impl ScopeDirectory for FakeScopes {
    async fn access(&self, _scope_id: &str) -> Result<ScopeAccess, RemoteError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.access.clone().ok_or_else(unreachable)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// A sink whose deliveries always fail.
pub struct BrokenSink;

impl NotificationSink for BrokenSink {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery { target: event.notify_target_id().to_string(), reason: "offline".to_string() })
    }
}

/// Serves `app` on an ephemeral local port and returns the API base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/v10/")
}
