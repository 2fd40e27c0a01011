mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use lib_vanity::core::notify::{NotificationEvent, NotificationSink};
use lib_vanity::remote::availability::{Availability, AvailabilityCheck, HttpAvailabilityClient};
use lib_vanity::remote::channel::RestChannelSink;
use lib_vanity::remote::scopes::{RestScopeDirectory, ScopeAccess, ScopeDirectory};
use lib_vanity::retrieve::ky_http::Transport;
use lib_vanity::retrieve::proxy_pool::ProxyDescriptor;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn invite(Path(code): Path<String>) -> (StatusCode, String) {
    match code.as_str() {
        "gone" => (StatusCode::NOT_FOUND, json!({"message": "Unknown Invite", "code": 10006}).to_string()),
        "unknown" => (StatusCode::BAD_REQUEST, json!({"message": "Unknown Invite", "code": 10006}).to_string()),
        "limited" => (StatusCode::TOO_MANY_REQUESTS, json!({"retry_after": 3.5}).to_string()),
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, "oops".to_string()),
        _ => (StatusCode::OK, json!({"code": code}).to_string()),
    }
}

#[tokio::test]
async fn existence_check_reads_status_and_payload() {
    let base = common::serve(Router::new().route("/api/v10/invites/{code}", get(invite))).await;
    let client = HttpAvailabilityClient::new(&base, Arc::new(Transport::new(TIMEOUT).unwrap())).unwrap();

    let cases = [
        ("taken", Availability::Exists),
        ("gone", Availability::NotFound),
        ("unknown", Availability::NotFound),
        ("limited", Availability::Exists),
        ("boom", Availability::Exists),
    ];
    for (name, expected) in cases {
        assert_eq!(client.exists(name, None).await.unwrap(), expected, "{name}");
    }
}

#[tokio::test]
async fn unreachable_remote_or_proxy_reads_as_exists() {
    let transport = Arc::new(Transport::new(TIMEOUT).unwrap());

    // Nothing listens on port 1.
    let client = HttpAvailabilityClient::new("http://127.0.0.1:1/api/v10/", transport.clone()).unwrap();
    assert_eq!(client.exists("anything", None).await.unwrap(), Availability::Exists);

    let base = common::serve(Router::new().route("/api/v10/invites/{code}", get(invite))).await;
    let client = HttpAvailabilityClient::new(&base, transport).unwrap();
    let dead_proxy = ProxyDescriptor::parse("127.0.0.1:1:user:pass", 0).unwrap();
    assert_eq!(client.exists("gone", Some(&dead_proxy)).await.unwrap(), Availability::Exists);
}

async fn my_guilds(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bot tok") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "401: Unauthorized", "code": 0})));
    }
    (
        StatusCode::OK,
        Json(json!([
            {"id": "111111111111111111", "name": "Managed", "owner": false, "permissions": "32"},
            {"id": "222222222222222222", "name": "Admin", "owner": false, "permissions": "8"},
            {"id": "333333333333333333", "name": "Owned", "owner": true, "permissions": "0"},
            {"id": "444444444444444444", "name": "Member", "owner": false, "permissions": "104324673"}
        ])),
    )
}

#[tokio::test]
async fn scope_directory_reads_permission_bits() {
    let base = common::serve(Router::new().route("/api/v10/users/@me/guilds", get(my_guilds))).await;
    let scopes = RestScopeDirectory::new(&base, "tok", TIMEOUT).unwrap();

    for (id, label) in [
        ("111111111111111111", "Managed"),
        ("222222222222222222", "Admin"),
        ("333333333333333333", "Owned"),
    ] {
        assert_eq!(scopes.access(id).await.unwrap(), ScopeAccess::Manageable { label: label.to_string() });
    }
    assert_eq!(
        scopes.access("444444444444444444").await.unwrap(),
        ScopeAccess::Insufficient { label: "Member".to_string() }
    );
    assert_eq!(scopes.access("999999999999999999").await.unwrap(), ScopeAccess::NotAdministered);

    let wrong_token = RestScopeDirectory::new(&base, "nope", TIMEOUT).unwrap();
    assert!(wrong_token.access("111111111111111111").await.is_err());
}

/// 250 manageable memberships served `limit` at a time after the `after` cursor.
async fn many_guilds(
    State(pages): State<Arc<AtomicUsize>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    pages.fetch_add(1, Ordering::SeqCst);
    let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(200).min(200);
    let after: u64 = params.get("after").and_then(|a| a.parse().ok()).unwrap_or(0);
    let page: Vec<Value> = (0..250u64)
        .map(|i| (100_000_000_000_000_000 + i, i))
        .filter(|(id, _)| *id > after)
        .take(limit)
        .map(|(id, i)| json!({"id": id.to_string(), "name": format!("G{i}"), "owner": false, "permissions": "32"}))
        .collect();
    Json(Value::Array(page))
}

#[tokio::test]
async fn scope_directory_follows_membership_pages() {
    let pages = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/api/v10/users/@me/guilds", get(many_guilds)).with_state(pages.clone());
    let base = common::serve(app).await;
    let scopes = RestScopeDirectory::new(&base, "tok", TIMEOUT).unwrap();

    assert_eq!(
        scopes.access("100000000000000220").await.unwrap(),
        ScopeAccess::Manageable { label: "G220".to_string() }
    );
    assert_eq!(pages.swap(0, Ordering::SeqCst), 2);

    // Found on the first page, so the second is never fetched.
    assert_eq!(
        scopes.access("100000000000000005").await.unwrap(),
        ScopeAccess::Manageable { label: "G5".to_string() }
    );
    assert_eq!(pages.swap(0, Ordering::SeqCst), 1);

    // A short page ends the walk.
    assert_eq!(scopes.access("999999999999999999").await.unwrap(), ScopeAccess::NotAdministered);
    assert_eq!(pages.load(Ordering::SeqCst), 2);
}

type Posted = Arc<Mutex<Vec<(String, Value)>>>;

async fn post_message(State(posted): State<Posted>, Path(channel): Path<String>, Json(body): Json<Value>) -> StatusCode {
    if channel == "missing" {
        return StatusCode::NOT_FOUND;
    }
    posted.lock().unwrap().push((channel, body));
    StatusCode::OK
}

#[tokio::test]
async fn channel_sink_posts_the_message() {
    let posted: Posted = Arc::default();
    let app = Router::new()
        .route("/api/v10/channels/{channel}/messages", post(post_message))
        .with_state(posted.clone());
    let base = common::serve(app).await;
    let sink = RestChannelSink::new(&base, "tok", TIMEOUT).unwrap();

    let event = NotificationEvent::WatchAvailable {
        resource_name: "coolname".to_string(),
        requester_id: "U1".to_string(),
        notify_target_id: "C1".to_string(),
    };
    sink.deliver(&event).await.unwrap();

    let posted_now = posted.lock().unwrap().clone();
    assert_eq!(posted_now, vec![("C1".to_string(), json!({"content": "Vanity **coolname** is now available!"}))]);

    let lost = NotificationEvent::WatchAvailable {
        resource_name: "coolname".to_string(),
        requester_id: "U1".to_string(),
        notify_target_id: "missing".to_string(),
    };
    assert!(sink.deliver(&lost).await.is_err());
}

#[tokio::test]
async fn channel_sink_does_not_repost_after_a_server_error() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/api/v10/channels/{channel}/messages",
            post(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::INTERNAL_SERVER_ERROR
            }),
        )
        .with_state(hits.clone());
    let base = common::serve(app).await;
    let sink = RestChannelSink::new(&base, "tok", TIMEOUT).unwrap();

    let event = NotificationEvent::WatchAvailable {
        resource_name: "coolname".to_string(),
        requester_id: "U1".to_string(),
        notify_target_id: "C1".to_string(),
    };
    assert!(sink.deliver(&event).await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
