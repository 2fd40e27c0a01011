//! REST notification sink: posts each event as a plain message to its notify
//! target (`POST channels/{id}/messages`).

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::core::notify::{NotificationEvent, NotificationSink};
use crate::error::{ConfigError, NotifyError};
use crate::retrieve::ky_http::ApiClient;

#[derive(Serialize)]
struct MessageBody<'a> {
    content: &'a str,
}

pub struct RestChannelSink {
    api: ApiClient,
}

impl RestChannelSink {
    /// Posting is not idempotent, so a failed delivery is never retried.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let api = ApiClient::new(base_url, Some(format!("Bot {token}")), timeout, 0)?;
        Ok(Self { api })
    }
}

impl NotificationSink for RestChannelSink {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let target = event.notify_target_id();
        let content = event.message();
        let response = self
            .api
            .request::<Value, _>(
                Method::POST,
                &format!("channels/{target}/messages"),
                Some(&MessageBody { content: &content }),
                None,
            )
            .await?;

        if response.success {
            Ok(())
        } else {
            Err(NotifyError::Delivery {
                target: target.to_string(),
                reason: format!("status {}: {}", response.status, response.error_body.unwrap_or_default()),
            })
        }
    }
}
