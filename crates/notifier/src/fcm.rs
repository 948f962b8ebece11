//! FCM HTTP v1 transport used by the push worker.
//!
//! FCM has no batch send in v1, so each item is a separate `messages:send`
//! call. Per-item errors are classified; only a missing access token or a
//! client that cannot be built fails the whole batch.

use std::time::Duration;

use serde_json::json;

use walwal_common::types::DeliveryItem;

use crate::transport::{ItemOutcome, PushTransport, TransportError};

/// Error codes FCM returns for tokens that will never be deliverable again.
const UNREACHABLE_ERROR_CODES: &[&str] = &["UNREGISTERED", "NOT_REGISTERED", "INVALID_REGISTRATION"];

pub struct FcmTransport {
    client: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl FcmTransport {
    pub fn new(
        api_url: impl Into<String>,
        access_token: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(TransportError::Gateway(
                "FCM access token is not configured".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            access_token,
        })
    }

    async fn send_one(&self, item: &DeliveryItem) -> ItemOutcome {
        let response = match self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.access_token)
            .json(&build_message(item))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return ItemOutcome::Delivered;
        }

        let body = response.text().await.unwrap_or_default();
        classify_error(status.as_u16(), &body)
    }
}

impl PushTransport for FcmTransport {
    async fn send_batch(&self, batch: &[DeliveryItem]) -> Result<Vec<ItemOutcome>, TransportError> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for item in batch {
            outcomes.push(self.send_one(item).await);
        }
        Ok(outcomes)
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}

/// Build the `messages:send` request body.
pub fn build_message(item: &DeliveryItem) -> serde_json::Value {
    json!({
        "message": {
            "token": item.token,
            "notification": {
                "title": item.title,
                "body": item.body,
            },
            "data": {
                "deepLink": item.deep_link,
            },
        },
        "validate_only": false,
    })
}

/// Map a non-2xx FCM response to an item outcome.
pub fn classify_error(status: u16, body: &str) -> ItemOutcome {
    if status == 404 || UNREACHABLE_ERROR_CODES.iter().any(|code| body.contains(code)) {
        return ItemOutcome::Unreachable(format!("FCM {status}: token no longer registered"));
    }
    let detail: String = body.chars().take(200).collect();
    ItemOutcome::Failed(format!("FCM {status}: {detail}"))
}
