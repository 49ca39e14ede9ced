use std::time::Duration;

use async_trait::async_trait;
use leaky_bucket::RateLimiter;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{instrument, warn};

use super::{CreditNotice, NoticeOrigin, NotificationSink};

const POSITIVE_COLOR: u32 = 0x57f287;
const NEGATIVE_COLOR: u32 = 0xed4245;

/// Posts notices as embed payloads to a configured webhook URL.
pub struct WebhookSink {
    client: Client,
    url: String,
    limiter: RateLimiter,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        // Discord allows roughly 30 webhook posts a minute; stay under it.
        let limiter = RateLimiter::builder()
            .initial(5)
            .max(5)
            .refill(1)
            .interval(Duration::from_secs(3))
            .build();

        Self {
            client: Client::new(),
            url,
            limiter,
        }
    }

    fn embed_payload(notice: &CreditNotice) -> Value {
        let title = match notice.origin {
            NoticeOrigin::Audit { .. } => "State Action Recorded",
            NoticeOrigin::Message { .. } => "Speech Evaluated",
        };

        let color = if notice.delta >= 0 {
            POSITIVE_COLOR
        } else {
            NEGATIVE_COLOR
        };

        json!({
            "embeds": [{
                "title": title,
                "color": color,
                "fields": [
                    { "name": "Citizen", "value": format!("<@{}>", notice.recipient_id), "inline": true },
                    { "name": "Adjustment", "value": format!("{:+}", notice.delta), "inline": true },
                    { "name": "New Total", "value": notice.new_total.to_string(), "inline": true },
                    { "name": "Reason", "value": notice.reason.clone(), "inline": false },
                ],
                "timestamp": notice.at.to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    #[instrument(skip(self, notice), fields(notice_id = %notice.id))]
    async fn deliver(&self, notice: &CreditNotice) {
        self.limiter.acquire_one().await;

        let payload = Self::embed_payload(notice);
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(res) if res.status().is_success() => {}
            Ok(res) => warn!(status = %res.status(), "webhook dispatch rejected"),
            Err(error) => warn!(%error, "webhook dispatch failed"),
        }
    }
}
