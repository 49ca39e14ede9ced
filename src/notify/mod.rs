use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::credit::UserId;
use crate::credit::event::ActionKind;
use crate::sentiment::SignalSource;

pub mod webhook;

/// Display-ready record of one committed scoring decision.
#[derive(Debug, Clone, Serialize)]
pub struct CreditNotice {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub recipient_id: UserId,
    pub delta: i64,
    pub reason: String,
    pub new_total: i64,
    pub origin: NoticeOrigin,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeOrigin {
    Audit { action: ActionKind },
    Message { source: SignalSource },
}

impl CreditNotice {
    pub fn new(
        recipient_id: UserId,
        delta: i64,
        reason: String,
        new_total: i64,
        origin: NoticeOrigin,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            recipient_id,
            delta,
            reason,
            new_total,
            origin,
        }
    }
}

/// Seam for whatever renders scoring decisions to the community.
///
/// The ledger has already committed by the time a notice reaches a sink, so
/// implementations log their own failures and never surface them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notice: &CreditNotice);
}

/// Fallback sink when no webhook is configured.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, notice: &CreditNotice) {
        tracing::info!(
            recipient = %notice.recipient_id,
            delta = notice.delta,
            new_total = notice.new_total,
            reason = %notice.reason,
            "credit notice"
        );
    }
}
