use serde::Serialize;
use tracing::{debug, instrument};

use super::UserId;
use super::event::{ActionKind, AuditEvent};
use super::ledger::CreditLedger;
use super::rules::{Recipient, ScoringTable};

/// Outcome of running one audit entry through the scoring table.
///
/// `Unscored` events are still reportable by the relay; they just carry no
/// credit change. Display-name enrichment of the recipient is the relay's
/// job, the record only carries raw ids.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Scored {
        kind: ActionKind,
        recipient_id: UserId,
        delta: i64,
        reason: String,
        new_total: i64,
    },
    Unscored {
        kind: ActionKind,
    },
}

pub struct AuditResolver {
    table: ScoringTable,
}

impl AuditResolver {
    pub fn new(table: ScoringTable) -> Self {
        Self { table }
    }

    /// Resolves an audit entry to a scoring decision and applies it to the
    /// ledger. Missing rules, missing recipient ids and zero deltas all
    /// degrade to [`Resolution::Unscored`] rather than failing.
    #[instrument(skip(self, ledger), fields(kind = ?event.kind))]
    pub async fn resolve(&self, ledger: &CreditLedger, event: &AuditEvent) -> Resolution {
        let Some(rule) = self.table.rule_for(event) else {
            debug!(note = ?event.reason, "no scoring rule for action");
            return Resolution::Unscored { kind: event.kind };
        };

        let recipient_id = match rule.recipient {
            Recipient::Target => event.target_id.clone(),
            Recipient::Executor => event.executor_id.clone(),
        };

        let Some(recipient_id) = recipient_id else {
            debug!(recipient = ?rule.recipient, "recipient id missing, skipping scoring");
            return Resolution::Unscored { kind: event.kind };
        };

        if rule.delta == 0 {
            return Resolution::Unscored { kind: event.kind };
        }

        let new_total = ledger.modify(&recipient_id, rule.delta).await;

        Resolution::Scored {
            kind: event.kind,
            recipient_id,
            delta: rule.delta,
            reason: rule.reason.to_string(),
            new_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::event::{AuditChange, TIMEOUT_CHANGE_KEY};
    use crate::credit::ledger::BASELINE_SCORE;
    use crate::credit::rules::{AttributionPolicy, TIMEOUT_DELTA, TIMEOUT_REASON};
    use serde_json::Value;

    async fn scratch_ledger(dir: &tempfile::TempDir) -> CreditLedger {
        CreditLedger::load(dir.path().join("credits.json")).await
    }

    fn resolver(policy: AttributionPolicy) -> AuditResolver {
        AuditResolver::new(ScoringTable::new(policy))
    }

    fn event(kind: ActionKind) -> AuditEvent {
        AuditEvent {
            kind,
            executor_id: Some("mod".into()),
            target_id: Some("citizen".into()),
            reason: Some("because".to_string()),
            changes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_ban_scores_target_under_default_policy() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = scratch_ledger(&dir).await;

        let resolution = resolver(AttributionPolicy::default())
            .resolve(&ledger, &event(ActionKind::MemberBanAdd))
            .await;

        match resolution {
            Resolution::Scored {
                recipient_id,
                delta,
                new_total,
                ..
            } => {
                assert_eq!(recipient_id, "citizen".into());
                assert_eq!(delta, -1000);
                assert_eq!(new_total, BASELINE_SCORE - 1000);
            }
            Resolution::Unscored { .. } => panic!("expected a scored resolution"),
        }
    }

    #[tokio::test]
    async fn test_ban_scores_executor_under_executor_policy() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = scratch_ledger(&dir).await;

        let resolution = resolver(AttributionPolicy::Executor)
            .resolve(&ledger, &event(ActionKind::MemberBanAdd))
            .await;

        match resolution {
            Resolution::Scored { recipient_id, .. } => assert_eq!(recipient_id, "mod".into()),
            Resolution::Unscored { .. } => panic!("expected a scored resolution"),
        }
    }

    #[tokio::test]
    async fn test_unknown_kind_leaves_ledger_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = scratch_ledger(&dir).await;

        let resolution = resolver(AttributionPolicy::default())
            .resolve(&ledger, &event(ActionKind::Unknown))
            .await;

        assert!(matches!(resolution, Resolution::Unscored { .. }));
        assert!(ledger.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_recipient_degrades_to_unscored() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = scratch_ledger(&dir).await;

        let mut kick = event(ActionKind::MemberKick);
        kick.target_id = None;

        let resolution = resolver(AttributionPolicy::default())
            .resolve(&ledger, &kick)
            .await;

        assert!(matches!(resolution, Resolution::Unscored { .. }));
        assert!(ledger.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_delta_rule_is_unscored() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = scratch_ledger(&dir).await;

        let resolution = resolver(AttributionPolicy::default())
            .resolve(&ledger, &event(ActionKind::MemberRoleUpdate))
            .await;

        assert!(matches!(resolution, Resolution::Unscored { .. }));
        assert!(ledger.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_override_resolves_to_timeout_rule() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = scratch_ledger(&dir).await;

        let mut update = event(ActionKind::MemberUpdate);
        update.changes.push(AuditChange {
            key: TIMEOUT_CHANGE_KEY.to_string(),
            old: Some(Value::Null),
            new: Some(Value::String("2026-03-03T00:00:00Z".to_string())),
        });

        let resolution = resolver(AttributionPolicy::default())
            .resolve(&ledger, &update)
            .await;

        match resolution {
            Resolution::Scored { delta, reason, .. } => {
                assert_eq!(delta, TIMEOUT_DELTA);
                assert_eq!(reason, TIMEOUT_REASON);
            }
            Resolution::Unscored { .. } => panic!("expected the timeout override to score"),
        }
    }

    #[tokio::test]
    async fn test_plain_member_update_keeps_generic_rule() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = scratch_ledger(&dir).await;

        let resolution = resolver(AttributionPolicy::default())
            .resolve(&ledger, &event(ActionKind::MemberUpdate))
            .await;

        match resolution {
            Resolution::Scored { delta, reason, .. } => {
                assert_eq!(delta, -50);
                assert_ne!(reason, TIMEOUT_REASON);
            }
            Resolution::Unscored { .. } => panic!("expected the generic rule to score"),
        }
    }
}
