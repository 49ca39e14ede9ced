use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::UserId;

/// Change-set key the platform writes when a member is issued a
/// communication timeout.
pub const TIMEOUT_CHANGE_KEY: &str = "communication_disabled_until";

/// Category tag of an audit-trail entry.
///
/// Wire names are snake_case; kinds this service has no rule for still
/// deserialize (as [`ActionKind::Unknown`]) so the event stays reportable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    GuildUpdate,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    ChannelOverwriteCreate,
    ChannelOverwriteUpdate,
    ChannelOverwriteDelete,
    MemberKick,
    MemberPrune,
    MemberBanAdd,
    MemberBanRemove,
    MemberUpdate,
    MemberRoleUpdate,
    MemberMove,
    MemberDisconnect,
    BotAdd,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    InviteCreate,
    InviteDelete,
    WebhookCreate,
    WebhookUpdate,
    WebhookDelete,
    EmojiCreate,
    EmojiUpdate,
    EmojiDelete,
    StickerCreate,
    StickerUpdate,
    StickerDelete,
    MessageDelete,
    MessageBulkDelete,
    MessagePin,
    MessageUnpin,
    IntegrationCreate,
    IntegrationUpdate,
    IntegrationDelete,
    ThreadCreate,
    ThreadUpdate,
    ThreadDelete,
    ScheduledEventCreate,
    ScheduledEventUpdate,
    ScheduledEventDelete,
    AutomodRuleCreate,
    AutomodRuleUpdate,
    AutomodRuleDelete,
    AutomodBlockMessage,
    AutomodFlagToChannel,
    AutomodTimeoutUser,
    #[serde(other)]
    Unknown,
}

/// One field-level before/after record from an audit entry's change set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditChange {
    pub key: String,
    #[serde(default)]
    pub old: Option<Value>,
    #[serde(default)]
    pub new: Option<Value>,
}

/// A raw audit-trail entry as relayed by the gateway.
///
/// Executor, target, reason and changes are all optional on the wire; the
/// resolver degrades to "no scoring" rather than erroring when a required
/// piece is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: ActionKind,
    #[serde(default)]
    pub executor_id: Option<UserId>,
    #[serde(default)]
    pub target_id: Option<UserId>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub changes: Vec<AuditChange>,
}

impl AuditEvent {
    /// True when the change set records a newly applied communication
    /// timeout (non-null, non-false new value under the suspension key).
    pub fn applies_timeout(&self) -> bool {
        self.changes.iter().any(|change| {
            change.key == TIMEOUT_CHANGE_KEY
                && change
                    .new
                    .as_ref()
                    .is_some_and(|new| !new.is_null() && *new != Value::Bool(false))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_deserializes() {
        let raw = r#"{ "kind": "home_decoration_update", "executor_id": "1" }"#;
        let event: AuditEvent = serde_json::from_str(raw).unwrap();

        assert_eq!(event.kind, ActionKind::Unknown);
        assert_eq!(event.executor_id, Some(UserId::from("1")));
        assert!(event.changes.is_empty());
    }

    #[test]
    fn test_known_kind_snake_case() {
        let raw = r#"{ "kind": "member_ban_add", "target_id": "42" }"#;
        let event: AuditEvent = serde_json::from_str(raw).unwrap();

        assert_eq!(event.kind, ActionKind::MemberBanAdd);
    }

    #[test]
    fn test_timeout_detection() {
        let event = AuditEvent {
            kind: ActionKind::MemberUpdate,
            executor_id: Some("mod".into()),
            target_id: Some("citizen".into()),
            reason: None,
            changes: vec![AuditChange {
                key: TIMEOUT_CHANGE_KEY.to_string(),
                old: Some(Value::Null),
                new: Some(Value::String("2026-01-01T00:00:00Z".to_string())),
            }],
        };

        assert!(event.applies_timeout());
    }

    #[test]
    fn test_timeout_lift_is_not_a_timeout() {
        // a null new value means the suspension was removed, not applied
        let event = AuditEvent {
            kind: ActionKind::MemberUpdate,
            executor_id: None,
            target_id: Some("citizen".into()),
            reason: None,
            changes: vec![AuditChange {
                key: TIMEOUT_CHANGE_KEY.to_string(),
                old: Some(Value::String("2026-01-01T00:00:00Z".to_string())),
                new: Some(Value::Null),
            }],
        };

        assert!(!event.applies_timeout());
    }
}
