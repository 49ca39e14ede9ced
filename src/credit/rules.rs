use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::event::{ActionKind, AuditEvent};

/// Which party a resolved rule applies its delta to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Target,
    Executor,
}

/// Named policy for who carries the score change of an enforcement action
/// (kicks, bans, censorship, timeouts) and its restorative counterparts.
///
/// `Target` scores the punished or restored party; `Executor` scores the
/// moderator performing the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributionPolicy {
    #[default]
    Target,
    Executor,
}

impl AttributionPolicy {
    fn recipient(self) -> Recipient {
        match self {
            AttributionPolicy::Target => Recipient::Target,
            AttributionPolicy::Executor => Recipient::Executor,
        }
    }
}

impl FromStr for AttributionPolicy {
    type Err = PolicyParseErr;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "target" => Ok(AttributionPolicy::Target),
            "executor" => Ok(AttributionPolicy::Executor),
            other => Err(PolicyParseErr(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid attribution policy '{0}' (expected 'target' or 'executor')")]
pub struct PolicyParseErr(pub String);

/// One row of the scoring table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRule {
    pub delta: i64,
    pub recipient: Recipient,
    pub reason: &'static str,
}

/// Table-local attribution tag; `Enforced` resolves through the configured
/// [`AttributionPolicy`] when the table is built.
#[derive(Debug, Clone, Copy)]
enum Attribution {
    Executor,
    Target,
    Enforced,
}

/// Delta applied when a generic member update turns out to be a timeout.
pub const TIMEOUT_DELTA: i64 = -200;
pub const TIMEOUT_REASON: &str = "Silenced. Communication privileges suspended.";

#[rustfmt::skip]
const BASE_RULES: &[(ActionKind, i64, Attribution, &str)] = &[
    // server maintenance
    (ActionKind::GuildUpdate,            10, Attribution::Executor, "Upgraded server settings"),
    (ActionKind::ChannelCreate,          20, Attribution::Executor, "Expanded server territory (channel created)"),
    (ActionKind::ChannelUpdate,           5, Attribution::Executor, "Maintained channel infrastructure"),
    (ActionKind::ChannelDelete,          -5, Attribution::Executor, "Demolished server territory (channel deleted)"),
    (ActionKind::ChannelOverwriteCreate,  5, Attribution::Executor, "Refined channel permissions"),
    (ActionKind::ChannelOverwriteUpdate,  5, Attribution::Executor, "Refined channel permissions"),
    (ActionKind::ChannelOverwriteDelete,  5, Attribution::Executor, "Cleaned up channel permissions"),
    // member enforcement
    (ActionKind::MemberKick,           -500, Attribution::Enforced, "Kicked from the server. Shameful display."),
    (ActionKind::MemberPrune,          -200, Attribution::Executor, "Purged inactive elements"),
    (ActionKind::MemberBanAdd,        -1000, Attribution::Enforced, "Banned. Enemy of the state."),
    (ActionKind::MemberBanRemove,       200, Attribution::Enforced, "Unbanned. A second chance at citizenship."),
    (ActionKind::MemberUpdate,          -50, Attribution::Enforced, "Profile modified by the state"),
    (ActionKind::MemberRoleUpdate,        0, Attribution::Target,   "Roles changed"),
    (ActionKind::MemberMove,              0, Attribution::Target,   "Moved in voice"),
    (ActionKind::MemberDisconnect,      -10, Attribution::Enforced, "Forcefully disconnected from voice"),
    (ActionKind::BotAdd,                 50, Attribution::Executor, "Recruited a helper robot"),
    // roles
    (ActionKind::RoleCreate,             15, Attribution::Executor, "Created a new social class (role)"),
    (ActionKind::RoleUpdate,              5, Attribution::Executor, "Adjusted a social class"),
    (ActionKind::RoleDelete,            -10, Attribution::Executor, "Dissolved a social class"),
    // invites
    (ActionKind::InviteCreate,           10, Attribution::Executor, "Spread the good word (invite created)"),
    (ActionKind::InviteDelete,           -5, Attribution::Executor, "Retracted an invitation"),
    // webhooks
    (ActionKind::WebhookCreate,          10, Attribution::Executor, "Established a communication relay"),
    (ActionKind::WebhookUpdate,           5, Attribution::Executor, "Tuned a communication relay"),
    (ActionKind::WebhookDelete,          -5, Attribution::Executor, "Dismantled a communication relay"),
    // emoji and stickers
    (ActionKind::EmojiCreate,            15, Attribution::Executor, "Contributed a cultural asset (emoji)"),
    (ActionKind::EmojiUpdate,             5, Attribution::Executor, "Refined a cultural asset"),
    (ActionKind::EmojiDelete,           -15, Attribution::Executor, "Destroyed a cultural asset"),
    (ActionKind::StickerCreate,          15, Attribution::Executor, "Contributed a propaganda sticker"),
    (ActionKind::StickerUpdate,           5, Attribution::Executor, "Refined a propaganda sticker"),
    (ActionKind::StickerDelete,         -15, Attribution::Executor, "Destroyed a propaganda sticker"),
    // message moderation
    (ActionKind::MessageDelete,         -50, Attribution::Enforced, "Message censored by the state"),
    (ActionKind::MessageBulkDelete,     -10, Attribution::Executor, "Performed mass censorship"),
    (ActionKind::MessagePin,             20, Attribution::Target,   "Message pinned. Exemplary contribution."),
    (ActionKind::MessageUnpin,          -10, Attribution::Target,   "Pin removed. Relevance lost."),
    // integrations
    (ActionKind::IntegrationCreate,      20, Attribution::Executor, "Established foreign relations"),
    (ActionKind::IntegrationUpdate,      10, Attribution::Executor, "Adjusted foreign relations"),
    (ActionKind::IntegrationDelete,     -20, Attribution::Executor, "Severed foreign relations"),
    // threads
    (ActionKind::ThreadCreate,           10, Attribution::Executor, "Opened a new discussion topic"),
    (ActionKind::ThreadUpdate,            5, Attribution::Executor, "Moderated a discussion topic"),
    (ActionKind::ThreadDelete,          -10, Attribution::Executor, "Silenced a discussion topic"),
    // scheduled events
    (ActionKind::ScheduledEventCreate,   30, Attribution::Executor, "Organized a state gathering"),
    (ActionKind::ScheduledEventUpdate,   10, Attribution::Executor, "Adjusted a state gathering"),
    (ActionKind::ScheduledEventDelete,  -20, Attribution::Executor, "Cancelled a state gathering"),
    // automod
    (ActionKind::AutomodRuleCreate,      50, Attribution::Executor, "Implemented law and order (automod)"),
    (ActionKind::AutomodRuleUpdate,      10, Attribution::Executor, "Adjusted law and order"),
    (ActionKind::AutomodRuleDelete,     -50, Attribution::Executor, "Removed law and order"),
    (ActionKind::AutomodBlockMessage,  -100, Attribution::Enforced, "Message blocked by automod. Violation detected."),
    (ActionKind::AutomodFlagToChannel,  -50, Attribution::Enforced, "Flagged for review"),
    (ActionKind::AutomodTimeoutUser,   -200, Attribution::Enforced, "Auto-silenced"),
];

struct OverrideRule {
    applies: fn(&AuditEvent) -> bool,
    rule: ScoringRule,
}

fn timeout_applied(event: &AuditEvent) -> bool {
    event.kind == ActionKind::MemberUpdate && event.applies_timeout()
}

/// Immutable lookup from action kind to scoring rule, with conditional
/// sub-rules keyed on an event's change set evaluated ahead of the base
/// table.
pub struct ScoringTable {
    rules: HashMap<ActionKind, ScoringRule>,
    overrides: Vec<OverrideRule>,
}

impl ScoringTable {
    pub fn new(policy: AttributionPolicy) -> Self {
        let enforced = policy.recipient();

        let rules = BASE_RULES
            .iter()
            .map(|&(kind, delta, attribution, reason)| {
                let recipient = match attribution {
                    Attribution::Executor => Recipient::Executor,
                    Attribution::Target => Recipient::Target,
                    Attribution::Enforced => enforced,
                };

                (
                    kind,
                    ScoringRule {
                        delta,
                        recipient,
                        reason,
                    },
                )
            })
            .collect();

        let overrides = vec![OverrideRule {
            applies: timeout_applied,
            rule: ScoringRule {
                delta: TIMEOUT_DELTA,
                recipient: enforced,
                reason: TIMEOUT_REASON,
            },
        }];

        Self { rules, overrides }
    }

    /// Resolves the rule for an event: conditional overrides first, then the
    /// base table. `None` means the action kind is not scored.
    pub fn rule_for(&self, event: &AuditEvent) -> Option<ScoringRule> {
        for sub_rule in &self.overrides {
            if (sub_rule.applies)(event) {
                return Some(sub_rule.rule);
            }
        }

        self.rules.get(&event.kind).copied()
    }
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self::new(AttributionPolicy::default())
    }
}
