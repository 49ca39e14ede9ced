use std::cmp::Reverse;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::credit::UserId;

/// Default number of rows a leaderboard request returns.
pub const DEFAULT_LIMIT: usize = 20;

/// Score band attached to every ranked row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Top,
    Good,
    Neutral,
    Warning,
    Critical,
}

impl Tier {
    pub fn for_score(score: i64) -> Self {
        if score >= 1500 {
            Tier::Top
        } else if score >= 1000 {
            Tier::Good
        } else if score < 0 {
            Tier::Critical
        } else if score < 500 {
            Tier::Warning
        } else {
            Tier::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: UserId,
    pub score: i64,
    pub tier: Tier,
}

/// Filters the ledger snapshot to present members, ranks by score descending
/// (first-seen order breaks ties) and truncates to `limit`.
pub fn rank(
    snapshot: Vec<(UserId, i64)>,
    present: &HashSet<UserId>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<(UserId, i64)> = snapshot
        .into_iter()
        .filter(|(user, _)| present.contains(user))
        .collect();

    // stable, so equal scores keep the snapshot's first-seen order
    entries.sort_by_key(|&(_, score)| Reverse(score));

    entries
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (user_id, score))| LeaderboardEntry {
            rank: idx + 1,
            user_id,
            score,
            tier: Tier::for_score(score),
        })
        .collect()
}
