use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use super::UserId;

/// Starting balance for any user the ledger has never seen.
pub const BASELINE_SCORE: i64 = 1000;

/// Persistent per-user credit store.
///
/// Entries are created lazily at the baseline, never deleted, and keep their
/// first-seen order (the leaderboard's tie-break). The whole map is rewritten
/// to a single JSON document on every mutation and the write is awaited
/// before the call returns, so a returned total is durably recorded except
/// when the write itself fails (logged, in-memory state stays authoritative).
#[derive(Debug)]
pub struct CreditLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    scores: HashMap<UserId, i64>,
    order: Vec<UserId>,
}

impl LedgerState {
    /// Current score for `user`, inserting the baseline entry when unseen.
    fn entry(&mut self, user: &UserId) -> i64 {
        if let Some(score) = self.scores.get(user) {
            *score
        } else {
            self.scores.insert(user.clone(), BASELINE_SCORE);
            self.order.push(user.clone());
            BASELINE_SCORE
        }
    }

    fn to_document(&self) -> Map<String, Value> {
        self.order
            .iter()
            .map(|user| {
                let score = self.scores.get(user).copied().unwrap_or(BASELINE_SCORE);
                (user.0.clone(), Value::from(score))
            })
            .collect()
    }
}

impl CreditLedger {
    /// Reads the ledger document at `path`, failing open to an empty ledger
    /// when the file is missing or unreadable.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(document) => {
                    let mut state = LedgerState::default();
                    for (user, score) in document {
                        let Some(score) = score.as_i64() else {
                            warn!(%user, "skipping non-integer ledger entry");
                            continue;
                        };

                        let user = UserId(user);
                        state.scores.insert(user.clone(), score);
                        state.order.push(user);
                    }

                    state
                }
                Err(error) => {
                    warn!(%error, path = %path.display(), "ledger document unreadable, starting empty");
                    LedgerState::default()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => LedgerState::default(),
            Err(error) => {
                warn!(%error, path = %path.display(), "ledger read failed, starting empty");
                LedgerState::default()
            }
        };

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Current score for `user`; an unseen user is initialized to
    /// [`BASELINE_SCORE`] and the initialization is persisted.
    #[instrument(skip(self))]
    pub async fn get(&self, user: &UserId) -> i64 {
        let mut state = self.state.lock().await;

        let known = state.scores.contains_key(user);
        let score = state.entry(user);
        if !known {
            self.persist(&state).await;
        }

        score
    }

    /// Applies `delta` (any sign, including 0) and returns the new total.
    #[instrument(skip(self))]
    pub async fn modify(&self, user: &UserId, delta: i64) -> i64 {
        let mut state = self.state.lock().await;

        let updated = state.entry(user) + delta;
        state.scores.insert(user.clone(), updated);
        self.persist(&state).await;

        updated
    }

    /// Snapshot of every known entry in first-seen order.
    pub async fn snapshot(&self) -> Vec<(UserId, i64)> {
        let state = self.state.lock().await;

        state
            .order
            .iter()
            .map(|user| {
                let score = state.scores.get(user).copied().unwrap_or(BASELINE_SCORE);
                (user.clone(), score)
            })
            .collect()
    }

    async fn persist(&self, state: &LedgerState) {
        let raw = match serde_json::to_string_pretty(&state.to_document()) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "ledger serialization failed, skipping write");
                return;
            }
        };

        if let Err(error) = tokio::fs::write(&self.path, raw).await {
            warn!(
                %error,
                path = %self.path.display(),
                "ledger write failed, in-memory state stays authoritative"
            );
        }
    }
}
