use std::collections::HashSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::middleware::verify::VerifiedBody;
use crate::api::server::{AppState, JsonResult};
use crate::credit::UserId;
use crate::credit::event::AuditEvent;
use crate::credit::resolver::Resolution;
use crate::leaderboard::{self, DEFAULT_LIMIT, LeaderboardEntry, Tier};
use crate::notify::{CreditNotice, NoticeOrigin};
use crate::sentiment::{MessageEvent, SignalSource};

/// Scores one relayed audit-trail entry and reports the resolution back to
/// the relay. Scored resolutions also go out through the notification sink;
/// the ledger is committed either way by the time we respond.
#[instrument(skip(state, body))]
pub async fn ingest_audit(
    State(state): State<Arc<AppState>>,
    body: VerifiedBody,
) -> JsonResult<Resolution> {
    let event: AuditEvent = body.as_json()?;
    let resolution = state.resolver.resolve(&state.ledger, &event).await;

    if let Resolution::Scored {
        kind,
        recipient_id,
        delta,
        reason,
        new_total,
    } = &resolution
    {
        state
            .sink
            .deliver(&CreditNotice::new(
                recipient_id.clone(),
                *delta,
                reason.clone(),
                *new_total,
                NoticeOrigin::Audit { action: *kind },
            ))
            .await;
    }

    Ok(Json(resolution))
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    Scored {
        author_id: UserId,
        delta: i64,
        reason: String,
        source: SignalSource,
        new_total: i64,
    },
    NoSignal,
}

/// Runs one chat message through the sentiment chain and applies whatever
/// delta comes out of it to the author.
#[instrument(skip(state, body))]
pub async fn ingest_message(
    State(state): State<Arc<AppState>>,
    body: VerifiedBody,
) -> JsonResult<MessageOutcome> {
    let message: MessageEvent = body.as_json()?;
    tracing::debug!(author = %message.author_id, channel = ?message.channel, "scoring relayed message");

    let Some(verdict) = state.classifier.classify(&message.text).await else {
        return Ok(Json(MessageOutcome::NoSignal));
    };

    let new_total = state.ledger.modify(&message.author_id, verdict.delta).await;

    state
        .sink
        .deliver(&CreditNotice::new(
            message.author_id.clone(),
            verdict.delta,
            verdict.reason.clone(),
            new_total,
            NoticeOrigin::Message {
                source: verdict.source,
            },
        ))
        .await;

    Ok(Json(MessageOutcome::Scored {
        author_id: message.author_id,
        delta: verdict.delta,
        reason: verdict.reason,
        source: verdict.source,
        new_total,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardRequest {
    /// Users currently present in the viewing context; everyone else is
    /// filtered out even when the ledger knows them.
    pub present: Vec<UserId>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[instrument(skip(state, request))]
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LeaderboardRequest>,
) -> JsonResult<Vec<LeaderboardEntry>> {
    let snapshot = state.ledger.snapshot().await;
    let present: HashSet<UserId> = request.present.into_iter().collect();

    Ok(Json(leaderboard::rank(
        snapshot,
        &present,
        request.limit.unwrap_or(DEFAULT_LIMIT),
    )))
}

#[derive(Debug, Serialize)]
pub struct CreditBalance {
    pub user_id: UserId,
    pub score: i64,
    pub tier: Tier,
}

#[instrument(skip(state))]
pub async fn credits_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<CreditBalance> {
    let user = UserId(id);
    let score = state.ledger.get(&user).await;

    Ok(Json(CreditBalance {
        user_id: user,
        score,
        tier: Tier::for_score(score),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::event::ActionKind;
    use crate::credit::ledger::{BASELINE_SCORE, CreditLedger};
    use crate::credit::resolver::AuditResolver;
    use crate::credit::rules::{AttributionPolicy, ScoringTable};
    use crate::notify::NotificationSink;
    use crate::sentiment::{SentimentClassifier, VULGARITY_DELTA};
    use async_trait::async_trait;
    use axum::body::Bytes;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<CreditNotice>>);

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notice: &CreditNotice) {
            self.0.lock().await.push(notice.clone());
        }
    }

    async fn test_state(dir: &tempfile::TempDir) -> (Arc<AppState>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let state = Arc::new(AppState {
            ledger: CreditLedger::load(dir.path().join("credits.json")).await,
            resolver: AuditResolver::new(ScoringTable::new(AttributionPolicy::Target)),
            classifier: SentimentClassifier::new(None),
            sink: sink.clone(),
        });

        (state, sink)
    }

    fn body_of<T: Serialize>(payload: &T) -> VerifiedBody {
        VerifiedBody(Bytes::from(serde_json::to_vec(payload).unwrap()))
    }

    #[tokio::test]
    async fn test_ingest_audit_scores_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let (state, sink) = test_state(&dir).await;

        let event = AuditEvent {
            kind: ActionKind::MemberKick,
            executor_id: Some("mod".into()),
            target_id: Some("citizen".into()),
            reason: None,
            changes: Vec::new(),
        };

        let Json(resolution) = ingest_audit(State(state.clone()), body_of(&event))
            .await
            .unwrap();

        match resolution {
            Resolution::Scored { new_total, .. } => {
                assert_eq!(new_total, BASELINE_SCORE - 500);
            }
            Resolution::Unscored { .. } => panic!("expected a scored resolution"),
        }

        let notices = sink.0.lock().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].recipient_id, "citizen".into());
        assert_eq!(notices[0].delta, -500);
    }

    #[tokio::test]
    async fn test_ingest_audit_unknown_kind_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (state, sink) = test_state(&dir).await;

        let Json(resolution) = ingest_audit(
            State(state.clone()),
            VerifiedBody(Bytes::from_static(
                br#"{ "kind": "nonsense_event", "executor_id": "mod" }"#,
            )),
        )
        .await
        .unwrap();

        assert!(matches!(resolution, Resolution::Unscored { .. }));
        assert!(sink.0.lock().await.is_empty());
        assert!(state.ledger.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_message_vulgarity_scores_author() {
        let dir = tempfile::tempdir().unwrap();
        let (state, sink) = test_state(&dir).await;

        let message = serde_json::json!({
            "author_id": "potty_mouth",
            "text": "super den, ty kokote"
        });

        let Json(outcome) = ingest_message(State(state.clone()), body_of(&message))
            .await
            .unwrap();

        match outcome {
            MessageOutcome::Scored {
                delta, new_total, ..
            } => {
                assert_eq!(delta, VULGARITY_DELTA);
                assert_eq!(new_total, BASELINE_SCORE + VULGARITY_DELTA);
            }
            MessageOutcome::NoSignal => panic!("expected the vulgarity filter to trip"),
        }

        assert_eq!(sink.0.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_message_neutral_text_mutates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (state, sink) = test_state(&dir).await;

        let message = serde_json::json!({
            "author_id": "quiet_type",
            "text": "sejdeme se v sedm"
        });

        let Json(outcome) = ingest_message(State(state.clone()), body_of(&message))
            .await
            .unwrap();

        assert!(matches!(outcome, MessageOutcome::NoSignal));
        assert!(sink.0.lock().await.is_empty());
        assert!(state.ledger.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_filters_and_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;

        state.ledger.modify(&"a".into(), 600).await;
        state.ledger.modify(&"b".into(), 0).await;
        state.ledger.modify(&"c".into(), -1005).await;
        state.ledger.modify(&"d".into(), -1).await;
        state.ledger.modify(&"lurker".into(), 9000).await;

        let request = LeaderboardRequest {
            present: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            limit: None,
        };

        let Json(ranked) = leaderboard(State(state.clone()), Json(request)).await.unwrap();

        let order: Vec<&str> = ranked.iter().map(|entry| entry.user_id.0.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "d", "c"]);

        let tiers: Vec<Tier> = ranked.iter().map(|entry| entry.tier).collect();
        assert_eq!(
            tiers,
            vec![Tier::Top, Tier::Good, Tier::Neutral, Tier::Critical]
        );
    }

    #[tokio::test]
    async fn test_credits_by_id_initializes_unseen_user() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;

        let Json(balance) = credits_by_id(State(state.clone()), Path("fresh".to_string()))
            .await
            .unwrap();

        assert_eq!(balance.score, BASELINE_SCORE);
        assert_eq!(balance.tier, Tier::Good);
    }

    #[tokio::test]
    async fn test_malformed_audit_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir).await;

        let result = ingest_audit(
            State(state),
            VerifiedBody(Bytes::from_static(b"not json")),
        )
        .await;

        assert!(result.is_err());
    }
}
