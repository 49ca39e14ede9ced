use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::credit::UserId;

pub mod engine;
pub mod lexicon;
pub mod vulgarity;

use engine::EngineHandle;

/// Fixed penalty applied when a blocked term is present.
pub const VULGARITY_DELTA: i64 = -100;
/// Multiplier applied to the external engine's raw score.
pub const ENGINE_SCALE: f64 = 10.0;
/// Multiplier applied to the lexicon token sum.
pub const LEXICON_SCALE: i64 = 5;

pub const VULGARITY_REASON: &str = "Language violation. Watch your mouth, citizen.";

/// An ordinary chat message as relayed by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    pub author_id: UserId,
    pub text: String,
    #[serde(default)]
    pub channel: Option<String>,
}

/// Which backend produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Vulgarity,
    Engine,
    Lexicon,
}

/// One scaled credit delta distilled from one chat message.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub delta: i64,
    pub reason: String,
    pub source: SignalSource,
}

/// Precedence chain over the available sentiment backends.
///
/// Vulgarity short-circuits everything; the external engine (when configured
/// and responsive within its bounded wait) beats the lexicon; a resolved
/// delta of exactly 0 means "no reportable signal" and does not cascade to
/// the next tier.
pub struct SentimentClassifier {
    engine: Option<EngineHandle>,
}

impl SentimentClassifier {
    pub fn new(engine: Option<EngineHandle>) -> Self {
        Self { engine }
    }

    #[instrument(skip(self, text))]
    pub async fn classify(&self, text: &str) -> Option<Verdict> {
        if let Some(term) = vulgarity::contains_blocked_term(text) {
            debug!(term, "blocked term matched");
            return Some(Verdict {
                delta: VULGARITY_DELTA,
                reason: VULGARITY_REASON.to_string(),
                source: SignalSource::Vulgarity,
            });
        }

        if let Some(engine) = &self.engine {
            if let Some(raw) = engine.score(text).await {
                let delta = (raw * ENGINE_SCALE).round() as i64;
                if delta == 0 {
                    return None;
                }

                return Some(Verdict {
                    delta,
                    reason: scaled_reason(delta),
                    source: SignalSource::Engine,
                });
            }

            debug!("engine unavailable, falling back to lexicon");
        }

        let delta = lexicon::score(text) * LEXICON_SCALE;
        if delta == 0 {
            return None;
        }

        Some(Verdict {
            delta,
            reason: scaled_reason(delta),
            source: SignalSource::Lexicon,
        })
    }
}

fn scaled_reason(delta: i64) -> String {
    if delta > 0 {
        "Exemplary speech. The collective approves.".to_string()
    } else {
        "Harmful speech detected by the Ministry of Sentiment.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon_only() -> SentimentClassifier {
        SentimentClassifier::new(None)
    }

    #[tokio::test]
    async fn test_vulgarity_beats_positive_sentiment() {
        // "super" and "paráda" would score positive, the blocked term wins
        let verdict = lexicon_only()
            .classify("super paráda, ale jsi debil")
            .await
            .unwrap();

        assert_eq!(verdict.delta, VULGARITY_DELTA);
        assert_eq!(verdict.source, SignalSource::Vulgarity);
        assert_eq!(verdict.reason, VULGARITY_REASON);
    }

    #[tokio::test]
    async fn test_lexicon_verdict_is_scaled() {
        // super (4) + paráda (4) = 8, scaled by 5
        let verdict = lexicon_only().classify("super paráda").await.unwrap();

        assert_eq!(verdict.delta, 40);
        assert_eq!(verdict.source, SignalSource::Lexicon);
    }

    #[tokio::test]
    async fn test_negation_flows_through_scaling() {
        // ne (-1) + inverted dobrý (-3) = -4, scaled by 5
        let verdict = lexicon_only().classify("ne dobrý").await.unwrap();

        assert_eq!(verdict.delta, -20);
    }

    #[tokio::test]
    async fn test_neutral_message_has_no_signal() {
        assert!(lexicon_only().classify("objektivní zpráva o počasí").await.is_none());
    }

    #[tokio::test]
    async fn test_balanced_message_nets_to_no_signal() {
        // dobrý (3) + špatný (-3) cancel out
        assert!(lexicon_only().classify("dobrý i špatný").await.is_none());
    }
}
