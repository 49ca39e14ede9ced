use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;

mod api;
mod credit;
mod leaderboard;
mod notify;
mod sentiment;
mod util;

use crate::api::server::{AppState, RouteError, start_server};
use crate::credit::ledger::CreditLedger;
use crate::credit::resolver::AuditResolver;
use crate::credit::rules::{AttributionPolicy, PolicyParseErr, ScoringTable};
use crate::notify::{NotificationSink, TracingSink};
use crate::notify::webhook::WebhookSink;
use crate::sentiment::SentimentClassifier;
use crate::sentiment::engine::SentimentEngine;
use crate::util::env::{Env, EnvErr};

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Policy(#[from] PolicyParseErr),

    #[error(transparent)]
    Route(#[from] RouteError),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    util::tracing::init();

    tracing::info!("starting credit service");

    let env = Env::get().await?;

    let policy: AttributionPolicy = env.punitive_attribution.parse()?;
    tracing::info!(?policy, "enforcement attribution policy");

    let ledger = CreditLedger::load(&env.ledger_path).await;
    let resolver = AuditResolver::new(ScoringTable::new(policy));

    let mut handles = Vec::new();

    let engine = match &env.sentiment_engine_cmd {
        Some(cmd) => match SentimentEngine::spawn(cmd, env.engine_timeout()).await {
            Ok((handle, task)) => {
                handles.push(task);
                Some(handle)
            }
            Err(error) => {
                tracing::warn!(%error, "sentiment engine unavailable, lexicon only");
                None
            }
        },
        None => {
            tracing::info!("no sentiment engine configured, lexicon only");
            None
        }
    };

    let sink: Arc<dyn NotificationSink> = match &env.discord_webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url.clone())),
        None => Arc::new(TracingSink),
    };

    let state = Arc::new(AppState {
        ledger,
        resolver,
        classifier: SentimentClassifier::new(engine),
        sink,
    });

    let (tx_server_ready, rx_server_ready) = tokio::sync::mpsc::unbounded_channel::<SocketAddr>();
    handles.extend(start_server(state, tx_server_ready, rx_server_ready).await?);

    _ = join_all(handles).await;

    Ok(())
}
