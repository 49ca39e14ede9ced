use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Advanced sentiment classifier running as a child process.
///
/// The wire protocol is line-delimited JSON over stdin/stdout. The process
/// prints a bare `READY` line once its model is loaded; until then (and after
/// any pipe closes) every request falls back. Requests carry an explicit
/// `id` echoed back in the response, so a slow answer can never be credited
/// to a later question.
pub struct SentimentEngine;

type PendingReply = oneshot::Sender<Option<f64>>;
type EngineRequestMsg = (Uuid, String, PendingReply);

/// Cloneable handle to the task owning the engine process.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineRequestMsg>,
    reply_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    id: Uuid,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EngineResponse {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl SentimentEngine {
    /// Spawns the classifier subprocess and the task that owns it. Returns
    /// immediately; readiness is tracked inside the task so callers are never
    /// blocked on model load.
    pub async fn spawn(cmd: &str, reply_timeout: Duration) -> EngineResult<(EngineHandle, JoinHandle<()>)> {
        let mut parts = cmd.split_whitespace();
        let program = parts.next().ok_or(EngineErr::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or(EngineErr::MissingPipes)?;
        let stdout = child.stdout.take().ok_or(EngineErr::MissingPipes)?;
        let lines = BufReader::new(stdout).lines();

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_engine(child, stdin, lines, rx));

        info!(cmd, "sentiment engine spawned");
        Ok((
            EngineHandle {
                tx,
                reply_timeout,
            },
            task,
        ))
    }
}

impl EngineHandle {
    /// Asks the engine for a raw sentiment score. `None` covers every
    /// unavailability flavor: engine gone, not yet ready, classification
    /// error, or the bounded wait expiring.
    #[instrument(skip(self, text))]
    pub async fn score(&self, text: &str) -> Option<f64> {
        let id = Uuid::new_v4();
        let (reply_tx, reply_rx) = oneshot::channel();

        if self.tx.send((id, text.to_string(), reply_tx)).is_err() {
            debug!("engine task is gone, treating as unavailable");
            return None;
        }

        match timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(score)) => score,
            // the task dropped our reply slot (not ready, write failed)
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(%id, "engine response exceeded bounded wait");
                None
            }
        }
    }
}

async fn run_engine(
    mut child: Child,
    mut stdin: ChildStdin,
    mut lines: Lines<BufReader<ChildStdout>>,
    mut rx: mpsc::UnboundedReceiver<EngineRequestMsg>,
) {
    let mut ready = false;
    let mut pending: HashMap<Uuid, PendingReply> = HashMap::new();

    loop {
        tokio::select! {
            request = rx.recv() => {
                let Some((id, text, reply)) = request else {
                    break;
                };

                if !ready {
                    debug!(%id, "engine not ready, caller falls back");
                    continue;
                }

                // reclaim slots whose callers already timed out
                pending.retain(|_, slot| !slot.is_closed());

                let line = match serde_json::to_string(&EngineRequest { id, text: &text }) {
                    Ok(line) => line,
                    Err(err) => {
                        error!(error = %err, "unserializable engine request");
                        continue;
                    }
                };

                if stdin.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                    warn!(%id, "engine stdin closed, dropping request");
                    continue;
                }

                pending.insert(id, reply);
            }

            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) if !ready && line.trim() == "READY" => {
                        info!("sentiment engine reported ready");
                        ready = true;
                    }
                    Ok(Some(line)) => route_response(&line, &mut pending),
                    Ok(None) | Err(_) => {
                        warn!("engine stdout closed, shutting the engine task down");
                        break;
                    }
                }
            }
        }
    }

    _ = child.kill().await;
}

/// Matches a response line to its pending request by id. Unknown ids and
/// malformed lines are logged and dropped, never misattributed.
fn route_response(line: &str, pending: &mut HashMap<Uuid, PendingReply>) {
    let parsed: EngineResponse = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, line, "malformed engine response");
            return;
        }
    };

    let Some(id) = parsed.id else {
        warn!(line, "engine response without request id");
        return;
    };

    let Some(reply) = pending.remove(&id) else {
        warn!(%id, "engine response for unknown or expired request");
        return;
    };

    if let Some(err) = parsed.error {
        warn!(%id, error = err, "engine reported a classification error");
        _ = reply.send(None);
        return;
    }

    _ = reply.send(parsed.score);
}

pub type EngineResult<T> = core::result::Result<T, EngineErr>;

#[derive(Debug, Error)]
pub enum EngineErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("engine command is empty")]
    EmptyCommand,

    #[error("engine process has no stdin/stdout pipes")]
    MissingPipes,
}
