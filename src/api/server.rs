use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::api::middleware::verify::verify_gateway_ident;
use crate::credit::ledger::CreditLedger;
use crate::credit::resolver::AuditResolver;
use crate::notify::NotificationSink;
use crate::sentiment::SentimentClassifier;
use crate::util::env::{Env, EnvErr};

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

/// Everything a request handler needs, wired once at startup.
pub struct AppState {
    pub ledger: CreditLedger,
    pub resolver: AuditResolver,
    pub classifier: SentimentClassifier,
    pub sink: Arc<dyn NotificationSink>,
}

pub fn router(state: Arc<AppState>) -> Router {
    //
    // gateway event intake, signature-checked
    let event_routes = Router::new()
        .route("/events/audit", post(ingest_audit))
        .route("/events/message", post(ingest_message))
        .route_layer(middleware::from_fn(verify_gateway_ident));

    Router::new()
        .merge(event_routes)
        //
        // general
        .route("/", get(|| async { Response::new(Body::empty()) }))
        //
        // query surface
        .route("/leaderboard", post(leaderboard))
        .route("/credits/{id}", get(credits_by_id))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .with_state(state)
}

#[instrument(skip(state, tx))]
async fn serve(state: Arc<AppState>, tx: UnboundedSender<SocketAddr>) -> Result<(), RouteError> {
    let app = router(state);

    let port = Env::get().await?.server_api_port;
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    _ = tx.send(listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

#[instrument(skip(state, tx, rx))]
pub async fn start_server(
    state: Arc<AppState>,
    tx: UnboundedSender<SocketAddr>,
    mut rx: UnboundedReceiver<SocketAddr>,
) -> Result<Vec<JoinHandle<()>>, RouteError> {
    tracing::info!("starting api server");

    let server_handle = tokio::task::spawn(async move {
        if let Err(error) = serve(state, tx).await {
            tracing::error!(%error, "api server exited");
        }
    });

    let logging_handle = tokio::task::spawn(async move {
        if let Some(addr) = rx.recv().await {
            tracing::info!(
                server_url = &format!("http://127.0.0.1:{}", addr.port()),
                "server ready"
            );
        }
    });

    Ok(vec![server_handle, logging_handle])
}

/// Custom error trace handler for `RouteError`-type responses.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message) = match &self {
            RouteError::Payload(error) => (
                StatusCode::BAD_REQUEST,
                format!("malformed event payload: {error}"),
            ),

            RouteError::Env(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),

            RouteError::Io(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        response.extensions_mut().insert(Arc::new(self));

        response
    }
}
