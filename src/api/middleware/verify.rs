use std::sync::LazyLock;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Request};
use axum::middleware::Next;
use axum::response::Response;
use http::{HeaderMap, StatusCode};
use ring::hmac::{self, Key};
use tokio::sync::OnceCell;

use crate::util::constant_time_cmp;
use crate::util::env::Env;

pub const HMAC_PREFIX: &str = "sha256=";
pub const GATEWAY_MESSAGE_ID: &str = "Gateway-Message-Id";
pub const GATEWAY_MESSAGE_TIMESTAMP: &str = "Gateway-Message-Timestamp";
pub const GATEWAY_MESSAGE_SIGNATURE: &str = "Gateway-Message-Signature";

static KEY: LazyLock<OnceCell<Key>> = LazyLock::new(OnceCell::new);
async fn hmac_key() -> Result<&'static Key, StatusCode> {
    KEY.get_or_try_init(|| async {
        let env = Env::get()
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok(Key::new(hmac::HMAC_SHA256, env.gateway_secret.as_bytes()))
    })
    .await
}

/// Request body whose gateway signature has been checked.
#[derive(Clone)]
pub struct VerifiedBody(pub Bytes);

impl VerifiedBody {
    pub fn as_json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(&self.0)
    }
}

impl<S> FromRequest<S> for VerifiedBody
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request(req: Request, _: &S) -> Result<Self, Self::Rejection> {
        req.extensions()
            .get::<VerifiedBody>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Rejects event posts whose HMAC signature does not match the shared
/// gateway secret, stashing the verified body for the handler otherwise.
pub async fn verify_gateway_ident(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let headers = req.headers().clone();
    let body = match extract_body(&mut req).await {
        Ok(bytes) => bytes,
        Err(_) => return Err(StatusCode::BAD_REQUEST),
    };

    let key = hmac_key().await?;
    if let Err(status) = verify_with_key(key, &headers, &body) {
        tracing::error!(%status, "rejected gateway event signature");
        return Err(status);
    }

    req.extensions_mut().insert(VerifiedBody(body));
    Ok(next.run(req).await)
}

async fn extract_body(request: &mut Request) -> Result<Bytes, ()> {
    let body = std::mem::replace(request.body_mut(), Body::empty());
    axum::body::to_bytes(body, usize::MAX).await.map_err(|_| ())
}

fn verify_with_key(key: &Key, headers: &HeaderMap, body: &Bytes) -> Result<(), StatusCode> {
    let (id, timestamp, extern_signature) = get_message_parts(headers)?;

    let signed = hmac::sign(key, &rebuild_message(id, timestamp, body));
    let expected_signature = format!("{}{}", HMAC_PREFIX, hex::encode(signed));

    if constant_time_cmp(extern_signature, &expected_signature) {
        return Ok(());
    }

    Err(StatusCode::FORBIDDEN)
}

fn rebuild_message(id: &str, ts: &str, body: &Bytes) -> Vec<u8> {
    let mut message = Vec::new();
    message.extend_from_slice(id.as_bytes());
    message.extend_from_slice(ts.as_bytes());
    message.extend_from_slice(body);

    message
}

type MessageParts<'a> = (&'a str, &'a str, &'a str);
fn get_message_parts(headers: &HeaderMap) -> Result<MessageParts<'_>, StatusCode> {
    let id = headers
        .get(GATEWAY_MESSAGE_ID)
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let timestamp = headers
        .get(GATEWAY_MESSAGE_TIMESTAMP)
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let signature = headers
        .get(GATEWAY_MESSAGE_SIGNATURE)
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;

    Ok((id, timestamp, signature))
}
