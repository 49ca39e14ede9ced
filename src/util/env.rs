use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OnceCell;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

/// Process configuration, materialized once from the environment (and any
/// `.env` file `dotenvy` can find) on first access.
#[derive(Debug, Clone)]
pub struct Env {
    pub server_api_port: u16,
    pub ledger_path: String,
    pub gateway_secret: String,
    pub punitive_attribution: String,
    pub discord_webhook_url: Option<String>,
    pub sentiment_engine_cmd: Option<String>,
    pub engine_timeout_ms: u64,
}

impl Env {
    pub async fn get() -> EnvResult<&'static Env> {
        ENV_VARS.get_or_try_init(|| async { Env::new() }).await
    }

    fn new() -> EnvResult<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server_api_port: parsed("SERVER_API_PORT")?,
            ledger_path: required("LEDGER_PATH")?,
            gateway_secret: required("GATEWAY_SECRET")?,
            punitive_attribution: optional("PUNITIVE_ATTRIBUTION")
                .unwrap_or_else(|| "target".to_string()),
            discord_webhook_url: optional("DISCORD_WEBHOOK_URL"),
            sentiment_engine_cmd: optional("SENTIMENT_ENGINE_CMD"),
            engine_timeout_ms: optional("ENGINE_TIMEOUT_MS")
                .map(|raw| parse_var("ENGINE_TIMEOUT_MS", raw))
                .transpose()?
                .unwrap_or(1500),
        })
    }

    /// Bounded wait applied to every external classifier call.
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }
}

fn required(name: &'static str) -> EnvResult<String> {
    std::env::var(name).map_err(|_| EnvErr::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|raw| !raw.is_empty())
}

fn parsed<T: FromStr>(name: &'static str) -> EnvResult<T> {
    parse_var(name, required(name)?)
}

fn parse_var<T: FromStr>(name: &'static str, raw: String) -> EnvResult<T> {
    raw.parse().map_err(|_| EnvErr::Invalid {
        var: name,
        value: raw,
    })
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error("missing required environment variable '{0}'")]
    Missing(&'static str),

    #[error("invalid value '{value}' for environment variable '{var}'")]
    Invalid { var: &'static str, value: String },
}
