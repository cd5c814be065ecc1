//! Ward HTTP server assembly.
//!
//! Glues the token routes of `ward-auth` and the administration routes of
//! `ward-api` into one axum [`Router`], and owns the runtime configuration.

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tower_http::trace::TraceLayer;
use ward_auth::{
  AuthState, TokenCodec,
  routes::token_router,
  token::{ACCESS_TOKEN_LIFETIME_SECS, REFRESH_TOKEN_LIFETIME_SECS},
};
use ward_core::store::{AuthStore, TokenBlacklist};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and `WARD_*`
/// environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                          String,
  #[serde(default = "defaults::port")]
  pub port:                          u16,
  #[serde(default = "defaults::store_path")]
  pub store_path:                    PathBuf,
  /// HMAC key for signing tokens.
  pub secret_key:                    String,
  #[serde(default = "defaults::access_lifetime")]
  pub access_token_lifetime_secs:    u32,
  #[serde(default = "defaults::refresh_lifetime")]
  pub refresh_token_lifetime_secs:   u32,
  #[serde(default = "defaults::purge_interval")]
  pub blacklist_purge_interval_secs: u64,
}

mod defaults {
  use std::path::PathBuf;

  pub fn host() -> String { "127.0.0.1".into() }
  pub fn port() -> u16 { 8080 }
  pub fn store_path() -> PathBuf { "ward.sqlite3".into() }
  pub fn access_lifetime() -> u32 { super::ACCESS_TOKEN_LIFETIME_SECS as u32 }
  pub fn refresh_lifetime() -> u32 { super::REFRESH_TOKEN_LIFETIME_SECS as u32 }
  pub fn purge_interval() -> u64 { 15 * 60 }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn codec(&self) -> TokenCodec {
    TokenCodec::new(
      self.secret_key.as_bytes(),
      TimeDelta::seconds(i64::from(self.access_token_lifetime_secs)),
      TimeDelta::seconds(i64::from(self.refresh_token_lifetime_secs)),
    )
  }

  pub fn purge_interval(&self) -> Duration {
    Duration::from_secs(self.blacklist_purge_interval_secs.max(1))
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn app<S>(auth: AuthState<S>) -> ward_core::Result<Router>
where
  S: AuthStore + 'static,
{
  Ok(
    Router::new()
      .merge(token_router(auth.clone())?)
      .merge(ward_api::api_router(auth)?)
      .layer(TraceLayer::new_for_http()),
  )
}

// ─── Blacklist maintenance ────────────────────────────────────────────────────

/// Periodically drop blacklist entries whose token has expired anyway.
pub fn spawn_blacklist_purge<S>(store: Arc<S>, every: Duration) -> JoinHandle<()>
where
  S: TokenBlacklist + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match store.purge_expired(Utc::now()).await {
        Ok(0) => {}
        Ok(n) => tracing::info!(purged = n, "blacklist purged"),
        Err(e) => tracing::error!(error = %e, "blacklist purge failed"),
      }
    }
  })
}

#[cfg(test)]
mod tests;
