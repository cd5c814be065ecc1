use std::{sync::Arc, time::Duration};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::{TimeDelta, Utc};
use config::{Config, File, FileFormat};
use tower::ServiceExt as _;
use ward_auth::{AuthState, password::hash_password, routes::TokenResponse};
use ward_core::{
  store::{CredentialStore as _, TokenBlacklist as _},
  subject::NewSubject,
};
use ward_store_sqlite::SqliteStore;

use super::*;

fn load(toml: &str) -> Result<ServerConfig, config::ConfigError> {
  Config::builder()
    .add_source(File::from_str(toml, FileFormat::Toml))
    .build()?
    .try_deserialize()
}

// ─── Configuration ────────────────────────────────────────────────────────────

#[test]
fn config_fills_defaults() {
  let cfg = load(r#"secret_key = "s3cret""#).unwrap();
  assert_eq!(cfg.address(), "127.0.0.1:8080");
  assert_eq!(cfg.access_token_lifetime_secs, 3600);
  assert_eq!(cfg.refresh_token_lifetime_secs, 168 * 3600);
  assert_eq!(cfg.purge_interval(), Duration::from_secs(900));
}

#[test]
fn config_requires_secret_key() {
  assert!(load(r#"port = 9000"#).is_err());
}

#[test]
fn codec_uses_configured_lifetimes() {
  let cfg = load(
    r#"
      secret_key = "s3cret"
      access_token_lifetime_secs = 60
      refresh_token_lifetime_secs = 120
    "#,
  )
  .unwrap();
  let codec = cfg.codec();
  assert_eq!(codec.lifetime(ward_core::token::TokenKind::Access), TimeDelta::seconds(60));
  assert_eq!(codec.lifetime(ward_core::token::TokenKind::Refresh), TimeDelta::seconds(120));
}

// ─── Application ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_then_use_the_api() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let subject = store
    .add_subject(NewSubject {
      email: "ada@example.com".into(),
      password_hash: hash_password("hunter2").unwrap(),
      is_client: true,
      email_verified: true,
      ..Default::default()
    })
    .await
    .unwrap();

  let cfg = load(r#"secret_key = "s3cret""#).unwrap();
  let app = app(AuthState::new(Arc::new(store), cfg.codec())).unwrap();

  let res = app
    .clone()
    .oneshot(
      Request::post("/token/client/")
        .header(
          header::AUTHORIZATION,
          format!("Basic {}", B64.encode("ada@example.com:hunter2")),
        )
        .body(Body::empty())
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(res.status(), StatusCode::CREATED);
  let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let tokens: TokenResponse = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(tokens.subject_id, subject.id);

  let res = app
    .oneshot(
      Request::get(format!("/care-team/{}/resources", subject.id))
        .header(header::AUTHORIZATION, format!("Bearer {}", tokens.access_token))
        .body(Body::empty())
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn purge_task_drops_expired_entries() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let now = Utc::now();
  store.revoke("stale", now - TimeDelta::hours(1)).await.unwrap();
  store.revoke("live", now + TimeDelta::hours(1)).await.unwrap();

  let task = spawn_blacklist_purge(store.clone(), Duration::from_millis(10));
  tokio::time::sleep(Duration::from_millis(100)).await;
  task.abort();

  assert!(!store.is_revoked("stale").await.unwrap());
  assert!(store.is_revoked("live").await.unwrap());
}
