//! Handlers for `/subjects` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/subjects/{user_id}` | Subject plus credential state |
//! | `DELETE` | `/subjects/{user_id}` | Soft delete |
//! | `GET`    | `/subjects/{user_id}/logins` | Optional `?limit=<n>`, newest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use ward_auth::Caller;
use ward_core::{
  audit::LoginEvent,
  store::{AuthStore, CredentialStore},
  subject::{Account, Credential, Subject, SubjectId},
};

use crate::error::ApiError;

/// Load a subject that has not been deleted, or 404.
pub(crate) async fn existing<S: CredentialStore>(
  store: &S,
  id: SubjectId,
) -> Result<Account, ApiError> {
  store
    .get_account(id)
    .await
    .map_err(ApiError::store)?
    .filter(|a| !a.subject.deleted)
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SubjectView {
  pub subject:    Subject,
  pub credential: Credential,
}

/// `GET /subjects/{user_id}`
pub async fn get_one<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<i64>,
) -> Result<Json<SubjectView>, ApiError> {
  let account = existing(store.as_ref(), SubjectId(user_id)).await?;
  Ok(Json(SubjectView {
    subject:    account.subject,
    credential: account.credential,
  }))
}

// ─── Soft delete ─────────────────────────────────────────────────────────────

/// `DELETE /subjects/{user_id}`
pub async fn delete<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<i64>,
  Caller(ctx): Caller,
) -> Result<StatusCode, ApiError> {
  let id = existing(store.as_ref(), SubjectId(user_id)).await?.subject.id;
  store.mark_deleted(id).await.map_err(ApiError::store)?;
  tracing::info!(subject = %id, by = %ctx.subject_id(), "subject deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Login history ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginParams {
  pub limit: Option<usize>,
}

const DEFAULT_LOGIN_LIMIT: usize = 50;

/// `GET /subjects/{user_id}/logins[?limit=<n>]`
pub async fn logins<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<i64>,
  Query(params): Query<LoginParams>,
) -> Result<Json<Vec<LoginEvent>>, ApiError> {
  let events = store
    .login_events(
      Some(SubjectId(user_id)),
      params.limit.unwrap_or(DEFAULT_LOGIN_LIMIT),
    )
    .await
    .map_err(ApiError::store)?;
  Ok(Json(events))
}
