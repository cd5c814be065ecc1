//! Handlers for `/blocks` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/blocks/{user_id}` | Body: `{"scope":"staff","reason":"..."}` |
//! | `DELETE` | `/blocks/{user_id}/{scope}` | Lift a block |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::Deserialize;
use ward_auth::Caller;
use ward_core::{
  persona::BlockScope,
  store::{AuthStore, CredentialStore as _},
  subject::SubjectId,
};

use crate::{error::ApiError, subjects::existing};

#[derive(Debug, Deserialize)]
pub struct BlockBody {
  pub scope:  BlockScope,
  /// Shown to the blocked subject when they are refused.
  pub reason: Option<String>,
}

/// `POST /blocks/{user_id}`
pub async fn block<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<i64>,
  Caller(ctx): Caller,
  Json(body): Json<BlockBody>,
) -> Result<StatusCode, ApiError> {
  let id = SubjectId(user_id);
  if id == ctx.subject_id() {
    return Err(ApiError::BadRequest("cannot block yourself".into()));
  }

  existing(store.as_ref(), id).await?;
  store.block(id, body.scope, body.reason).await.map_err(ApiError::store)?;
  tracing::warn!(subject = %id, scope = %body.scope, by = %ctx.subject_id(), "persona blocked");
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /blocks/{user_id}/{scope}`
pub async fn unblock<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path((user_id, scope)): Path<(i64, BlockScope)>,
  Caller(ctx): Caller,
) -> Result<StatusCode, ApiError> {
  let id = existing(store.as_ref(), SubjectId(user_id)).await?.subject.id;
  store.unblock(id, scope).await.map_err(ApiError::store)?;
  tracing::info!(subject = %id, %scope, by = %ctx.subject_id(), "persona unblocked");
  Ok(StatusCode::NO_CONTENT)
}
