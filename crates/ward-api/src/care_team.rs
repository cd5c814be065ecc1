//! Handlers for `/care-team` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/care-team/{user_id}` | Invite a delegate; grants start pending |
//! | `GET`    | `/care-team/{user_id}` | Grants given by `user_id` |
//! | `GET`    | `/care-team/member-of/{user_id}` | Grants received by `user_id` |
//! | `GET`    | `/care-team/{user_id}/resources` | Resources the caller may read |
//! | `POST`   | `/care-team/grants/{grant_id}/accept` | Delegate only |
//! | `DELETE` | `/care-team/grants/{grant_id}` | Either party |

use std::{collections::BTreeSet, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use uuid::Uuid;
use ward_auth::{AuthError, Caller, delegation::DelegationAuthority};
use ward_core::{
  grant::ResourceGrant,
  resource::Resource,
  store::{AuthStore, CredentialStore as _},
  subject::SubjectId,
};

use crate::error::ApiError;

// ─── Invite ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InviteBody {
  /// Either `delegate_id` or `delegate_email` must be given.
  pub delegate_id:    Option<SubjectId>,
  pub delegate_email: Option<String>,
  pub resources:      Vec<Resource>,
}

/// `POST /care-team/{user_id}`
pub async fn invite<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<i64>,
  Json(body): Json<InviteBody>,
) -> Result<impl IntoResponse, ApiError> {
  let granter = SubjectId(user_id);
  if body.resources.is_empty() {
    return Err(ApiError::BadRequest("no resources given".into()));
  }

  let delegate = match (body.delegate_id, body.delegate_email) {
    (Some(id), _) => store.get_account(id).await.map_err(ApiError::store)?,
    (None, Some(email)) => store
      .find_account_by_email(&email.trim().to_lowercase())
      .await
      .map_err(ApiError::store)?,
    (None, None) => {
      return Err(ApiError::BadRequest("delegate_id or delegate_email required".into()));
    }
  }
  .filter(|a| !a.subject.deleted)
  .ok_or_else(|| ApiError::NotFound("delegate not found".into()))?;

  let authority = DelegationAuthority::new(store.as_ref());
  let mut grants = Vec::with_capacity(body.resources.len());
  for resource in body.resources.into_iter().collect::<BTreeSet<_>>() {
    grants.push(
      authority
        .invite(granter, delegate.subject.id, resource)
        .await?,
    );
  }
  Ok((StatusCode::CREATED, Json(grants)))
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// `GET /care-team/{user_id}`
pub async fn list_given<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<i64>,
) -> Result<Json<Vec<ResourceGrant>>, ApiError> {
  let grants = DelegationAuthority::new(store.as_ref())
    .list_for_granter(SubjectId(user_id))
    .await?;
  Ok(Json(grants))
}

/// `GET /care-team/member-of/{user_id}`
pub async fn list_member_of<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<i64>,
) -> Result<Json<Vec<ResourceGrant>>, ApiError> {
  let grants = DelegationAuthority::new(store.as_ref())
    .list_for_delegate(SubjectId(user_id))
    .await?;
  Ok(Json(grants))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizedResources {
  pub granter:   SubjectId,
  pub resources: BTreeSet<Resource>,
}

/// `GET /care-team/{user_id}/resources`: echoes what the guard granted.
pub async fn authorized_resources(
  Path(user_id): Path<i64>,
  Caller(ctx): Caller,
) -> Json<AuthorizedResources> {
  let granter = SubjectId(user_id);
  let resources = match ctx.care_team {
    Some(access) => access.resources,
    None if granter == ctx.subject_id() => Resource::iter().collect(),
    None => BTreeSet::new(),
  };
  Json(AuthorizedResources { granter, resources })
}

// ─── Grant lifecycle ─────────────────────────────────────────────────────────

async fn load_grant<S: AuthStore>(store: &S, grant_id: Uuid) -> Result<ResourceGrant, ApiError> {
  DelegationAuthority::new(store)
    .get(grant_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("grant {grant_id} not found")))
}

/// `POST /care-team/grants/{grant_id}/accept`
pub async fn accept<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(grant_id): Path<Uuid>,
  Caller(ctx): Caller,
) -> Result<Json<ResourceGrant>, ApiError> {
  let grant = load_grant(store.as_ref(), grant_id).await?;
  if grant.delegate != ctx.subject_id() {
    return Err(AuthError::Unauthorized.into());
  }

  DelegationAuthority::new(store.as_ref()).accept(grant_id).await?;
  Ok(Json(load_grant(store.as_ref(), grant_id).await?))
}

/// `DELETE /care-team/grants/{grant_id}`: declines a pending grant or
/// revokes an accepted one.
pub async fn revoke<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(grant_id): Path<Uuid>,
  Caller(ctx): Caller,
) -> Result<StatusCode, ApiError> {
  let grant = load_grant(store.as_ref(), grant_id).await?;
  if !grant.involves(ctx.subject_id()) {
    return Err(AuthError::Unauthorized.into());
  }

  DelegationAuthority::new(store.as_ref()).revoke(grant_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
