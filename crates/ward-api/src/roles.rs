//! Handlers for `/roles` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/roles/{user_id}` | Roles held by `user_id` |
//! | `POST`   | `/roles/{user_id}` | Body: `{"role":"nurse"}` |
//! | `DELETE` | `/roles/{user_id}/{role}` | 404 if not held |

use std::{collections::BTreeSet, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::Deserialize;
use ward_auth::{AuthError, Caller};
use ward_core::{
  role::Role,
  store::{AuthStore, RoleStore as _},
  subject::SubjectId,
};

use crate::{error::ApiError, subjects::existing};

/// `GET /roles/{user_id}`
pub async fn list<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<i64>,
) -> Result<Json<BTreeSet<Role>>, ApiError> {
  let roles = store
    .roles_for(SubjectId(user_id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(roles))
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub role: Role,
}

/// Administrative roles can only be handed out by a system admin.
fn may_grant(caller_roles: &BTreeSet<Role>, role: Role) -> bool {
  match role {
    Role::StaffAdmin | Role::SystemAdmin => caller_roles.contains(&Role::SystemAdmin),
    _ => true,
  }
}

/// `POST /roles/{user_id}`
pub async fn assign<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<i64>,
  Caller(ctx): Caller,
  Json(body): Json<AssignBody>,
) -> Result<(StatusCode, Json<BTreeSet<Role>>), ApiError> {
  let id = SubjectId(user_id);
  if !may_grant(&ctx.roles, body.role) {
    return Err(AuthError::Unauthorized.into());
  }

  let account = existing(store.as_ref(), id).await?;

  let persona = body.role.persona();
  if !account.subject.holds(persona) {
    return Err(ApiError::BadRequest(format!(
      "role {} requires the {persona} persona",
      body.role
    )));
  }

  store.assign_role(id, body.role).await.map_err(ApiError::store)?;
  tracing::info!(subject = %id, role = %body.role, by = %ctx.subject_id(), "role assigned");

  let roles = store.roles_for(id).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(roles)))
}

/// `DELETE /roles/{user_id}/{role}`
pub async fn revoke<S: AuthStore>(
  State(store): State<Arc<S>>,
  Path((user_id, role)): Path<(i64, String)>,
  Caller(ctx): Caller,
) -> Result<StatusCode, ApiError> {
  let id = SubjectId(user_id);
  let role = Role::parse(&role).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  if !may_grant(&ctx.roles, role) {
    return Err(AuthError::Unauthorized.into());
  }

  if !store.revoke_role(id, role).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("subject {id} does not hold {role}")));
  }
  tracing::info!(subject = %id, %role, by = %ctx.subject_id(), "role revoked");
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_system_admins_grant_admin_roles() {
    let staff_admin = BTreeSet::from([Role::StaffAdmin]);
    let system_admin = BTreeSet::from([Role::SystemAdmin]);

    assert!(may_grant(&staff_admin, Role::Nurse));
    assert!(!may_grant(&staff_admin, Role::StaffAdmin));
    assert!(!may_grant(&staff_admin, Role::SystemAdmin));
    assert!(may_grant(&system_admin, Role::StaffAdmin));
  }
}
