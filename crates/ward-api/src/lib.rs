//! JSON administration API for Ward.
//!
//! Exposes an axum [`Router`] over any [`ward_core::store::AuthStore`]. Every
//! route is guarded by [`ward_auth::enforce`] with its own policy; handlers
//! only run for callers the engine has admitted.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(ward_api::api_router(auth.clone())?)
//! ```

pub mod blocks;
pub mod care_team;
pub mod error;
pub mod roles;
pub mod subjects;

use axum::{
  Router, middleware,
  routing::{delete, get, post},
};
use strum::IntoEnumIterator as _;
use ward_auth::{AuthState, enforce};
use ward_core::{
  persona::AcceptedPersona::{self, Client, Provider, Staff, StaffSelf},
  policy::{Policy, PolicyBuilder},
  resource::Resource,
  role::Role,
  store::AuthStore,
};

pub use error::ApiError;

/// Staff roles allowed to look after other subjects' accounts.
const SUPPORT_ROLES: [Role; 3] = [Role::StaffAdmin, Role::SystemAdmin, Role::ClientServices];

const ADMIN_ROLES: [Role; 2] = [Role::StaffAdmin, Role::SystemAdmin];

fn accepting<const N: usize>(personas: [AcceptedPersona; N]) -> PolicyBuilder {
  Policy::builder().personas(personas)
}

/// Build the API router.
///
/// Fails if a route's policy is misdeclared.
pub fn api_router<S>(auth: AuthState<S>) -> ward_core::Result<Router<()>>
where
  S: AuthStore + 'static,
{
  let guard = |policy: Policy| middleware::from_fn_with_state(auth.guard(policy), enforce::<S>);

  let care_team_owner = accepting([Client, Staff]).roles(SUPPORT_ROLES).build()?;
  let care_team_member = accepting([Client, StaffSelf]).build()?;
  let care_team_party = accepting([Client, Staff, Provider]).build()?;
  let delegated_read = accepting([Client, Staff, Provider])
    .resources(Resource::iter())
    .build()?;

  let role_viewer = accepting([StaffSelf, Staff]).roles(ADMIN_ROLES).build()?;
  let role_admin = accepting([Staff]).roles(ADMIN_ROLES).build()?;
  let block_admin = accepting([Staff]).roles(SUPPORT_ROLES).build()?;

  let subject_viewer = accepting([Client, StaffSelf, Staff]).roles(SUPPORT_ROLES).build()?;
  let subject_deleter = accepting([Client, StaffSelf, Staff])
    .roles([Role::SystemAdmin])
    .allow_unverified_email()
    .build()?;
  let login_viewer = accepting([StaffSelf, Staff])
    .roles([Role::SystemAdmin])
    .internal_only()
    .build()?;

  Ok(
    Router::new()
      // Care team
      .route(
        "/care-team/{user_id}",
        post(care_team::invite::<S>)
          .route_layer(guard(accepting([Client]).build()?))
          .merge(get(care_team::list_given::<S>).route_layer(guard(care_team_owner))),
      )
      .route(
        "/care-team/member-of/{user_id}",
        get(care_team::list_member_of::<S>).route_layer(guard(care_team_member)),
      )
      .route(
        "/care-team/{user_id}/resources",
        get(care_team::authorized_resources).route_layer(guard(delegated_read)),
      )
      .route(
        "/care-team/grants/{grant_id}/accept",
        post(care_team::accept::<S>).route_layer(guard(care_team_party.clone())),
      )
      .route(
        "/care-team/grants/{grant_id}",
        delete(care_team::revoke::<S>).route_layer(guard(care_team_party)),
      )
      // Roles
      .route(
        "/roles/{user_id}",
        get(roles::list::<S>)
          .route_layer(guard(role_viewer))
          .merge(post(roles::assign::<S>).route_layer(guard(role_admin.clone()))),
      )
      .route(
        "/roles/{user_id}/{role}",
        delete(roles::revoke::<S>).route_layer(guard(role_admin)),
      )
      // Blocks
      .route(
        "/blocks/{user_id}",
        post(blocks::block::<S>).route_layer(guard(block_admin.clone())),
      )
      .route(
        "/blocks/{user_id}/{scope}",
        delete(blocks::unblock::<S>).route_layer(guard(block_admin)),
      )
      // Subjects
      .route(
        "/subjects/{user_id}",
        get(subjects::get_one::<S>)
          .route_layer(guard(subject_viewer))
          .merge(delete(subjects::delete::<S>).route_layer(guard(subject_deleter))),
      )
      .route(
        "/subjects/{user_id}/logins",
        get(subjects::logins::<S>).route_layer(guard(login_viewer)),
      )
      .with_state(auth.store.clone()),
  )
}

#[cfg(test)]
mod tests;
