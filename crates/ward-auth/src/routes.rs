//! Login, refresh and logout routes.

use axum::{
  Json, Router,
  extract::State,
  http::{HeaderMap, StatusCode, header},
  middleware,
  routing::post,
};
use serde::{Deserialize, Serialize};
use ward_core::{
  persona::{AcceptedPersona, Persona},
  policy::Policy,
  store::{AuthStore, CredentialStore as _},
  subject::SubjectId,
};

use crate::{
  AuthError,
  guard::{AuthState, Caller, enforce},
  session::SessionManager,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
  pub subject_id:    SubjectId,
  pub email:         String,
  pub persona:       Persona,
  pub access_token:  String,
  pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
  pub refresh_token: String,
}

/// Build the token router: one login route per persona, the refresh
/// exchange, and logout.
pub fn token_router<S>(auth: AuthState<S>) -> ward_core::Result<Router<()>>
where
  S: AuthStore + 'static,
{
  let login = |persona: AcceptedPersona| -> ward_core::Result<_> {
    let policy = Policy::accepting(persona).build()?;
    Ok(middleware::from_fn_with_state(auth.login_guard(policy), enforce::<S>))
  };
  let logout_policy = Policy::accepting(AcceptedPersona::Any)
    .allow_unverified_email()
    .build()?;

  Ok(
    Router::new()
      .route(
        "/token/client/",
        post(login_client::<S>).route_layer(login(AcceptedPersona::Client)?),
      )
      .route(
        "/token/staff/",
        post(login_staff::<S>).route_layer(login(AcceptedPersona::Staff)?),
      )
      .route(
        "/token/provider/",
        post(login_provider::<S>).route_layer(login(AcceptedPersona::Provider)?),
      )
      .route("/token/refresh", post(refresh::<S>))
      .route(
        "/logout/",
        post(logout::<S>).route_layer(middleware::from_fn_with_state(
          auth.guard(logout_policy),
          enforce::<S>,
        )),
      )
      .with_state(auth),
  )
}

async fn login_as<S: AuthStore>(
  auth: &AuthState<S>,
  caller: Caller,
  persona: Persona,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
  let account = caller.0.account;
  let pair = SessionManager::new(auth.store.as_ref(), auth.codec.as_ref())
    .open(&account, persona)
    .await?;
  Ok((
    StatusCode::CREATED,
    Json(TokenResponse {
      subject_id: account.subject.id,
      email: account.subject.email,
      persona,
      access_token: pair.access_token,
      refresh_token: pair.refresh_token,
    }),
  ))
}

pub async fn login_client<S: AuthStore>(
  State(auth): State<AuthState<S>>,
  caller: Caller,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
  login_as(&auth, caller, Persona::Client).await
}

pub async fn login_staff<S: AuthStore>(
  State(auth): State<AuthState<S>>,
  caller: Caller,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
  login_as(&auth, caller, Persona::Staff).await
}

pub async fn login_provider<S: AuthStore>(
  State(auth): State<AuthState<S>>,
  caller: Caller,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
  login_as(&auth, caller, Persona::Provider).await
}

pub async fn refresh<S: AuthStore>(
  State(auth): State<AuthState<S>>,
  headers: HeaderMap,
  Json(body): Json<RefreshRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
  let user_agent = headers
    .get(header::USER_AGENT)
    .and_then(|v| v.to_str().ok());
  let manager = SessionManager::new(auth.store.as_ref(), auth.codec.as_ref());
  let pair = manager.refresh(&body.refresh_token, user_agent).await?;

  let claims = auth.codec.decode(&pair.access_token)?;
  let account = auth
    .store
    .get_account(claims.subject_id)
    .await
    .map_err(AuthError::store)?
    .ok_or(AuthError::Unauthorized)?;

  Ok((
    StatusCode::CREATED,
    Json(TokenResponse {
      subject_id: account.subject.id,
      email: account.subject.email,
      persona: claims.persona,
      access_token: pair.access_token,
      refresh_token: pair.refresh_token,
    }),
  ))
}

pub async fn logout<S: AuthStore>(
  State(auth): State<AuthState<S>>,
  Caller(ctx): Caller,
) -> Result<StatusCode, AuthError> {
  SessionManager::new(auth.store.as_ref(), auth.codec.as_ref())
    .close(&ctx)
    .await?;
  Ok(StatusCode::OK)
}
