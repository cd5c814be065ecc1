//! axum integration: the guard middleware and the [`Caller`] extractor.
//!
//! Every guarded route is layered with [`enforce`] and its own
//! [`GuardState`]:
//!
//! ```rust,ignore
//! .route(
//!   "/care-team/{user_id}",
//!   get(list::<S>).route_layer(middleware::from_fn_with_state(
//!     auth.guard(policy),
//!     enforce::<S>,
//!   )),
//! )
//! ```

use std::sync::Arc;

use axum::{
  extract::{FromRequestParts, RawPathParams, Request, State},
  http::{Method, header, request::Parts},
  middleware::Next,
  response::{IntoResponse, Response},
};
use ward_core::{policy::{AccessMode, Policy}, store::AuthStore, subject::SubjectId};

use crate::{
  AuthError,
  credentials::Credentials,
  engine::{AccessPolicyEngine, AuthContext, RequestFacts},
  token::TokenCodec,
};

/// The path segment naming the subject a request addresses.
pub const TARGET_PARAM: &str = "user_id";

// ─── State ───────────────────────────────────────────────────────────────────

/// Process-wide authentication dependencies.
pub struct AuthState<S> {
  pub store: Arc<S>,
  pub codec: Arc<TokenCodec>,
}

impl<S> Clone for AuthState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), codec: self.codec.clone() }
  }
}

impl<S> AuthState<S> {
  pub fn new(store: Arc<S>, codec: TokenCodec) -> Self {
    Self { store, codec: Arc::new(codec) }
  }

  /// Guard state for a bearer-token route.
  pub fn guard(&self, policy: Policy) -> GuardState<S> {
    GuardState { auth: self.clone(), policy: Arc::new(policy), login: false }
  }

  /// Guard state for a password login route.
  pub fn login_guard(&self, policy: Policy) -> GuardState<S> {
    GuardState { auth: self.clone(), policy: Arc::new(policy), login: true }
  }
}

/// One route's policy plus the shared dependencies.
pub struct GuardState<S> {
  pub auth:   AuthState<S>,
  pub policy: Arc<Policy>,
  /// Login routes take Basic credentials; every other route takes Bearer.
  pub login:  bool,
}

impl<S> Clone for GuardState<S> {
  fn clone(&self) -> Self {
    Self {
      auth:   self.auth.clone(),
      policy: self.policy.clone(),
      login:  self.login,
    }
  }
}

// ─── Middleware ──────────────────────────────────────────────────────────────

fn access_mode(method: &Method) -> AccessMode {
  if *method == Method::GET || *method == Method::HEAD {
    AccessMode::Read
  } else {
    AccessMode::Write
  }
}

/// Read the numeric `user_id` path parameter, if the route has one.
async fn target_of(parts: &mut Parts) -> Result<Option<SubjectId>, AuthError> {
  let Ok(params) = RawPathParams::from_request_parts(parts, &()).await else {
    return Ok(None);
  };
  params
    .iter()
    .find(|(name, _)| *name == TARGET_PARAM)
    .map(|(_, value)| {
      value
        .parse::<i64>()
        .map(SubjectId)
        .map_err(|_| AuthError::BadRequest(format!("invalid user_id: {value:?}")))
    })
    .transpose()
}

async fn authorize_parts<S: AuthStore>(
  guard: &GuardState<S>,
  parts: &mut Parts,
) -> Result<AuthContext, AuthError> {
  let target = target_of(parts).await?;
  let credentials = Credentials::from_headers(&parts.headers)?;

  match (&credentials, guard.login) {
    (Credentials::Basic { .. }, true) | (Credentials::Bearer(_), false) => {}
    (Credentials::Basic { .. }, false) => {
      return Err(AuthError::Malformed("basic credentials outside login".into()));
    }
    (Credentials::Bearer(_), true) => {
      return Err(AuthError::Malformed("login requires basic credentials".into()));
    }
  }

  let user_agent = parts
    .headers
    .get(header::USER_AGENT)
    .and_then(|v| v.to_str().ok());
  let facts = RequestFacts { mode: access_mode(&parts.method), target, user_agent };

  AccessPolicyEngine::new(guard.auth.store.as_ref(), guard.auth.codec.as_ref())
    .authorize(&guard.policy, credentials, &facts)
    .await
}

/// Authorize the request against the route's policy, or reject it.
///
/// On success the resulting [`AuthContext`] is stored in the request
/// extensions for [`Caller`] to pick up.
pub async fn enforce<S>(
  State(guard): State<GuardState<S>>,
  request: Request,
  next: Next,
) -> Response
where
  S: AuthStore + 'static,
{
  let (mut parts, body) = request.into_parts();

  match authorize_parts(&guard, &mut parts).await {
    Ok(ctx) => {
      parts.extensions.insert(ctx);
      next.run(Request::from_parts(parts, body)).await
    }
    Err(e) => e.into_response(),
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// The authorized caller of a guarded route.
pub struct Caller(pub AuthContext);

impl<St> FromRequestParts<St> for Caller
where
  St: Send + Sync,
{
  type Rejection = AuthError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<AuthContext>()
      .cloned()
      .map(Caller)
      .ok_or(AuthError::Unauthorized)
  }
}
