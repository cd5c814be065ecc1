//! Authentication failures and their HTTP rendering.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Every way a request can fail to authenticate or authorize.
///
/// All variants are denials; none of them lets a request through.
#[derive(Debug, Error)]
pub enum AuthError {
  #[error("unauthorized")]
  Unauthorized,

  /// Unparseable `Authorization` header or undecodable token.
  #[error("malformed credentials: {0}")]
  Malformed(String),

  /// Signature valid, but the token has lapsed.
  #[error("token expired")]
  Expired,

  /// The persona the caller is acting as has been blocked by an
  /// administrator.
  #[error("persona blocked")]
  Blocked { reason: Option<String> },

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("token signing failed: {0}")]
  Signing(#[from] jsonwebtoken::errors::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AuthError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = AuthError> = std::result::Result<T, E>;

fn unauthorized(body: serde_json::Value) -> Response {
  let mut res = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
  res.headers_mut().insert(
    header::WWW_AUTHENTICATE,
    HeaderValue::from_static("Bearer realm=\"ward\""),
  );
  res
}

impl IntoResponse for AuthError {
  fn into_response(self) -> Response {
    match self {
      AuthError::Unauthorized | AuthError::Malformed(_) | AuthError::Expired => {
        unauthorized(json!({ "error": "unauthorized" }))
      }
      AuthError::Blocked { reason } => unauthorized(json!({
        "error":  "this account has been blocked, please contact support",
        "reason": reason,
      })),
      AuthError::BadRequest(msg) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
      }
      AuthError::Signing(e) => {
        tracing::error!(error = %e, "failed to sign token");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          Json(json!({ "error": "internal error" })),
        )
          .into_response()
      }
      AuthError::Store(e) => {
        tracing::error!(error = %e, "store unavailable during authorization");
        (
          StatusCode::SERVICE_UNAVAILABLE,
          Json(json!({ "error": "service unavailable" })),
        )
          .into_response()
      }
    }
  }
}
