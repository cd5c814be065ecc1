//! `Authorization` header parsing.

use axum::http::{HeaderMap, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use crate::{AuthError, Result};

/// What the caller presented.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
  /// Username and password; only honoured at login routes.
  Basic { username: String, password: String },
  Bearer(String),
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Basic { username, .. } => f
        .debug_struct("Basic")
        .field("username", username)
        .finish_non_exhaustive(),
      Self::Bearer(_) => f.write_str("Bearer(..)"),
    }
  }
}

impl Credentials {
  /// Parse an `Authorization` header value.
  pub fn parse(value: &str) -> Result<Self> {
    let (scheme, rest) = value
      .trim()
      .split_once(' ')
      .ok_or_else(|| AuthError::Malformed("missing credentials".into()))?;
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case("basic") {
      let decoded = B64
        .decode(rest)
        .map_err(|_| AuthError::Malformed("invalid base64".into()))?;
      let creds = String::from_utf8(decoded)
        .map_err(|_| AuthError::Malformed("credentials are not utf-8".into()))?;
      let (username, password) = creds
        .split_once(':')
        .ok_or_else(|| AuthError::Malformed("missing ':' separator".into()))?;
      Ok(Self::Basic {
        username: username.to_owned(),
        password: password.to_owned(),
      })
    } else if scheme.eq_ignore_ascii_case("bearer") {
      if rest.is_empty() {
        return Err(AuthError::Malformed("empty bearer token".into()));
      }
      Ok(Self::Bearer(rest.to_owned()))
    } else {
      Err(AuthError::Malformed(format!("unsupported scheme {scheme:?}")))
    }
  }

  /// Read credentials from request headers. An absent header is a plain
  /// [`AuthError::Unauthorized`].
  pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
    let value = headers
      .get(header::AUTHORIZATION)
      .ok_or(AuthError::Unauthorized)?
      .to_str()
      .map_err(|_| AuthError::Malformed("non-ascii authorization header".into()))?;
    Self::parse(value)
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn parses_basic() {
    let creds = Credentials::parse(&basic("a@b.com", "pa:ss")).unwrap();
    assert_eq!(creds, Credentials::Basic {
      username: "a@b.com".into(),
      password: "pa:ss".into(),
    });
  }

  #[test]
  fn parses_bearer() {
    let creds = Credentials::parse("Bearer abc.def.ghi").unwrap();
    assert_eq!(creds, Credentials::Bearer("abc.def.ghi".into()));
  }

  #[test]
  fn rejects_bad_input() {
    assert!(matches!(
      Credentials::parse("Basic !!!not-base64!!!"),
      Err(AuthError::Malformed(_))
    ));
    assert!(matches!(Credentials::parse("Digest xyz"), Err(AuthError::Malformed(_))));
    assert!(matches!(Credentials::parse("Bearer"), Err(AuthError::Malformed(_))));
    assert!(matches!(
      Credentials::parse(&format!("Basic {}", B64.encode("nocolon"))),
      Err(AuthError::Malformed(_))
    ));
  }

  #[test]
  fn missing_header_is_unauthorized() {
    let headers = HeaderMap::new();
    assert!(matches!(
      Credentials::from_headers(&headers),
      Err(AuthError::Unauthorized)
    ));

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
    assert!(Credentials::from_headers(&headers).is_ok());
  }
}
