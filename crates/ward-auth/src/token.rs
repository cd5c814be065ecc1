//! Signed bearer tokens.
//!
//! Tokens are HS256 JWTs carrying [`Claims`]. A single process-wide secret
//! signs every token; expiry is validated with zero leeway.

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
  errors::ErrorKind,
};
use uuid::Uuid;
use ward_core::{
  persona::Persona,
  subject::SubjectId,
  token::{Claims, TokenKind, TokenPair},
};

use crate::{AuthError, Result};

/// Default lifetime of an access token, in seconds.
pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 60 * 60;

/// Default lifetime of a refresh token, in seconds.
pub const REFRESH_TOKEN_LIFETIME_SECS: i64 = 168 * 60 * 60;

pub struct TokenCodec {
  encoding:         EncodingKey,
  decoding:         DecodingKey,
  validation:       Validation,
  access_lifetime:  TimeDelta,
  refresh_lifetime: TimeDelta,
}

impl TokenCodec {
  pub fn new(secret: &[u8], access_lifetime: TimeDelta, refresh_lifetime: TimeDelta) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      validation,
      access_lifetime,
      refresh_lifetime,
    }
  }

  /// A codec with the default lifetimes.
  pub fn with_secret(secret: &[u8]) -> Self {
    Self::new(
      secret,
      TimeDelta::seconds(ACCESS_TOKEN_LIFETIME_SECS),
      TimeDelta::seconds(REFRESH_TOKEN_LIFETIME_SECS),
    )
  }

  pub fn lifetime(&self, kind: TokenKind) -> TimeDelta {
    match kind {
      TokenKind::Access => self.access_lifetime,
      TokenKind::Refresh => self.refresh_lifetime,
    }
  }

  pub fn issue(&self, subject_id: SubjectId, persona: Persona, kind: TokenKind) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
      subject_id,
      persona,
      kind,
      exp: (now + self.lifetime(kind)).timestamp(),
      iat: now.timestamp(),
      jti: Uuid::new_v4(),
    };
    Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
  }

  pub fn issue_pair(&self, subject_id: SubjectId, persona: Persona) -> Result<TokenPair> {
    Ok(TokenPair {
      access_token:  self.issue(subject_id, persona, TokenKind::Access)?,
      refresh_token: self.issue(subject_id, persona, TokenKind::Refresh)?,
    })
  }

  /// Verify signature and expiry. Does not consult the blacklist and does
  /// not check the token kind.
  pub fn decode(&self, token: &str) -> Result<Claims> {
    match decode::<Claims>(token, &self.decoding, &self.validation) {
      Ok(data) => Ok(data.claims),
      Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
        tracing::debug!("rejected expired token");
        Err(AuthError::Expired)
      }
      Err(e) => {
        tracing::debug!(error = %e, "rejected undecodable token");
        Err(AuthError::Malformed(e.to_string()))
      }
    }
  }
}
