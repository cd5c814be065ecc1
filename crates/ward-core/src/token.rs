//! Bearer token claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::{persona::Persona, subject::SubjectId};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenKind {
  /// Short-lived; accepted by every guarded endpoint.
  Access,
  /// Long-lived; accepted only by the refresh exchange.
  Refresh,
}

/// The payload signed into every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub subject_id: SubjectId,
  pub persona:    Persona,
  pub kind:       TokenKind,
  /// Expiry, seconds since the Unix epoch.
  pub exp:        i64,
  /// Issued-at, seconds since the Unix epoch.
  pub iat:        i64,
  /// Unique per token so that two tokens minted in the same second differ.
  pub jti:        Uuid,
}

impl Claims {
  pub fn expires_at(&self) -> DateTime<Utc> {
    DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
  }
}

/// An access/refresh pair handed out on login and on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
  pub access_token:  String,
  pub refresh_token: String,
}
