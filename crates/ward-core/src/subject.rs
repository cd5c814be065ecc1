//! Subjects and their credentials.
//!
//! A subject is one identity that may hold several personas at once. Its
//! [`Credential`] carries the password hash and the per-persona block flags.
//! The two are always loaded together as an [`Account`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persona::{BlockScope, Persona};

/// Stable integer key of a subject.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(pub i64);

impl fmt::Display for SubjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// Identity record. Persona flags are independent of each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub id:             SubjectId,
  /// Canonical, lower-cased login name.
  pub email:          String,
  pub is_client:      bool,
  pub is_staff:       bool,
  pub is_provider:    bool,
  /// Employees of the operator; some endpoints are restricted to them.
  pub is_internal:    bool,
  pub deleted:        bool,
  pub email_verified: bool,
  pub created_at:     DateTime<Utc>,
}

impl Subject {
  pub fn holds(&self, persona: Persona) -> bool {
    match persona {
      Persona::Client => self.is_client,
      Persona::Staff => self.is_staff,
      Persona::Provider => self.is_provider,
    }
  }
}

/// Login material and administrative state for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
  pub subject_id:          SubjectId,
  /// argon2 PHC string.
  #[serde(skip_serializing)]
  pub password_hash:       String,
  pub staff_blocked:       bool,
  pub staff_block_reason:  Option<String>,
  pub client_blocked:      bool,
  pub client_block_reason: Option<String>,
  pub last_login:          Option<DateTime<Utc>>,
  /// The refresh token most recently issued to this subject.
  #[serde(skip_serializing)]
  pub refresh_token:       Option<String>,
}

impl Credential {
  pub fn is_blocked(&self, persona: Persona) -> bool {
    match persona.block_scope() {
      BlockScope::Client => self.client_blocked,
      BlockScope::Staff => self.staff_blocked,
    }
  }

  pub fn block_reason(&self, persona: Persona) -> Option<&str> {
    match persona.block_scope() {
      BlockScope::Client => self.client_block_reason.as_deref(),
      BlockScope::Staff => self.staff_block_reason.as_deref(),
    }
  }
}

/// A subject together with its credential, read in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
  pub subject:    Subject,
  pub credential: Credential,
}

impl Account {
  /// Held and not blocked.
  pub fn can_act_as(&self, persona: Persona) -> bool {
    self.subject.holds(persona) && !self.credential.is_blocked(persona)
  }
}

/// Input for registering a subject.
#[derive(Debug, Clone, Default)]
pub struct NewSubject {
  pub email:          String,
  pub password_hash:  String,
  pub is_client:      bool,
  pub is_staff:       bool,
  pub is_provider:    bool,
  pub is_internal:    bool,
  pub email_verified: bool,
}
