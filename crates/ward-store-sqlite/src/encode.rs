//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, except blacklist expiry which
//! is compared in SQL and therefore stored as Unix seconds. Enums are stored
//! under their snake_case names. UUIDs are stored as hyphenated lowercase
//! strings.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use ward_core::{
  audit::{LoginEvent, LoginEventKind, LoginOutcome},
  grant::{GrantStatus, ResourceGrant},
  resource::Resource,
  subject::{Account, Credential, Subject, SubjectId},
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Tokens ───────────────────────────────────────────────────────────────────

/// Blacklisted tokens are keyed by digest so the table never holds a usable
/// credential.
pub fn token_digest(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

// ─── LoginEvent enums ─────────────────────────────────────────────────────────

pub fn decode_event_kind(s: &str) -> Result<LoginEventKind> {
  match s {
    "login" => Ok(LoginEventKind::Login),
    "refresh" => Ok(LoginEventKind::Refresh),
    other => Err(Error::Decode(format!("unknown login event kind: {other:?}"))),
  }
}

pub fn decode_outcome(s: &str) -> Result<LoginOutcome> {
  match s {
    "success" => Ok(LoginOutcome::Success),
    "failure" => Ok(LoginOutcome::Failure),
    other => Err(Error::Decode(format!("unknown login outcome: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawAccount`]'s field order.
pub const ACCOUNT_COLUMNS: &str = "
  s.subject_id, s.email, s.is_client, s.is_staff, s.is_provider,
  s.is_internal, s.deleted, s.email_verified, s.created_at,
  c.password_hash, c.staff_blocked, c.staff_block_reason,
  c.client_blocked, c.client_block_reason, c.last_login, c.refresh_token";

/// Raw values read from `subjects` joined with `credentials`.
pub struct RawAccount {
  pub subject_id:          i64,
  pub email:               String,
  pub is_client:           bool,
  pub is_staff:            bool,
  pub is_provider:         bool,
  pub is_internal:         bool,
  pub deleted:             bool,
  pub email_verified:      bool,
  pub created_at:          String,
  pub password_hash:       String,
  pub staff_blocked:       bool,
  pub staff_block_reason:  Option<String>,
  pub client_blocked:      bool,
  pub client_block_reason: Option<String>,
  pub last_login:          Option<String>,
  pub refresh_token:       Option<String>,
}

impl RawAccount {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:          row.get(0)?,
      email:               row.get(1)?,
      is_client:           row.get(2)?,
      is_staff:            row.get(3)?,
      is_provider:         row.get(4)?,
      is_internal:         row.get(5)?,
      deleted:             row.get(6)?,
      email_verified:      row.get(7)?,
      created_at:          row.get(8)?,
      password_hash:       row.get(9)?,
      staff_blocked:       row.get(10)?,
      staff_block_reason:  row.get(11)?,
      client_blocked:      row.get(12)?,
      client_block_reason: row.get(13)?,
      last_login:          row.get(14)?,
      refresh_token:       row.get(15)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    let id = SubjectId(self.subject_id);
    let subject = Subject {
      id,
      email:          self.email,
      is_client:      self.is_client,
      is_staff:       self.is_staff,
      is_provider:    self.is_provider,
      is_internal:    self.is_internal,
      deleted:        self.deleted,
      email_verified: self.email_verified,
      created_at:     decode_dt(&self.created_at)?,
    };
    let credential = Credential {
      subject_id:          id,
      password_hash:       self.password_hash,
      staff_blocked:       self.staff_blocked,
      staff_block_reason:  self.staff_block_reason,
      client_blocked:      self.client_blocked,
      client_block_reason: self.client_block_reason,
      last_login:          self.last_login.as_deref().map(decode_dt).transpose()?,
      refresh_token:       self.refresh_token,
    };
    Ok(Account { subject, credential })
  }
}

/// Column list matching [`RawGrant`]'s field order.
pub const GRANT_COLUMNS: &str =
  "grant_id, granter_id, delegate_id, resource, status, created_at";

/// Raw values read from a `resource_grants` row.
pub struct RawGrant {
  pub grant_id:    String,
  pub granter_id:  i64,
  pub delegate_id: i64,
  pub resource:    String,
  pub status:      String,
  pub created_at:  String,
}

impl RawGrant {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      grant_id:    row.get(0)?,
      granter_id:  row.get(1)?,
      delegate_id: row.get(2)?,
      resource:    row.get(3)?,
      status:      row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_grant(self) -> Result<ResourceGrant> {
    Ok(ResourceGrant {
      grant_id:   decode_uuid(&self.grant_id)?,
      granter:    SubjectId(self.granter_id),
      delegate:   SubjectId(self.delegate_id),
      resource:   Resource::parse(&self.resource)?,
      status:     GrantStatus::parse(&self.status)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `login_events` row.
pub struct RawLoginEvent {
  pub subject_id:  Option<i64>,
  pub kind:        String,
  pub outcome:     String,
  pub user_agent:  Option<String>,
  pub recorded_at: String,
}

impl RawLoginEvent {
  pub fn into_event(self) -> Result<LoginEvent> {
    Ok(LoginEvent {
      subject_id:  self.subject_id.map(SubjectId),
      kind:        decode_event_kind(&self.kind)?,
      outcome:     decode_outcome(&self.outcome)?,
      user_agent:  self.user_agent,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
