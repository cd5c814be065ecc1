//! Storage traits consumed by the authorization engine.
//!
//! The traits are implemented by storage backends (e.g. `ward-store-sqlite`).
//! Higher layers (`ward-auth`, `ward-api`) depend on these abstractions, not
//! on any concrete backend. All four share the error type declared by
//! [`Backend`], so one backend value can serve every role.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::{collections::BTreeSet, future::Future};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  audit::LoginEvent,
  grant::{GrantStatus, ResourceGrant},
  persona::BlockScope,
  resource::Resource,
  role::Role,
  subject::{Account, NewSubject, Subject, SubjectId},
};

/// The error type shared by every storage trait of one backend.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Subjects & credentials ──────────────────────────────────────────────────

pub trait CredentialStore: Backend {
  /// Register a subject together with its credential.
  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Load a subject and its credential. Returns `None` if not found.
  fn get_account(
    &self,
    id: SubjectId,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  /// Load by login name. `email` must already be lower-cased.
  fn find_account_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  fn set_last_login(
    &self,
    id: SubjectId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remember the refresh token most recently issued to `id`.
  fn set_refresh_token(
    &self,
    id: SubjectId,
    token: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn set_password_hash(
    &self,
    id: SubjectId,
    hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Block one persona scope with an optional caller-facing reason.
  fn block(
    &self,
    id: SubjectId,
    scope: BlockScope,
    reason: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn unblock(
    &self,
    id: SubjectId,
    scope: BlockScope,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Soft delete: clear persona flags, scrub the email, set `deleted`.
  fn mark_deleted(
    &self,
    id: SubjectId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Login bookkeeping ─────────────────────────────────────────────────

  /// Append a login or refresh attempt to the audit log.
  fn append_login_event(
    &self,
    event: LoginEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Most recent events first; `subject = None` returns events for every
  /// subject including unresolved ones.
  fn login_events(
    &self,
    subject: Option<SubjectId>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<LoginEvent>, Self::Error>> + Send + '_;
}

// ─── Roles ───────────────────────────────────────────────────────────────────

pub trait RoleStore: Backend {
  fn roles_for(
    &self,
    id: SubjectId,
  ) -> impl Future<Output = Result<BTreeSet<Role>, Self::Error>> + Send + '_;

  /// Idempotent.
  fn assign_role(
    &self,
    id: SubjectId,
    role: Role,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns `false` if the subject did not hold the role.
  fn revoke_role(
    &self,
    id: SubjectId,
    role: Role,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Resource grants ─────────────────────────────────────────────────────────

pub trait GrantStore: Backend {
  /// The grant for exactly this triple, in whatever status.
  fn find_grant(
    &self,
    granter: SubjectId,
    delegate: SubjectId,
    resource: Resource,
  ) -> impl Future<Output = Result<Option<ResourceGrant>, Self::Error>> + Send + '_;

  fn get_grant(
    &self,
    grant_id: Uuid,
  ) -> impl Future<Output = Result<Option<ResourceGrant>, Self::Error>> + Send + '_;

  /// Fails if a grant for the same triple already exists.
  fn insert_grant(
    &self,
    grant: ResourceGrant,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns `false` if no such grant exists.
  fn set_grant_status(
    &self,
    grant_id: Uuid,
    status: GrantStatus,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns `false` if no such grant exists.
  fn delete_grant(
    &self,
    grant_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn grants_by_granter(
    &self,
    granter: SubjectId,
  ) -> impl Future<Output = Result<Vec<ResourceGrant>, Self::Error>> + Send + '_;

  fn grants_by_delegate(
    &self,
    delegate: SubjectId,
  ) -> impl Future<Output = Result<Vec<ResourceGrant>, Self::Error>> + Send + '_;
}

// ─── Token blacklist ─────────────────────────────────────────────────────────

pub trait TokenBlacklist: Backend {
  fn is_revoked<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Idempotent. `expires_at` is the token's natural expiry, after which the
  /// entry may be purged. Returns `false` if the token was already revoked,
  /// so exactly one of several concurrent callers observes `true`.
  fn revoke<'a>(
    &'a self,
    token: &'a str,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Drop entries whose token expired before `now`; returns how many.
  fn purge_expired(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

/// Everything the engine needs from one backend.
pub trait AuthStore: CredentialStore + RoleStore + GrantStore + TokenBlacklist {}

impl<T> AuthStore for T where T: CredentialStore + RoleStore + GrantStore + TokenBlacklist {}
