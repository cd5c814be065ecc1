//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{TimeDelta, Utc};
use uuid::Uuid;
use ward_core::{
  audit::{LoginEvent, LoginEventKind, LoginOutcome},
  grant::{GrantStatus, ResourceGrant},
  persona::{BlockScope, Persona},
  resource::Resource,
  role::Role,
  store::{CredentialStore, GrantStore, RoleStore, TokenBlacklist},
  subject::{NewSubject, SubjectId},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn client(email: &str) -> NewSubject {
  NewSubject {
    email: email.into(),
    password_hash: "hash".into(),
    is_client: true,
    email_verified: true,
    ..Default::default()
  }
}

// ─── Subjects & credentials ──────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_account() {
  let s = store().await;

  let subject = s.add_subject(client("Alice@Example.com")).await.unwrap();
  assert_eq!(subject.email, "alice@example.com");
  assert!(subject.is_client);
  assert!(!subject.deleted);

  let account = s.get_account(subject.id).await.unwrap().unwrap();
  assert_eq!(account.subject, subject);
  assert_eq!(account.credential.password_hash, "hash");
  assert!(!account.credential.client_blocked);
  assert!(account.credential.last_login.is_none());
}

#[tokio::test]
async fn get_account_missing_returns_none() {
  let s = store().await;
  assert!(s.get_account(SubjectId(404)).await.unwrap().is_none());
}

#[tokio::test]
async fn find_by_email() {
  let s = store().await;
  let subject = s.add_subject(client("bob@example.com")).await.unwrap();

  let found = s.find_account_by_email("bob@example.com").await.unwrap().unwrap();
  assert_eq!(found.subject.id, subject.id);
  assert!(s.find_account_by_email("nobody@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let s = store().await;
  s.add_subject(client("carol@example.com")).await.unwrap();
  let err = s.add_subject(client("CAROL@example.com")).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateEmail(e) if e == "carol@example.com"));
}

#[tokio::test]
async fn last_login_and_refresh_token_are_persisted() {
  let s = store().await;
  let id = s.add_subject(client("dan@example.com")).await.unwrap().id;

  let at = Utc::now();
  s.set_last_login(id, at).await.unwrap();
  s.set_refresh_token(id, Some("r1".into())).await.unwrap();

  let cred = s.get_account(id).await.unwrap().unwrap().credential;
  assert_eq!(cred.last_login, Some(at));
  assert_eq!(cred.refresh_token.as_deref(), Some("r1"));

  s.set_refresh_token(id, None).await.unwrap();
  let cred = s.get_account(id).await.unwrap().unwrap().credential;
  assert!(cred.refresh_token.is_none());
}

#[tokio::test]
async fn updates_on_missing_subject_fail() {
  let s = store().await;
  let err = s.set_password_hash(SubjectId(7), "x".into()).await.unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(SubjectId(7))));
}

#[tokio::test]
async fn block_and_unblock_per_scope() {
  let s = store().await;
  let id = s
    .add_subject(NewSubject {
      email: "erin@example.com".into(),
      password_hash: "hash".into(),
      is_client: true,
      is_staff: true,
      ..Default::default()
    })
    .await
    .unwrap()
    .id;

  s.block(id, BlockScope::Staff, Some("policy violation".into()))
    .await
    .unwrap();
  let cred = s.get_account(id).await.unwrap().unwrap().credential;
  assert!(cred.is_blocked(Persona::Staff));
  assert!(cred.is_blocked(Persona::Provider));
  assert!(!cred.is_blocked(Persona::Client));
  assert_eq!(cred.block_reason(Persona::Staff), Some("policy violation"));

  s.unblock(id, BlockScope::Staff).await.unwrap();
  let cred = s.get_account(id).await.unwrap().unwrap().credential;
  assert!(!cred.is_blocked(Persona::Staff));
  assert!(cred.block_reason(Persona::Staff).is_none());
}

#[tokio::test]
async fn mark_deleted_scrubs_subject() {
  let s = store().await;
  let id = s.add_subject(client("frank@example.com")).await.unwrap().id;
  s.set_refresh_token(id, Some("r".into())).await.unwrap();

  s.mark_deleted(id).await.unwrap();

  let account = s.get_account(id).await.unwrap().unwrap();
  assert!(account.subject.deleted);
  assert!(!account.subject.is_client);
  assert_ne!(account.subject.email, "frank@example.com");
  assert!(account.credential.refresh_token.is_none());

  // The address is free again.
  s.add_subject(client("frank@example.com")).await.unwrap();
}

#[tokio::test]
async fn mark_deleted_missing_subject_changes_nothing() {
  let s = store().await;
  let id = s.add_subject(client("hal@example.com")).await.unwrap().id;
  s.set_refresh_token(id, Some("r".into())).await.unwrap();

  let err = s.mark_deleted(SubjectId(id.0 + 100)).await.unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(_)));

  let account = s.get_account(id).await.unwrap().unwrap();
  assert!(!account.subject.deleted);
  assert_eq!(account.credential.refresh_token.as_deref(), Some("r"));
}

#[tokio::test]
async fn login_events_newest_first() {
  let s = store().await;
  let id = s.add_subject(client("gina@example.com")).await.unwrap().id;

  s.append_login_event(LoginEvent::new(
    Some(id),
    LoginEventKind::Login,
    LoginOutcome::Failure,
    Some("curl/8"),
  ))
  .await
  .unwrap();
  s.append_login_event(LoginEvent::new(
    None,
    LoginEventKind::Login,
    LoginOutcome::Failure,
    None,
  ))
  .await
  .unwrap();
  s.append_login_event(LoginEvent::new(
    Some(id),
    LoginEventKind::Refresh,
    LoginOutcome::Success,
    None,
  ))
  .await
  .unwrap();

  let mine = s.login_events(Some(id), 10).await.unwrap();
  assert_eq!(mine.len(), 2);
  assert_eq!(mine[0].kind, LoginEventKind::Refresh);
  assert_eq!(mine[1].user_agent.as_deref(), Some("curl/8"));

  let all = s.login_events(None, 10).await.unwrap();
  assert_eq!(all.len(), 3);
  assert!(all[1].subject_id.is_none());

  assert_eq!(s.login_events(None, 1).await.unwrap().len(), 1);
}

// ─── Roles ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn assign_role_is_idempotent() {
  let s = store().await;
  let id = s.add_subject(client("hank@example.com")).await.unwrap().id;

  s.assign_role(id, Role::MedicalDoctor).await.unwrap();
  s.assign_role(id, Role::MedicalDoctor).await.unwrap();
  s.assign_role(id, Role::Nurse).await.unwrap();

  let roles = s.roles_for(id).await.unwrap();
  assert_eq!(roles.len(), 2);
  assert!(roles.contains(&Role::MedicalDoctor));

  assert!(s.revoke_role(id, Role::Nurse).await.unwrap());
  assert!(!s.revoke_role(id, Role::Nurse).await.unwrap());
  assert_eq!(s.roles_for(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn assign_role_to_missing_subject_fails() {
  let s = store().await;
  let err = s.assign_role(SubjectId(9), Role::Nurse).await.unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(_)));
}

// ─── Resource grants ─────────────────────────────────────────────────────────

#[tokio::test]
async fn grant_lifecycle() {
  let s = store().await;
  let granter = s.add_subject(client("ivy@example.com")).await.unwrap().id;
  let delegate = s.add_subject(client("jon@example.com")).await.unwrap().id;

  let grant = ResourceGrant::pending(granter, delegate, Resource::Medications);
  s.insert_grant(grant.clone()).await.unwrap();

  let found = s
    .find_grant(granter, delegate, Resource::Medications)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found, grant);
  assert!(!found.is_active());

  assert!(s.set_grant_status(grant.grant_id, GrantStatus::Accepted).await.unwrap());
  assert!(s.get_grant(grant.grant_id).await.unwrap().unwrap().is_active());

  assert_eq!(s.grants_by_granter(granter).await.unwrap().len(), 1);
  assert_eq!(s.grants_by_delegate(delegate).await.unwrap().len(), 1);
  assert!(s.grants_by_delegate(granter).await.unwrap().is_empty());

  assert!(s.delete_grant(grant.grant_id).await.unwrap());
  assert!(!s.delete_grant(grant.grant_id).await.unwrap());
  assert!(s.get_grant(grant.grant_id).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_grant_triple_is_rejected() {
  let s = store().await;
  let granter = s.add_subject(client("kim@example.com")).await.unwrap().id;
  let delegate = s.add_subject(client("lee@example.com")).await.unwrap().id;

  s.insert_grant(ResourceGrant::pending(granter, delegate, Resource::WearableData))
    .await
    .unwrap();
  let err = s
    .insert_grant(ResourceGrant::pending(granter, delegate, Resource::WearableData))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateGrant));

  // A different resource for the same pair is fine.
  s.insert_grant(ResourceGrant::pending(granter, delegate, Resource::BloodPressure))
    .await
    .unwrap();
}

#[tokio::test]
async fn grant_to_missing_subject_fails() {
  let s = store().await;
  let granter = s.add_subject(client("max@example.com")).await.unwrap().id;
  let err = s
    .insert_grant(ResourceGrant::pending(granter, SubjectId(999), Resource::Medications))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(SubjectId(999))));
}

#[tokio::test]
async fn status_change_on_missing_grant_returns_false() {
  let s = store().await;
  assert!(!s
    .set_grant_status(Uuid::new_v4(), GrantStatus::Accepted)
    .await
    .unwrap());
}

// ─── Token blacklist ─────────────────────────────────────────────────────────

#[tokio::test]
async fn revoke_is_idempotent() {
  let s = store().await;
  let exp = Utc::now() + TimeDelta::hours(1);

  assert!(!s.is_revoked("tok").await.unwrap());
  assert!(s.revoke("tok", exp).await.unwrap());
  assert!(!s.revoke("tok", exp).await.unwrap());
  assert!(s.is_revoked("tok").await.unwrap());
  assert!(!s.is_revoked("other").await.unwrap());
}

#[tokio::test]
async fn purge_drops_only_expired_entries() {
  let s = store().await;
  let now = Utc::now();

  s.revoke("old", now - TimeDelta::minutes(5)).await.unwrap();
  s.revoke("fresh", now + TimeDelta::minutes(5)).await.unwrap();

  assert_eq!(s.purge_expired(now).await.unwrap(), 1);
  assert!(!s.is_revoked("old").await.unwrap());
  assert!(s.is_revoked("fresh").await.unwrap());
  assert_eq!(s.purge_expired(now).await.unwrap(), 0);
}
