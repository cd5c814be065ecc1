//! Password login.

use std::sync::OnceLock;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier as _,
  password_hash::SaltString,
};
use chrono::Utc;
use rand_core::OsRng;
use ward_core::{
  audit::{LoginEvent, LoginEventKind, LoginOutcome},
  store::CredentialStore,
  subject::{Account, SubjectId},
};

use crate::{AuthError, Result};

/// Hash `password` into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)?
      .to_string(),
  )
}

/// A throwaway hash checked on the unknown-user path, so that path costs as
/// much as a real verification.
fn dummy_hash() -> Option<&'static str> {
  static DUMMY: OnceLock<Option<String>> = OnceLock::new();
  DUMMY
    .get_or_init(|| hash_password("ward-unknown-user").ok())
    .as_deref()
}

fn password_matches(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

/// Checks a username and password against the credential store and audits
/// every attempt.
pub struct PasswordVerifier<'a, S> {
  store: &'a S,
}

impl<'a, S: CredentialStore> PasswordVerifier<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Check the password and record the attempt.
  pub async fn verify(
    &self,
    username: &str,
    password: &str,
    user_agent: Option<&str>,
  ) -> Result<Account> {
    self
      .verify_and_admit(username, password, user_agent, |_| Ok(()))
      .await
  }

  /// Like [`verify`](Self::verify), but the attempt only counts as a success
  /// once `admit` accepts the account. A refused login is recorded as a
  /// failure and leaves `last_login` untouched.
  pub async fn verify_and_admit(
    &self,
    username: &str,
    password: &str,
    user_agent: Option<&str>,
    admit: impl FnOnce(&Account) -> Result<()> + Send,
  ) -> Result<Account> {
    let email = username.trim().to_lowercase();

    let Some(mut account) = self
      .store
      .find_account_by_email(&email)
      .await
      .map_err(AuthError::store)?
    else {
      if let Some(phc) = dummy_hash() {
        password_matches(password, phc);
      }
      tracing::warn!(%email, "login attempt for unknown user");
      self.record(None, LoginOutcome::Failure, user_agent).await?;
      return Err(AuthError::Unauthorized);
    };

    let id = account.subject.id;
    if !password_matches(password, &account.credential.password_hash) {
      tracing::warn!(subject = %id, "login attempt with wrong password");
      self.record(Some(id), LoginOutcome::Failure, user_agent).await?;
      return Err(AuthError::Unauthorized);
    }

    if let Err(e) = admit(&account) {
      tracing::warn!(subject = %id, error = %e, "login refused");
      self.record(Some(id), LoginOutcome::Failure, user_agent).await?;
      return Err(e);
    }

    let now = Utc::now();
    self
      .store
      .set_last_login(id, now)
      .await
      .map_err(AuthError::store)?;
    account.credential.last_login = Some(now);
    self.record(Some(id), LoginOutcome::Success, user_agent).await?;

    Ok(account)
  }

  async fn record(
    &self,
    subject_id: Option<SubjectId>,
    outcome: LoginOutcome,
    user_agent: Option<&str>,
  ) -> Result<()> {
    self
      .store
      .append_login_event(LoginEvent::new(
        subject_id,
        LoginEventKind::Login,
        outcome,
        user_agent,
      ))
      .await
      .map_err(AuthError::store)
  }
}

#[cfg(test)]
mod tests {
  use ward_core::{store::CredentialStore as _, subject::NewSubject};
  use ward_store_sqlite::SqliteStore;

  use super::*;

  async fn store_with_user(password: &str) -> (SqliteStore, SubjectId) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let subject = store
      .add_subject(NewSubject {
        email: "pat@example.com".into(),
        password_hash: hash_password(password).unwrap(),
        is_client: true,
        email_verified: true,
        ..Default::default()
      })
      .await
      .unwrap();
    (store, subject.id)
  }

  #[tokio::test]
  async fn correct_password_updates_last_login() {
    let (store, id) = store_with_user("hunter2").await;
    let account = PasswordVerifier::new(&store)
      .verify("Pat@Example.com", "hunter2", Some("test-agent"))
      .await
      .unwrap();
    assert_eq!(account.subject.id, id);

    let stored = store.get_account(id).await.unwrap().unwrap();
    assert!(stored.credential.last_login.is_some());

    let events = store.login_events(Some(id), 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, LoginOutcome::Success);
    assert_eq!(events[0].user_agent.as_deref(), Some("test-agent"));
  }

  #[tokio::test]
  async fn wrong_password_is_audited() {
    let (store, id) = store_with_user("hunter2").await;
    let err = PasswordVerifier::new(&store)
      .verify("pat@example.com", "wrong", None)
      .await
      .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));

    let events = store.login_events(Some(id), 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, LoginOutcome::Failure);
    assert!(store.get_account(id).await.unwrap().unwrap().credential.last_login.is_none());
  }

  #[tokio::test]
  async fn refused_login_is_audited_as_failure() {
    let (store, id) = store_with_user("hunter2").await;
    let err = PasswordVerifier::new(&store)
      .verify_and_admit("pat@example.com", "hunter2", None, |_| {
        Err(AuthError::Blocked { reason: Some("abuse".into()) })
      })
      .await
      .unwrap_err();
    assert!(matches!(err, AuthError::Blocked { .. }));

    let events = store.login_events(Some(id), 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, LoginOutcome::Failure);
    assert!(store.get_account(id).await.unwrap().unwrap().credential.last_login.is_none());
  }

  #[test]
  fn dummy_hash_never_matches() {
    let phc = dummy_hash().unwrap();
    assert!(PasswordHash::new(phc).is_ok());
    assert!(!password_matches("hunter2", phc));
  }

  #[tokio::test]
  async fn unknown_user_is_audited_without_subject() {
    let (store, _) = store_with_user("hunter2").await;
    let err = PasswordVerifier::new(&store)
      .verify("ghost@example.com", "hunter2", Some("curl"))
      .await
      .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));

    let events = store.login_events(None, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].subject_id.is_none());
    assert_eq!(events[0].outcome, LoginOutcome::Failure);
  }
}
