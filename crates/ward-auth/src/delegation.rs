//! Care-team delegation.
//!
//! [`DelegationAuthority`] owns the grant lifecycle (invite, accept, revoke)
//! and answers the engine's question: which of these resources may the
//! delegate read on the granter's behalf?

use std::collections::BTreeSet;

use uuid::Uuid;
use ward_core::{
  grant::{GrantStatus, ResourceGrant},
  resource::Resource,
  store::GrantStore,
  subject::SubjectId,
};

use crate::{AuthError, Result};

pub struct DelegationAuthority<'a, S> {
  store: &'a S,
}

impl<'a, S: GrantStore> DelegationAuthority<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Whether an accepted grant exists for this exact triple.
  pub async fn query(
    &self,
    granter: SubjectId,
    delegate: SubjectId,
    resource: Resource,
  ) -> Result<bool> {
    Ok(
      self
        .store
        .find_grant(granter, delegate, resource)
        .await
        .map_err(AuthError::store)?
        .is_some_and(|g| g.is_active()),
    )
  }

  /// The members of `resources` the delegate currently holds accepted
  /// grants for.
  pub async fn authorized_subset(
    &self,
    granter: SubjectId,
    delegate: SubjectId,
    resources: &BTreeSet<Resource>,
  ) -> Result<BTreeSet<Resource>> {
    let mut subset = BTreeSet::new();
    for &resource in resources {
      if self.query(granter, delegate, resource).await? {
        subset.insert(resource);
      }
    }
    Ok(subset)
  }

  /// Invite `delegate` to `resource`. Inviting again returns the existing
  /// grant unchanged, whatever its status.
  pub async fn invite(
    &self,
    granter: SubjectId,
    delegate: SubjectId,
    resource: Resource,
  ) -> Result<ResourceGrant> {
    if granter == delegate {
      return Err(AuthError::BadRequest("cannot add yourself to your care team".into()));
    }
    if let Some(existing) = self
      .store
      .find_grant(granter, delegate, resource)
      .await
      .map_err(AuthError::store)?
    {
      return Ok(existing);
    }

    let grant = ResourceGrant::pending(granter, delegate, resource);
    if let Err(e) = self.store.insert_grant(grant.clone()).await {
      // A concurrent invite may have inserted the same triple first.
      return self
        .store
        .find_grant(granter, delegate, resource)
        .await
        .map_err(AuthError::store)?
        .ok_or_else(|| AuthError::store(e));
    }
    tracing::info!(
      grant = %grant.grant_id,
      %granter,
      %delegate,
      %resource,
      "care-team invitation created"
    );
    Ok(grant)
  }

  /// Returns `false` if the grant does not exist.
  pub async fn accept(&self, grant_id: Uuid) -> Result<bool> {
    let accepted = self
      .store
      .set_grant_status(grant_id, GrantStatus::Accepted)
      .await
      .map_err(AuthError::store)?;
    if accepted {
      tracing::info!(grant = %grant_id, "care-team grant accepted");
    }
    Ok(accepted)
  }

  /// Delete the grant, whether pending or accepted. Returns `false` if it
  /// did not exist.
  pub async fn revoke(&self, grant_id: Uuid) -> Result<bool> {
    let removed = self
      .store
      .delete_grant(grant_id)
      .await
      .map_err(AuthError::store)?;
    if removed {
      tracing::info!(grant = %grant_id, "care-team grant revoked");
    }
    Ok(removed)
  }

  pub async fn get(&self, grant_id: Uuid) -> Result<Option<ResourceGrant>> {
    self.store.get_grant(grant_id).await.map_err(AuthError::store)
  }

  pub async fn list_for_granter(&self, granter: SubjectId) -> Result<Vec<ResourceGrant>> {
    self
      .store
      .grants_by_granter(granter)
      .await
      .map_err(AuthError::store)
  }

  pub async fn list_for_delegate(&self, delegate: SubjectId) -> Result<Vec<ResourceGrant>> {
    self
      .store
      .grants_by_delegate(delegate)
      .await
      .map_err(AuthError::store)
  }
}

#[cfg(test)]
mod tests {
  use ward_core::{store::CredentialStore as _, subject::NewSubject};
  use ward_store_sqlite::SqliteStore;

  use super::*;

  async fn setup() -> (SqliteStore, SubjectId, SubjectId) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut ids = Vec::new();
    for email in ["granter@example.com", "delegate@example.com"] {
      let s = store
        .add_subject(NewSubject {
          email: email.into(),
          password_hash: "x".into(),
          is_client: true,
          ..Default::default()
        })
        .await
        .unwrap();
      ids.push(s.id);
    }
    (store, ids[0], ids[1])
  }

  #[tokio::test]
  async fn pending_grants_do_not_authorize() {
    let (store, granter, delegate) = setup().await;
    let authority = DelegationAuthority::new(&store);

    let grant = authority
      .invite(granter, delegate, Resource::Medications)
      .await
      .unwrap();
    assert_eq!(grant.status, GrantStatus::Pending);
    assert!(!authority.query(granter, delegate, Resource::Medications).await.unwrap());

    assert!(authority.accept(grant.grant_id).await.unwrap());
    assert!(authority.query(granter, delegate, Resource::Medications).await.unwrap());
    // Direction matters.
    assert!(!authority.query(delegate, granter, Resource::Medications).await.unwrap());
  }

  #[tokio::test]
  async fn invite_is_idempotent() {
    let (store, granter, delegate) = setup().await;
    let authority = DelegationAuthority::new(&store);

    let first = authority.invite(granter, delegate, Resource::BloodPressure).await.unwrap();
    let second = authority.invite(granter, delegate, Resource::BloodPressure).await.unwrap();
    assert_eq!(first.grant_id, second.grant_id);
    assert_eq!(authority.list_for_granter(granter).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn concurrent_invites_share_one_grant() {
    let (store, granter, delegate) = setup().await;
    let authority = DelegationAuthority::new(&store);

    let (a, b) = tokio::join!(
      authority.invite(granter, delegate, Resource::WearableData),
      authority.invite(granter, delegate, Resource::WearableData),
    );
    assert_eq!(a.unwrap().grant_id, b.unwrap().grant_id);
    assert_eq!(authority.list_for_granter(granter).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn self_invite_is_rejected() {
    let (store, granter, _) = setup().await;
    let err = DelegationAuthority::new(&store)
      .invite(granter, granter, Resource::Medications)
      .await
      .unwrap_err();
    assert!(matches!(err, AuthError::BadRequest(_)));
  }

  #[tokio::test]
  async fn subset_contains_only_accepted_resources() {
    let (store, granter, delegate) = setup().await;
    let authority = DelegationAuthority::new(&store);

    let meds = authority.invite(granter, delegate, Resource::Medications).await.unwrap();
    authority.invite(granter, delegate, Resource::SocialHistory).await.unwrap();
    authority.accept(meds.grant_id).await.unwrap();

    let wanted = BTreeSet::from([
      Resource::Medications,
      Resource::SocialHistory,
      Resource::WearableData,
    ]);
    let subset = authority.authorized_subset(granter, delegate, &wanted).await.unwrap();
    assert_eq!(subset, BTreeSet::from([Resource::Medications]));

    assert!(authority.revoke(meds.grant_id).await.unwrap());
    let subset = authority.authorized_subset(granter, delegate, &wanted).await.unwrap();
    assert!(subset.is_empty());
    assert!(authority.get(meds.grant_id).await.unwrap().is_none());
  }
}
