//! Care-team resource grants.
//!
//! A grant lets a delegate read one category of a client's data. It starts
//! out `Pending` when the client invites the delegate and becomes `Accepted`
//! when the delegate confirms. There is no rejected state: declining or
//! revoking deletes the row.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, resource::Resource, subject::SubjectId};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GrantStatus {
  Pending,
  Accepted,
}

impl GrantStatus {
  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name).map_err(|_| Error::UnknownGrantStatus(name.to_owned()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGrant {
  pub grant_id:   Uuid,
  /// The client whose data is shared.
  pub granter:    SubjectId,
  /// The care-team member receiving access.
  pub delegate:   SubjectId,
  pub resource:   Resource,
  pub status:     GrantStatus,
  pub created_at: DateTime<Utc>,
}

impl ResourceGrant {
  /// A fresh, not yet accepted invitation.
  pub fn pending(granter: SubjectId, delegate: SubjectId, resource: Resource) -> Self {
    Self {
      grant_id: Uuid::new_v4(),
      granter,
      delegate,
      resource,
      status: GrantStatus::Pending,
      created_at: Utc::now(),
    }
  }

  /// Only accepted grants authorize data access.
  pub fn is_active(&self) -> bool { self.status == GrantStatus::Accepted }

  pub fn involves(&self, subject: SubjectId) -> bool {
    self.granter == subject || self.delegate == subject
  }
}
