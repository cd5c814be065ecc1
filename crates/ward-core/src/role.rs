//! Roles assignable to staff and provider personas.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result, persona::Persona};

/// The closed set of role names. Provider roles and internal staff roles are
/// disjoint; see [`Role::kind`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
  Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  // Provider roles
  MedicalDoctor,
  PhysicalTherapist,
  Dietitian,
  Nutritionist,
  Therapist,
  Nurse,
  Trainer,
  Chiropractor,
  // Internal staff roles
  StaffAdmin,
  SystemAdmin,
  DataScientist,
  CommunityManager,
  ClientServices,
}

/// Which persona a role belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
  Provider,
  Staff,
}

impl Role {
  pub fn kind(self) -> RoleKind {
    match self {
      Self::MedicalDoctor
      | Self::PhysicalTherapist
      | Self::Dietitian
      | Self::Nutritionist
      | Self::Therapist
      | Self::Nurse
      | Self::Trainer
      | Self::Chiropractor => RoleKind::Provider,
      Self::StaffAdmin
      | Self::SystemAdmin
      | Self::DataScientist
      | Self::CommunityManager
      | Self::ClientServices => RoleKind::Staff,
    }
  }

  /// The persona a subject must hold before this role can be assigned.
  pub fn persona(self) -> Persona {
    match self.kind() {
      RoleKind::Provider => Persona::Provider,
      RoleKind::Staff => Persona::Staff,
    }
  }

  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name).map_err(|_| Error::UnknownRole(name.to_owned()))
  }
}
