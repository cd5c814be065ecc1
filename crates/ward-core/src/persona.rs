//! Personas: the independent hats a single subject can wear.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

/// A persona carried by a session: the `persona` claim of a bearer token, or
/// the persona a login route mints tokens for.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
  Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Persona {
  Client,
  Staff,
  Provider,
}

impl Persona {
  /// The block flag that governs this persona.
  pub fn block_scope(self) -> BlockScope {
    match self {
      Self::Client => BlockScope::Client,
      Self::Staff | Self::Provider => BlockScope::Staff,
    }
  }

  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name).map_err(|_| Error::UnknownPersona(name.to_owned()))
  }
}

/// Which of the two per-credential block flags an administrative block
/// targets. Providers share the staff flag.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr,
  Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BlockScope {
  Client,
  Staff,
}

/// A persona entry in an endpoint policy.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
  Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AcceptedPersona {
  /// Clients acting on their own data, or on delegated data for reads.
  Client,
  /// Any staff member, subject to the policy's role requirement.
  Staff,
  /// Staff or providers acting on their own `user_id`; roles are not checked.
  StaffSelf,
  /// Any provider, subject to the policy's role requirement.
  Provider,
  /// Any authenticated persona.
  Any,
}

impl AcceptedPersona {
  /// Whether a session carrying `persona` may enter through this entry.
  pub fn admits(self, persona: Persona) -> bool {
    match self {
      Self::Client => persona == Persona::Client,
      Self::Staff => persona == Persona::Staff,
      Self::StaffSelf => matches!(persona, Persona::Staff | Persona::Provider),
      Self::Provider => persona == Persona::Provider,
      Self::Any => true,
    }
  }

  /// Entries that admit staff or provider sessions, and therefore make role
  /// requirements meaningful.
  pub fn is_professional(self) -> bool {
    matches!(self, Self::Staff | Self::StaffSelf | Self::Provider | Self::Any)
  }

  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name).map_err(|_| Error::UnknownPersona(name.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn staff_self_admits_both_professional_personas() {
    assert!(AcceptedPersona::StaffSelf.admits(Persona::Staff));
    assert!(AcceptedPersona::StaffSelf.admits(Persona::Provider));
    assert!(!AcceptedPersona::StaffSelf.admits(Persona::Client));
  }

  #[test]
  fn providers_share_the_staff_block_flag() {
    assert_eq!(Persona::Provider.block_scope(), BlockScope::Staff);
    assert_eq!(Persona::Client.block_scope(), BlockScope::Client);
  }

  #[test]
  fn parse_names() {
    assert_eq!(AcceptedPersona::parse("staff_self").unwrap(), AcceptedPersona::StaffSelf);
    assert_eq!(Persona::parse("provider").unwrap(), Persona::Provider);
    assert!(matches!(Persona::parse("admin"), Err(Error::UnknownPersona(_))));
  }
}
