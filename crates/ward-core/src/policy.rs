//! Endpoint policy declarations.
//!
//! Every guarded endpoint declares one [`Policy`]: which personas may enter,
//! which roles staff and providers need, and which care-team resources can
//! be reached through delegation. Policies are validated when they are built
//! so that a misdeclared endpoint fails at router construction rather than
//! at request time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  persona::{AcceptedPersona, Persona},
  resource::Resource,
  role::Role,
};

/// Whether a request only reads data. Delegated access is read-only unless
/// the caller is also role-authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
  Read,
  Write,
}

impl AccessMode {
  pub fn is_read(self) -> bool { self == Self::Read }
}

/// A validated endpoint policy. Construct with [`Policy::builder`] or from a
/// [`PolicyDecl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
  personas:               BTreeSet<AcceptedPersona>,
  roles:                  BTreeSet<Role>,
  resources:              BTreeSet<Resource>,
  require_verified_email: bool,
  internal_only:          bool,
}

impl Policy {
  pub fn builder() -> PolicyBuilder { PolicyBuilder::default() }

  /// Shorthand for a builder that already accepts `persona`.
  pub fn accepting(persona: AcceptedPersona) -> PolicyBuilder {
    PolicyBuilder::default().persona(persona)
  }

  /// Parse a JSON policy declaration, e.g.
  /// `{"personas":["provider"],"roles":["medical_doctor"]}`.
  pub fn from_json(json: &str) -> Result<Self> {
    let decl: PolicyDecl = serde_json::from_str(json)?;
    Self::try_from(decl)
  }

  pub fn personas(&self) -> &BTreeSet<AcceptedPersona> { &self.personas }

  pub fn roles(&self) -> &BTreeSet<Role> { &self.roles }

  pub fn resources(&self) -> &BTreeSet<Resource> { &self.resources }

  pub fn requires_verified_email(&self) -> bool { self.require_verified_email }

  pub fn is_internal_only(&self) -> bool { self.internal_only }

  /// Whether any entry admits a session carrying `persona`.
  pub fn admits(&self, persona: Persona) -> bool {
    self.personas.iter().any(|p| p.admits(persona))
  }

  /// Whether an entry other than `staff_self` admits `persona`, i.e. the
  /// caller may act on subjects other than themselves.
  pub fn admits_others(&self, persona: Persona) -> bool {
    self
      .personas
      .iter()
      .filter(|p| **p != AcceptedPersona::StaffSelf)
      .any(|p| p.admits(persona))
  }

  pub fn allows_self_service(&self) -> bool {
    self.personas.contains(&AcceptedPersona::StaffSelf)
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PolicyBuilder {
  personas:               BTreeSet<AcceptedPersona>,
  roles:                  BTreeSet<Role>,
  resources:              BTreeSet<Resource>,
  require_verified_email: bool,
  internal_only:          bool,
}

impl Default for PolicyBuilder {
  fn default() -> Self {
    Self {
      personas:               BTreeSet::new(),
      roles:                  BTreeSet::new(),
      resources:              BTreeSet::new(),
      require_verified_email: true,
      internal_only:          false,
    }
  }
}

impl PolicyBuilder {
  pub fn persona(mut self, persona: AcceptedPersona) -> Self {
    self.personas.insert(persona);
    self
  }

  pub fn personas(mut self, personas: impl IntoIterator<Item = AcceptedPersona>) -> Self {
    self.personas.extend(personas);
    self
  }

  pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
    self.roles.extend(roles);
    self
  }

  pub fn resources(mut self, resources: impl IntoIterator<Item = Resource>) -> Self {
    self.resources.extend(resources);
    self
  }

  /// Email verification is required by default; login routes and the like
  /// opt out here.
  pub fn allow_unverified_email(mut self) -> Self {
    self.require_verified_email = false;
    self
  }

  pub fn internal_only(mut self) -> Self {
    self.internal_only = true;
    self
  }

  pub fn build(self) -> Result<Policy> {
    if self.personas.is_empty() {
      return Err(Error::NoPersonas);
    }
    if !self.roles.is_empty() && !self.personas.iter().any(|p| p.is_professional()) {
      return Err(Error::RolesWithoutProfessional(
        self.roles.iter().map(|r| r.to_string()).collect(),
      ));
    }
    Ok(Policy {
      personas:               self.personas,
      roles:                  self.roles,
      resources:              self.resources,
      require_verified_email: self.require_verified_email,
      internal_only:          self.internal_only,
    })
  }
}

// ─── String declaration ──────────────────────────────────────────────────────

/// A policy as written by an endpoint author, with names instead of enums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecl {
  pub personas:               Vec<String>,
  #[serde(default)]
  pub roles:                  Vec<String>,
  #[serde(default)]
  pub resources:              Vec<String>,
  #[serde(default = "default_true")]
  pub require_verified_email: bool,
  #[serde(default)]
  pub internal_only:          bool,
}

fn default_true() -> bool { true }

impl TryFrom<PolicyDecl> for Policy {
  type Error = Error;

  fn try_from(decl: PolicyDecl) -> Result<Self> {
    let personas = decl
      .personas
      .iter()
      .map(|p| AcceptedPersona::parse(p))
      .collect::<Result<Vec<_>>>()?;
    let roles = decl
      .roles
      .iter()
      .map(|r| Role::parse(r))
      .collect::<Result<Vec<_>>>()?;
    let resources = decl
      .resources
      .iter()
      .map(|r| Resource::parse(r))
      .collect::<Result<Vec<_>>>()?;

    let mut builder = Policy::builder()
      .personas(personas)
      .roles(roles)
      .resources(resources);
    if !decl.require_verified_email {
      builder = builder.allow_unverified_email();
    }
    if decl.internal_only {
      builder = builder.internal_only();
    }
    builder.build()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_policy_is_rejected() {
    assert!(matches!(Policy::builder().build(), Err(Error::NoPersonas)));
  }

  #[test]
  fn roles_need_a_professional_persona() {
    let err = Policy::accepting(AcceptedPersona::Client)
      .roles([Role::StaffAdmin])
      .build()
      .unwrap_err();
    assert!(matches!(err, Error::RolesWithoutProfessional(_)));
  }

  #[test]
  fn declaration_with_unknown_role_is_rejected() {
    let err = Policy::from_json(r#"{"personas":["staff"],"roles":["overlord"]}"#)
      .unwrap_err();
    assert!(matches!(err, Error::UnknownRole(r) if r == "overlord"));
  }

  #[test]
  fn declaration_with_unknown_persona_is_rejected() {
    let err = Policy::from_json(r#"{"personas":["guest"]}"#).unwrap_err();
    assert!(matches!(err, Error::UnknownPersona(_)));
  }

  #[test]
  fn declaration_defaults() {
    let policy = Policy::from_json(
      r#"{"personas":["client","provider"],"resources":["medications"]}"#,
    )
    .unwrap();
    assert!(policy.requires_verified_email());
    assert!(!policy.is_internal_only());
    assert!(policy.roles().is_empty());
    assert!(policy.resources().contains(&Resource::Medications));
    assert!(policy.admits(Persona::Provider));
    assert!(!policy.admits(Persona::Staff));
  }

  #[test]
  fn staff_self_only_does_not_admit_others() {
    let policy = Policy::accepting(AcceptedPersona::StaffSelf).build().unwrap();
    assert!(policy.admits(Persona::Staff));
    assert!(!policy.admits_others(Persona::Staff));
    assert!(policy.allows_self_service());
  }
}
