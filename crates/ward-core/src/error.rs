//! Error types for `ward-core`.

use thiserror::Error;

/// Errors raised while declaring policies or parsing catalog names.
///
/// These are programming errors on the endpoint author's side and surface
/// when a router is built, never while a request is being authorized.
#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown persona: {0:?}")]
  UnknownPersona(String),

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  #[error("unknown care-team resource: {0:?}")]
  UnknownResource(String),

  #[error("unknown grant status: {0:?}")]
  UnknownGrantStatus(String),

  #[error("a policy must accept at least one persona")]
  NoPersonas,

  #[error("roles {0:?} are required but no staff or provider persona is accepted")]
  RolesWithoutProfessional(Vec<String>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
