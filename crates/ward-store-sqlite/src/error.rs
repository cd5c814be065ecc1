//! Error type for `ward-store-sqlite`.

use thiserror::Error;
use ward_core::subject::SubjectId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ward_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unexpected column value: {0}")]
  Decode(String),

  #[error("subject not found: {0}")]
  SubjectNotFound(SubjectId),

  #[error("email already registered: {0}")]
  DuplicateEmail(String),

  /// A grant for the same granter, delegate and resource already exists.
  #[error("grant already exists")]
  DuplicateGrant,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
