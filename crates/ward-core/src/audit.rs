//! Login and token-refresh audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::subject::SubjectId;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LoginEventKind {
  Login,
  Refresh,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LoginOutcome {
  Success,
  Failure,
}

/// One credential-exchange attempt. Appended for every attempt, successful
/// or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginEvent {
  /// `None` when the presented username matched no subject.
  pub subject_id:  Option<SubjectId>,
  pub kind:        LoginEventKind,
  pub outcome:     LoginOutcome,
  pub user_agent:  Option<String>,
  pub recorded_at: DateTime<Utc>,
}

impl LoginEvent {
  pub fn new(
    subject_id: Option<SubjectId>,
    kind: LoginEventKind,
    outcome: LoginOutcome,
    user_agent: Option<&str>,
  ) -> Self {
    Self {
      subject_id,
      kind,
      outcome,
      user_agent: user_agent.map(str::to_owned),
      recorded_at: Utc::now(),
    }
  }
}
