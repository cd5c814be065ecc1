//! The catalog of client data categories that can be shared with a care team.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
  Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
  BloodChemistry,
  BloodPressure,
  DiagnosticImaging,
  GeneralMedicalInfo,
  MedicalHistory,
  Medications,
  SexualHistory,
  SocialHistory,
  WearableData,
}

impl Resource {
  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name).map_err(|_| Error::UnknownResource(name.to_owned()))
  }
}
