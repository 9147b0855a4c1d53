//! Weather state
//!
//! Weather is owned by the caller; the core only reads the hit threshold and
//! the accuracy modifier it implies.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Battlefield weather
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Weather {
    #[default]
    Clear,
    Rain,
    Sandstorm,
    Hail,
    Fog,
    HarshSun,
}

impl Weather {
    /// Minimum net successes an attack needs to connect
    pub const fn hit_threshold(&self) -> i32 {
        match self {
            Weather::Clear | Weather::Rain | Weather::HarshSun => 0,
            Weather::Sandstorm | Weather::Hail => 1,
            Weather::Fog => 2,
        }
    }

    /// Dice added to (or removed from) every accuracy pool
    pub const fn accuracy_modifier(&self) -> i32 {
        match self {
            Weather::Fog => -1,
            Weather::Sandstorm => -1,
            _ => 0,
        }
    }
}
