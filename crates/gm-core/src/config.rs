//! Battle configuration
//!
//! Every field has a default, so a config file only needs the values it
//! overrides.

use std::path::Path;
use std::time::Duration;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::weather::Weather;

/// Tunable constants of the battle core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    // Reactions
    /// Percent chance a defender reacts instead of dodging
    pub reaction_chance: u32,
    /// Same, for reinforcing defenders
    pub reinforcing_reaction_chance: u32,
    pub reaction_timeout_ms: u64,

    // Animated attacks
    pub attack_soft_timeout_ms: u64,
    pub attack_hard_timeout_ms: u64,
    /// Delay between movement steps, for pacing
    pub step_delay_ms: u64,

    // Terrain
    pub snow_freeze_chance: u32,
    pub lava_burn_chance: u32,

    // Rolls
    /// Largest dice pool ever rolled
    pub dice_cap: u32,
    /// A status move is preferred when the modified 1-100 roll is at most this
    pub status_preference_threshold: i32,
    /// Trigger roll quality a multi-hit attack needs to apply its status
    pub multi_hit_status_threshold: i32,
    /// Upper bound on luck tokens; `None` = uncapped
    pub max_luck_tokens: Option<u32>,

    /// Per-weather hit threshold overrides
    pub weather_thresholds: HashMap<Weather, i32>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            reaction_chance: 25,
            reinforcing_reaction_chance: 50,
            reaction_timeout_ms: 5_000,

            attack_soft_timeout_ms: 10_000,
            attack_hard_timeout_ms: 15_000,
            step_delay_ms: 0,

            snow_freeze_chance: 10,
            lava_burn_chance: 30,

            dice_cap: 20,
            status_preference_threshold: 50,
            multi_hit_status_threshold: 3,
            max_luck_tokens: None,

            weather_thresholds: HashMap::new(),
        }
    }
}

impl BattleConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: BattleConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Reject values the core cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let percents = [
            ("reaction_chance", self.reaction_chance),
            ("reinforcing_reaction_chance", self.reinforcing_reaction_chance),
            ("snow_freeze_chance", self.snow_freeze_chance),
            ("lava_burn_chance", self.lava_burn_chance),
        ];
        for (name, value) in percents {
            if value > 100 {
                return Err(ConfigError::Invalid(format!(
                    "{name} is a percentage, got {value}"
                )));
            }
        }
        if self.attack_soft_timeout_ms > self.attack_hard_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "attack soft timeout ({} ms) exceeds hard timeout ({} ms)",
                self.attack_soft_timeout_ms, self.attack_hard_timeout_ms
            )));
        }
        if self.dice_cap == 0 {
            return Err(ConfigError::Invalid("dice_cap must be at least 1".into()));
        }
        Ok(())
    }

    /// Hit threshold for the weather, honouring overrides
    pub fn hit_threshold(&self, weather: Weather) -> i32 {
        self.weather_thresholds
            .get(&weather)
            .copied()
            .unwrap_or_else(|| weather.hit_threshold())
    }

    pub fn reaction_timeout(&self) -> Duration {
        Duration::from_millis(self.reaction_timeout_ms)
    }

    pub fn attack_soft_timeout(&self) -> Duration {
        Duration::from_millis(self.attack_soft_timeout_ms)
    }

    pub fn attack_hard_timeout(&self) -> Duration {
        Duration::from_millis(self.attack_hard_timeout_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}
