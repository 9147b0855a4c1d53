//! Error types for battle actions and configuration
//!
//! Action errors never escape the pipeline or the sequencer: they are folded
//! into a failed outcome plus a battle-log line. Only configuration loading
//! hands errors back to the caller.

use std::path::PathBuf;

use thiserror::Error;

use crate::combatant::CombatantId;

/// Why a single action could not be carried out
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown combatant {0}")]
    UnknownCombatant(CombatantId),

    #[error("combatant {0} has no position on the grid")]
    MissingPosition(CombatantId),

    #[error("combatant {combatant} has no attack at slot {slot}")]
    UnknownAttack { combatant: CombatantId, slot: usize },

    #[error("combatant {0} is already defeated")]
    AlreadyDefeated(CombatantId),

    #[error("'{attack}' has no uses left")]
    NoUsesLeft { attack: String },
}

impl ActionError {
    /// Missing-data errors (as opposed to rule refusals)
    pub fn is_missing_data(&self) -> bool {
        matches!(
            self,
            ActionError::UnknownCombatant(_)
                | ActionError::MissingPosition(_)
                | ActionError::UnknownAttack { .. }
        )
    }
}

/// Errors raised while loading a [`crate::config::BattleConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Errors building a terrain grid from glyph rows
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("terrain grid has no tiles")]
    Empty,

    #[error("row {row} has {found} tiles, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown terrain glyph '{glyph}' at ({x}, {y})")]
    UnknownGlyph { glyph: char, x: usize, y: usize },
}

pub type ActionResult<T> = Result<T, ActionError>;
