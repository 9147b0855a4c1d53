//! gm-core: turn and attack resolution for a grid-based creature battle
//!
//! This crate holds the battle rules only: dice, terrain, pathfinding,
//! targeting, the attack pipeline, reactions, luck tokens and the turn loop.
//! Rendering and sound sit behind the [`presenter::Presenter`] trait and the
//! player-facing log behind [`presenter::BattleLog`].
//!
//! Every random draw goes through [`rng::RandomSource`], so a battle is fully
//! reproducible from a seed or a scripted sequence.

pub mod combatant;
pub mod config;
pub mod dice;
pub mod error;
pub mod luck;
pub mod movement;
pub mod moves;
pub mod pathfinding;
pub mod pipeline;
pub mod presenter;
pub mod reaction;
pub mod rng;
pub mod sequencer;
pub mod session;
pub mod status;
pub mod targeting;
pub mod terrain;
pub mod types;
pub mod weather;

pub use combatant::{Combatant, CombatantId, CombatantTemplate, Strategy, TurnFlags};
pub use config::BattleConfig;
pub use error::{ActionError, ActionResult, ConfigError, GridError};
pub use pipeline::{AttackOutcome, AttackRequest, resolve_attack, resolve_request};
pub use presenter::{BattleLog, Effect, Presenter};
pub use rng::{GameRng, RandomSource, ScriptedRng};
pub use sequencer::{BattleSummary, TurnReport, run_battle, run_round, run_turn};
pub use session::{BattleSession, Presentation};
pub use terrain::{Scenario, Terrain, TerrainGrid};
pub use weather::Weather;
