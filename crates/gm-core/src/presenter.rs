//! Outbound seams: visual effects and the battle log
//!
//! The presentation layer never touches game state. It is handed an owned
//! [`Effect`] and reports completion by returning from `play_effect`.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::combatant::CombatantId;
use crate::status::StatusKind;

/// A visual effect the core asks the presentation layer to play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Step {
        combatant: CombatantId,
        from: (i32, i32),
        to: (i32, i32),
    },
    AttackStart {
        attacker: CombatantId,
        target: CombatantId,
        attack: String,
    },
    Projectile {
        attacker: CombatantId,
        index: u8,
        from: (i32, i32),
        to: (i32, i32),
    },
    Miss {
        attacker: CombatantId,
        target: CombatantId,
    },
    Dodge {
        combatant: CombatantId,
        from: (i32, i32),
        to: (i32, i32),
    },
    Reaction {
        combatant: CombatantId,
        attack: String,
    },
    Hit {
        target: CombatantId,
        damage: u32,
    },
    Status {
        target: CombatantId,
        status: StatusKind,
    },
    Defeat {
        combatant: CombatantId,
    },
}

/// Presentation layer (animations, sound)
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Play an effect; returning signals completion
    async fn play_effect(&self, effect: Effect);
}

/// Presenter that completes every effect immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

#[async_trait]
impl Presenter for NullPresenter {
    async fn play_effect(&self, _effect: Effect) {}
}

/// Presenter that records every effect it is asked to play
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    effects: Mutex<Vec<Effect>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Effects played so far, in order
    pub fn effects(&self) -> Vec<Effect> {
        lock(&self.effects).clone()
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn play_effect(&self, effect: Effect) {
        lock(&self.effects).push(effect);
    }
}

/// Player-facing battle log. Messages are opaque text.
pub trait BattleLog: Send + Sync {
    fn log_event(&self, message: &str);
}

/// Log that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl BattleLog for NullLog {
    fn log_event(&self, _message: &str) {}
}

/// Log that keeps every message in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        lock(&self.lines).iter().any(|l| l.contains(needle))
    }
}

impl BattleLog for MemoryLog {
    fn log_event(&self, message: &str) {
        lock(&self.lines).push(message.to_string());
    }
}

/// Lock a mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_presenter_keeps_order() {
        let presenter = RecordingPresenter::new();
        presenter
            .play_effect(Effect::Defeat {
                combatant: CombatantId(1),
            })
            .await;
        presenter
            .play_effect(Effect::Hit {
                target: CombatantId(2),
                damage: 7,
            })
            .await;
        let effects = presenter.effects();
        assert_eq!(effects.len(), 2);
        assert!(matches!(effects[1], Effect::Hit { damage: 7, .. }));
    }

    #[test]
    fn test_memory_log() {
        let log = MemoryLog::new();
        log.log_event("Pikachu used Thunderbolt!");
        log.log_event("It's super effective!");
        assert_eq!(log.lines().len(), 2);
        assert!(log.contains("Thunderbolt"));
        NullLog.log_event("dropped");
    }

    #[test]
    fn test_effect_serializes_tagged() {
        let json = serde_json::to_string(&Effect::Defeat {
            combatant: CombatantId(3),
        })
        .unwrap();
        assert_eq!(json, r#"{"effect":"defeat","combatant":3}"#);
    }
}
