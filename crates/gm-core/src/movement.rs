//! Walking a planned path one step at a time
//!
//! Each step moves the combatant, plays the step effect and then rolls the
//! entered tile's risk. Water damage never stops a walk unless it defeats the
//! walker; a freeze stops it on the spot.

use tracing::debug;

use crate::combatant::CombatantId;
use crate::error::{ActionError, ActionResult};
use crate::pathfinding::can_occupy;
use crate::presenter::Effect;
use crate::session::{BattleSession, Presentation};
use crate::status::{StatusInstance, StatusKind};
use crate::terrain::{TerrainEffect, status_risk};

/// Why a walk ended before its last tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Terrain damage defeated the walker
    Defeated,
    /// Snow froze the walker
    Frozen,
    /// Next tile is occupied or off the grid
    Blocked,
    /// An attack by this combatant is still in flight
    Locked,
}

/// What happened during a walk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveReport {
    /// Tiles actually entered
    pub steps: Vec<(i32, i32)>,
    pub damage_taken: u32,
    pub statuses_gained: Vec<StatusKind>,
    pub halted: Option<HaltReason>,
    pub log: Vec<String>,
}

impl MoveReport {
    fn note(&mut self, session: &BattleSession, message: String) {
        session.log_event(&message);
        self.log.push(message);
    }
}

/// Walk `path` (start excluded) applying terrain consequences per step
pub async fn walk_path(
    session: &mut BattleSession,
    id: CombatantId,
    path: &[(i32, i32)],
) -> ActionResult<MoveReport> {
    session.check_position(id)?;
    let mut report = MoveReport::default();
    let walker = session.get(id)?;
    if walker.is_defeated() {
        return Err(ActionError::AlreadyDefeated(id));
    }
    if walker.is_locked() {
        debug!(combatant = %id, "movement refused while attack in flight");
        report.halted = Some(HaltReason::Locked);
        return Ok(report);
    }

    for &(x, y) in path {
        let (from, size) = {
            let c = session.get(id)?;
            (c.pos(), c.size)
        };
        if !can_occupy(&session.grid, &session.combatants, x, y, size, &[id]) {
            report.halted = Some(HaltReason::Blocked);
            break;
        }
        let previous = session.grid.get(from.0, from.1);
        let Some(entered) = session.grid.get(x, y) else {
            report.halted = Some(HaltReason::Blocked);
            break;
        };

        {
            let c = session.get_mut(id)?;
            c.x = x;
            c.y = y;
        }
        report.steps.push((x, y));
        session
            .present(
                id,
                Effect::Step {
                    combatant: id,
                    from,
                    to: (x, y),
                },
                Presentation::Inline,
            )
            .await;
        session.pace().await;

        let risk = {
            let BattleSession {
                combatants,
                config,
                rng,
                ..
            } = &mut *session;
            status_risk(entered, previous, &combatants[id.index()], config, rng.as_mut())
        };
        let Some(effect) = risk.effect else {
            continue;
        };
        if let Some(message) = risk.message {
            report.note(session, message);
        }
        match effect {
            TerrainEffect::Damage(amount) => {
                let applied = session.get_mut(id)?.take_damage(amount);
                report.damage_taken += applied.dealt;
                if applied.defeated_now {
                    let name = session.get(id)?.species.clone();
                    report.note(session, format!("{name} fainted!"));
                    session
                        .present(id, Effect::Defeat { combatant: id }, Presentation::Inline)
                        .await;
                    report.halted = Some(HaltReason::Defeated);
                    break;
                }
            }
            TerrainEffect::Status(kind) => {
                let gained = session
                    .get_mut(id)?
                    .statuses
                    .insert(StatusInstance::new(kind, None));
                if gained {
                    report.statuses_gained.push(kind);
                    session
                        .present(
                            id,
                            Effect::Status {
                                target: id,
                                status: kind,
                            },
                            Presentation::Inline,
                        )
                        .await;
                }
                if kind == StatusKind::Frozen {
                    report.halted = Some(HaltReason::Frozen);
                    break;
                }
            }
        }
    }
    Ok(report)
}
