//! Turn sequencing and the battle loop
//!
//! Each combatant's turn runs `Movement -> Action -> End` once, in the
//! initiative order handed in by the caller. Defeated combatants are skipped.
//! A turn with nothing to do still completes so the loop always advances.

use tracing::{debug, info};

use crate::combatant::{Combatant, CombatantId, TurnFlags};
use crate::movement::{HaltReason, MoveReport, walk_path};
use crate::pathfinding::find_reachable;
use crate::pipeline::{AttackOutcome, resolve_attack};
use crate::presenter::Effect;
use crate::session::{BattleSession, Presentation};
use crate::status::{StatusKind, residual_effects, start_of_turn};
use crate::targeting::{can_strike, select_aggressive, select_target_and_attack, team_is_fleeing};

/// Flags that only live for one turn. `CURLED` survives until it absorbs a hit.
const TURN_FLAGS: TurnFlags = TurnFlags::MOVEMENT_LOCKED
    .union(TurnFlags::DODGING)
    .union(TurnFlags::REACTION_ACTIVE);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TurnPhase {
    Movement,
    Action,
    End,
}

/// Whose turn it is and where it stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnContext {
    pub combatant: CombatantId,
    pub phase: TurnPhase,
    /// Defender whose reaction is still being waited on
    pub pending_reaction: Option<CombatantId>,
}

/// Why a combatant did not act
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Defeated,
    /// Lost the turn to a status (asleep, frozen, full paralysis, infatuation)
    Status(StatusKind),
}

/// Everything one turn did
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub combatant: CombatantId,
    /// Phases entered, in order
    pub phases: Vec<TurnPhase>,
    pub skipped: Option<SkipReason>,
    pub movement: Option<MoveReport>,
    pub action: Option<AttackOutcome>,
    /// Every detached reaction effect finished before the barrier timed out
    pub reactions_settled: bool,
    pub residual_damage: u32,
    pub residual_healing: u32,
    /// Timed statuses that wore off at end of turn
    pub expired: Vec<StatusKind>,
    pub defeated: bool,
    pub log: Vec<String>,
}

impl TurnReport {
    fn new(combatant: CombatantId) -> Self {
        Self {
            combatant,
            phases: Vec::new(),
            skipped: None,
            movement: None,
            action: None,
            reactions_settled: true,
            residual_damage: 0,
            residual_healing: 0,
            expired: Vec::new(),
            defeated: false,
            log: Vec::new(),
        }
    }

    fn note(&mut self, session: &BattleSession, message: String) {
        session.log_event(&message);
        self.log.push(message);
    }
}

/// Result of a whole battle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleSummary {
    /// Last team standing; `None` on a draw or when the round cap was hit
    pub winner: Option<u8>,
    pub rounds: u32,
    pub turns: u32,
}

fn enter(session: &mut BattleSession, report: &mut TurnReport, phase: TurnPhase) {
    if let Some(ctx) = session.turn.as_mut() {
        ctx.phase = phase;
    }
    report.phases.push(phase);
    debug!(combatant = %report.combatant, %phase, "turn phase");
}

/// Run one full turn for `id`
pub async fn run_turn(session: &mut BattleSession, id: CombatantId) -> TurnReport {
    let mut report = TurnReport::new(id);
    if !session.combatant(id).is_some_and(Combatant::is_alive) {
        report.skipped = Some(SkipReason::Defeated);
        return report;
    }
    session.turn = Some(TurnContext {
        combatant: id,
        phase: TurnPhase::Movement,
        pending_reaction: None,
    });

    let gate = match session.combatant_and_rng(id) {
        Ok((c, rng)) => start_of_turn(&mut c.statuses, rng),
        Err(_) => Default::default(),
    };
    let name = session.combatants[id.index()].species.clone();
    if gate.thawed {
        report.note(session, format!("{name} thawed out!"));
    }

    if let Some(kind) = gate.skip {
        report.skipped = Some(SkipReason::Status(kind));
        report.note(session, format!("{name} is {kind} and cannot act!"));
    } else {
        enter(session, &mut report, TurnPhase::Movement);
        movement_phase(session, id, &mut report).await;

        if session.combatants[id.index()].is_alive() {
            enter(session, &mut report, TurnPhase::Action);
            action_phase(session, id, &mut report).await;
        }
    }

    if session.combatants[id.index()].is_alive() {
        enter(session, &mut report, TurnPhase::End);
        end_phase(session, id, &mut report).await;
    }
    report.defeated = session.combatants[id.index()].is_defeated();
    session.clear_flags(id, TURN_FLAGS);
    session.turn = None;
    report
}

async fn movement_phase(session: &mut BattleSession, id: CombatantId, report: &mut TurnReport) {
    let Some(path) = plan_movement(session, id) else {
        return;
    };
    match walk_path(session, id, &path).await {
        Ok(walk) => {
            if walk.halted == Some(HaltReason::Defeated) {
                report.defeated = true;
            }
            report.movement = Some(walk);
        }
        Err(err) => debug!(combatant = %id, error = %err, "movement skipped"),
    }
}

/// Path to walk this turn, if any.
///
/// A fleeing team heads for the tile farthest from the nearest enemy.
/// Otherwise a combatant that can already strike holds, and one that cannot
/// closes in on the nearest enemy, preferring the safest path on ties.
pub fn plan_movement(session: &BattleSession, id: CombatantId) -> Option<Vec<(i32, i32)>> {
    let combatants = session.combatants();
    let me = session.combatant(id).filter(|c| c.is_alive())?;
    let points = me.movement_points();
    if points == 0 {
        return None;
    }
    let enemies: Vec<&Combatant> = combatants
        .iter()
        .filter(|c| c.is_alive() && c.is_enemy_of(me))
        .collect();
    if enemies.is_empty() {
        return None;
    }

    let fleeing = team_is_fleeing(combatants, me);
    if !fleeing {
        let can_attack_now = me
            .usable_attacks()
            .filter(|(_, a)| a.is_offensive())
            .any(|(_, a)| enemies.iter().any(|e| can_strike(combatants, me, e, a)));
        if can_attack_now {
            return None;
        }
    }

    let tiles = find_reachable(session.grid(), combatants, me.pos(), points, me, id);
    let radius = me.footprint_radius();
    let mut best: Option<(usize, u32, f32)> = None;
    for (i, tile) in tiles.iter().enumerate() {
        if fleeing {
            let safety = enemies
                .iter()
                .map(|e| e.manhattan_to(tile.x, tile.y))
                .min()
                .unwrap_or(0);
            if best.is_none_or(|(_, s, _)| safety > s) {
                best = Some((i, safety, tile.total_weight));
            }
        } else {
            let gap = enemies
                .iter()
                .map(|e| {
                    let centre = e.manhattan_to(tile.x, tile.y) as i32;
                    (centre - radius - e.footprint_radius()).max(0) as u32
                })
                .min()
                .unwrap_or(0);
            if best.is_none_or(|(_, g, w)| gap < g || (gap == g && tile.total_weight < w)) {
                best = Some((i, gap, tile.total_weight));
            }
        }
    }
    let (index, _, _) = best?;
    let path = tiles.into_iter().nth(index)?.path;
    (!path.is_empty()).then_some(path)
}

async fn action_phase(session: &mut BattleSession, id: CombatantId, report: &mut TurnReport) {
    if team_is_fleeing(session.combatants(), &session.combatants[id.index()]) {
        debug!(combatant = %id, "fleeing, no attack");
        return;
    }
    let selection = {
        let BattleSession {
            combatants,
            config,
            rng,
            ..
        } = &mut *session;
        select_target_and_attack(combatants, id, config, rng.as_mut())
    }
    .or_else(|| select_aggressive(session.combatants(), id));

    let Some(selection) = selection else {
        debug!(combatant = %id, "no legal target");
        return;
    };
    let outcome = resolve_attack(session, id, selection.target, selection.slot).await;
    if let Some(reaction) = &outcome.reaction {
        if let Some(ctx) = session.turn.as_mut() {
            ctx.pending_reaction = Some(reaction.reactor);
        }
    }
    report.reactions_settled = session.wait_for_all_reactions().await;
    if let Some(ctx) = session.turn.as_mut() {
        ctx.pending_reaction = None;
    }
    report.action = Some(outcome);
}

/// Residual status damage, status countdown and flag cleanup
async fn end_phase(session: &mut BattleSession, id: CombatantId, report: &mut TurnReport) {
    let (name, residuals) = {
        let c = &session.combatants[id.index()];
        (c.species.clone(), residual_effects(&c.statuses, c.max_hp, &c.ability))
    };

    for residual in residuals {
        let kind = residual.kind;
        if residual.heals {
            let gained = session.combatants[id.index()].heal(residual.amount);
            report.residual_healing += gained;
            if gained > 0 {
                report.note(session, format!("{name} restored HP thanks to its {kind}."));
            }
            continue;
        }

        let applied = session.combatants[id.index()].take_damage(residual.amount);
        report.residual_damage += applied.dealt;
        report.note(session, format!("{name} is hurt by its {kind}!"));
        if let Some(source) = residual.drain_to {
            if let Some(drainer) = session.combatant_mut(source).filter(|c| c.is_alive()) {
                let gained = drainer.heal(applied.dealt);
                let drainer = drainer.species.clone();
                if gained > 0 {
                    report.note(session, format!("{drainer} drained {gained} HP from {name}."));
                }
            }
        }
        if applied.defeated_now {
            report.note(session, format!("{name} fainted!"));
            session
                .present(id, Effect::Defeat { combatant: id }, Presentation::Inline)
                .await;
            return;
        }
    }

    let expired = session.combatants[id.index()].statuses.tick();
    for kind in &expired {
        report.note(session, format!("{name}'s {kind} wore off."));
    }
    report.expired = expired;
}

/// One turn for every living combatant in `initiative` order.
///
/// Stops early once only one team is left standing.
pub async fn run_round(session: &mut BattleSession, initiative: &[CombatantId]) -> Vec<TurnReport> {
    let mut reports = Vec::with_capacity(initiative.len());
    for &id in initiative {
        if session.is_over() {
            break;
        }
        if !session.combatant(id).is_some_and(Combatant::is_alive) {
            continue;
        }
        reports.push(run_turn(session, id).await);
    }
    reports
}

/// Run rounds until one team is left or `max_rounds` is reached
pub async fn run_battle(session: &mut BattleSession, initiative: &[CombatantId], max_rounds: u32) -> BattleSummary {
    let mut rounds = 0;
    let mut turns = 0;
    while rounds < max_rounds && !session.is_over() {
        rounds += 1;
        debug!(round = rounds, "round start");
        let reports = run_round(session, initiative).await;
        turns += reports.len() as u32;
    }
    session.wait_for_all_reactions().await;
    session.force_complete_all();

    let winner = match session.living_teams().as_slice() {
        [team] => Some(*team),
        _ => None,
    };
    info!(?winner, rounds, turns, "battle finished");
    BattleSummary { winner, rounds, turns }
}
