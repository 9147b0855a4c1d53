//! Target and attack selection by strategy label
//!
//! Selection is pure apart from the random draws it takes from the supplied
//! source. It never mutates combatants.

use tracing::{debug, warn};

use crate::combatant::{Combatant, CombatantId, Strategy};
use crate::config::BattleConfig;
use crate::moves::{Attack, BuffStat, MoveCategory};
use crate::pathfinding::line_of_fire_clear;
use crate::rng::RandomSource;
use crate::status::can_apply;
use crate::types::effectiveness;

/// An attack slot aimed at a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub target: CombatantId,
    /// Index into the attacker's move list
    pub slot: usize,
}

/// Target's footprint is within the attack's range
pub fn in_range(attacker: &Combatant, target: &Combatant, attack: &Attack) -> bool {
    attacker.edge_distance(target) <= attack.range
}

/// In range and, for ranged attacks, not blocked by an ally
pub fn can_strike(combatants: &[Combatant], attacker: &Combatant, target: &Combatant, attack: &Attack) -> bool {
    target.is_alive()
        && in_range(attacker, target, attack)
        && (!attack.is_ranged() || line_of_fire_clear(combatants, attacker, target))
}

/// Attacker/defender stat ratio for a move category, clamped to `[0.25, 4]`
pub(crate) fn stat_ratio(attacker: &Combatant, defender: &Combatant, category: MoveCategory) -> f32 {
    let (atk, def) = match category {
        MoveCategory::Special => (BuffStat::SpecialAttack, BuffStat::SpecialDefense),
        _ => (BuffStat::Attack, BuffStat::Defense),
    };
    (attacker.effective_stat(atk) / defender.effective_stat(def)).clamp(0.25, 4.0)
}

/// Damage estimate used for scoring.
///
/// `None` when the defender is immune by type or ability, or the move deals
/// no damage.
pub fn estimate_damage(attacker: &Combatant, defender: &Combatant, attack: &Attack) -> Option<f32> {
    if !attack.is_offensive() || defender.ability.blocks(attack.element) {
        return None;
    }
    let eff = effectiveness(attack.element, defender.types);
    if eff == 0.0 {
        return None;
    }
    Some(attack.power as f32 * eff * stat_ratio(attacker, defender, attack.category))
}

fn enemies<'a>(combatants: &'a [Combatant], actor: &'a Combatant) -> impl Iterator<Item = &'a Combatant> + 'a {
    combatants
        .iter()
        .filter(move |c| c.is_alive() && c.is_enemy_of(actor))
}

/// Every living teammate (self included) is fleeing
pub fn team_is_fleeing(combatants: &[Combatant], actor: &Combatant) -> bool {
    combatants
        .iter()
        .filter(|c| c.is_alive() && c.team == actor.team)
        .all(|c| c.strategy == Strategy::Fleeing)
}

/// Pick a target and attack for `actor` according to its strategy.
///
/// Returns `None` when nothing sensible is in reach, or when aiming finds
/// only immune targets; the caller then falls back to [`select_aggressive`].
pub fn select_target_and_attack(
    combatants: &[Combatant],
    actor: CombatantId,
    config: &BattleConfig,
    rng: &mut dyn RandomSource,
) -> Option<Selection> {
    let me = combatants.get(actor.index()).filter(|c| c.is_alive())?;

    if let Some(selection) = prefer_status_move(combatants, me, config, rng) {
        return Some(selection);
    }

    match me.strategy {
        Strategy::Opportunistic => select_opportunistic(combatants, me, rng),
        Strategy::Aiming => select_aiming(combatants, me),
        Strategy::Fleeing if team_is_fleeing(combatants, me) => None,
        _ => select_aggressive(combatants, actor),
    }
}

/// Nearest enemy in range of the strongest usable attack that reaches one.
/// Enemies immune to that attack are not candidates.
///
/// Attacks are tried by descending power; distance ties keep the first
/// enemy in list order.
pub fn select_aggressive(combatants: &[Combatant], actor: CombatantId) -> Option<Selection> {
    let me = combatants.get(actor.index()).filter(|c| c.is_alive())?;
    let mut offensive: Vec<(usize, &Attack)> =
        me.usable_attacks().filter(|(_, a)| a.is_offensive()).collect();
    offensive.sort_by(|a, b| b.1.power.cmp(&a.1.power));

    for (slot, attack) in offensive {
        let mut best: Option<(&Combatant, u32)> = None;
        for enemy in enemies(combatants, me) {
            if !can_strike(combatants, me, enemy, attack) || estimate_damage(me, enemy, attack).is_none() {
                continue;
            }
            let distance = me.edge_distance(enemy);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((enemy, distance));
            }
        }
        if let Some((enemy, _)) = best {
            return Some(Selection {
                target: enemy.id,
                slot,
            });
        }
    }
    None
}

/// Highest scoring (enemy, attack) pair; strict `>` keeps the first on ties
fn select_opportunistic(
    combatants: &[Combatant],
    me: &Combatant,
    rng: &mut dyn RandomSource,
) -> Option<Selection> {
    let mut best: Option<(Selection, f32)> = None;
    for enemy in enemies(combatants, me) {
        for (slot, attack) in me.usable_attacks().filter(|(_, a)| a.is_offensive()) {
            if !can_strike(combatants, me, enemy, attack) {
                continue;
            }
            let Some(estimate) = estimate_damage(me, enemy, attack) else {
                continue;
            };
            let bonus = if enemy.hp_fraction() < 0.5 {
                rng.dice(2, 6) as f32
            } else {
                0.0
            };
            let damage = estimate + bonus;
            let score = if damage >= enemy.hp as f32 { damage * 3.0 } else { damage };
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((
                    Selection {
                        target: enemy.id,
                        slot,
                    },
                    score,
                ));
            }
        }
    }
    best.map(|(selection, _)| selection)
}

/// Longest-range attack against the enemy it hurts most
fn select_aiming(combatants: &[Combatant], me: &Combatant) -> Option<Selection> {
    let (slot, attack) = me
        .usable_attacks()
        .filter(|(_, a)| a.is_offensive())
        .fold(None, |best: Option<(usize, &Attack)>, (i, a)| match best {
            Some((_, b)) if b.range >= a.range => best,
            _ => Some((i, a)),
        })?;

    let mut reachable = 0;
    let mut best: Option<(CombatantId, f32)> = None;
    for enemy in enemies(combatants, me) {
        if !can_strike(combatants, me, enemy, attack) {
            continue;
        }
        reachable += 1;
        let Some(estimate) = estimate_damage(me, enemy, attack) else {
            continue;
        };
        if best.is_none_or(|(_, s)| estimate > s) {
            best = Some((enemy.id, estimate));
        }
    }

    match best {
        Some((target, _)) => Some(Selection { target, slot }),
        None => {
            if reachable > 0 {
                warn!(
                    combatant = %me.id,
                    attack = %attack.name,
                    "every target in range is immune, falling back to aggressive"
                );
            }
            None
        }
    }
}

/// Status-preference roll: 1-100 plus the strategy modifier, at most the
/// threshold picks a random status move for this turn.
fn prefer_status_move(
    combatants: &[Combatant],
    me: &Combatant,
    config: &BattleConfig,
    rng: &mut dyn RandomSource,
) -> Option<Selection> {
    let status_moves: Vec<(usize, &Attack)> =
        me.usable_attacks().filter(|(_, a)| a.is_status_move()).collect();
    let has_offensive = me.usable_attacks().any(|(_, a)| a.is_offensive());
    if status_moves.is_empty() || !has_offensive {
        return None;
    }

    let roll = rng.rnd(100) as i32 + me.strategy.status_roll_modifier();
    if roll > config.status_preference_threshold {
        return None;
    }
    let (slot, attack) = status_moves[rng.choose_index(status_moves.len())?];
    let status = attack.status?;

    let target = enemies(combatants, me)
        .filter(|e| can_strike(combatants, me, e, attack))
        .filter(|e| can_apply(status.kind, e.types, &e.ability, &e.statuses).is_ok())
        .min_by_key(|e| me.edge_distance(e))?;
    debug!(combatant = %me.id, attack = %attack.name, roll, "status move preferred");
    Some(Selection {
        target: target.id,
        slot,
    })
}
