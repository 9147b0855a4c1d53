//! Defender reactions
//!
//! Before dodging, a defender holding a usable reaction move may react
//! instead. A reaction replaces the dodge entirely and the incoming attack is
//! then guaranteed to land. The reaction's own effects play detached; callers
//! wait for them with [`BattleSession::wait_for_all_reactions`].

use tracing::debug;

use crate::combatant::{Combatant, CombatantId, Strategy, TurnFlags};
use crate::moves::{Attack, BuffStat, MoveBehavior};
use crate::pipeline::{AttackOutcome, AttackRequest, resolve_request};
use crate::presenter::Effect;
use crate::session::{BattleSession, Presentation};
use crate::status::{StatusKind, can_apply, try_inflict};
use crate::targeting::{can_strike, in_range};

/// What the reaction did
#[derive(Debug, Clone, PartialEq)]
pub enum ReactionKind {
    /// Stage change on the reactor
    Buff { stat: BuffStat, change: i8 },
    /// Reactor curled up; the incoming hit is halved
    Curl,
    /// Status aimed at the attacker
    Status { applied: Option<StatusKind> },
    /// Offensive move fired back through the attack pipeline
    Counter(Box<AttackOutcome>),
}

/// A reaction that fired
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionReport {
    pub reactor: CombatantId,
    pub slot: usize,
    pub attack: String,
    pub kind: ReactionKind,
}

/// Whether a reaction move makes sense against this incoming attack
pub fn is_eligible(
    combatants: &[Combatant],
    reactor: &Combatant,
    attacker: &Combatant,
    reaction: &Attack,
    incoming: &Attack,
) -> bool {
    match reaction.behavior {
        MoveBehavior::SelfCurl => incoming.power > 0,
        MoveBehavior::Buff { .. } => true,
        MoveBehavior::StatusInflict => {
            attacker.is_alive()
                && in_range(reactor, attacker, reaction)
                && reaction.status.is_some_and(|s| {
                    can_apply(s.kind, attacker.types, &attacker.ability, &attacker.statuses).is_ok()
                })
        }
        MoveBehavior::Standard | MoveBehavior::MultiHit { .. } => {
            reaction.is_offensive() && can_strike(combatants, reactor, attacker, reaction)
        }
    }
}

/// Roll for and run a reaction by `defender` against `incoming`.
///
/// Takes one activation draw when the defender holds any usable reaction
/// move, and one more to pick among the eligible ones.
pub async fn try_reaction(
    session: &mut BattleSession,
    defender: CombatantId,
    attacker: CombatantId,
    incoming: &Attack,
) -> Option<ReactionReport> {
    let (candidates, chance) = {
        let d = session.combatant(defender)?;
        if d.is_defeated() || d.statuses.cannot_dodge() {
            return None;
        }
        let candidates: Vec<usize> = d.reaction_moves().map(|(i, _)| i).collect();
        let chance = if d.strategy == Strategy::Reinforcing {
            session.config.reinforcing_reaction_chance
        } else {
            session.config.reaction_chance
        };
        (candidates, chance)
    };
    if candidates.is_empty() || !session.rng.percent(chance) {
        return None;
    }

    let eligible: Vec<usize> = {
        let d = session.combatant(defender)?;
        let a = session.combatant(attacker)?;
        candidates
            .into_iter()
            .filter(|&i| is_eligible(&session.combatants, d, a, &d.attacks[i], incoming))
            .collect()
    };
    if eligible.is_empty() {
        debug!(combatant = %defender, "reaction rolled but no move is eligible");
        return None;
    }
    let slot = eligible[session.rng.choose_index(eligible.len())?];

    session.set_flags(defender, TurnFlags::REACTION_ACTIVE);
    Some(execute_reaction(session, defender, attacker, slot).await)
}

/// Run reaction move `slot` of `reactor` against `attacker`
async fn execute_reaction(
    session: &mut BattleSession,
    reactor: CombatantId,
    attacker: CombatantId,
    slot: usize,
) -> ReactionReport {
    let (name, reaction) = {
        let r = &session.combatants[reactor.index()];
        (r.species.clone(), r.attacks[slot].clone())
    };
    session.log_event(&format!("{name} reacts with {}!", reaction.name));
    session
        .present(
            reactor,
            Effect::Reaction {
                combatant: reactor,
                attack: reaction.name.clone(),
            },
            Presentation::Detached,
        )
        .await;

    let kind = match reaction.behavior {
        MoveBehavior::Buff { stat, stages } => {
            let r = &mut session.combatants[reactor.index()];
            r.attacks[slot].consume();
            let change = r.stages.apply(stat, stages);
            ReactionKind::Buff { stat, change }
        }
        MoveBehavior::SelfCurl => {
            let r = &mut session.combatants[reactor.index()];
            r.attacks[slot].consume();
            r.flags.insert(TurnFlags::CURLED);
            session.log_event(&format!("{name} curled up!"));
            ReactionKind::Curl
        }
        MoveBehavior::StatusInflict => {
            session.combatants[reactor.index()].attacks[slot].consume();
            let applied = inflict_on_attacker(session, reactor, attacker, &reaction);
            ReactionKind::Status { applied }
        }
        MoveBehavior::Standard | MoveBehavior::MultiHit { .. } => {
            ReactionKind::Counter(Box::new(counter_attack(session, reactor, attacker, slot).await))
        }
    };
    debug!(reactor = %reactor, attack = %reaction.name, ?kind, "reaction resolved");
    ReactionReport {
        reactor,
        slot,
        attack: reaction.name,
        kind,
    }
}

fn inflict_on_attacker(
    session: &mut BattleSession,
    reactor: CombatantId,
    attacker: CombatantId,
    reaction: &Attack,
) -> Option<StatusKind> {
    let status = reaction.status?;
    let (target, rng) = session.combatant_and_rng(attacker).ok()?;
    let applied = try_inflict(
        &mut target.statuses,
        status.kind,
        status.chance,
        Some(reactor),
        target.types,
        &target.ability,
        rng,
    )
    .is_ok();
    if applied {
        let name = target.species.clone();
        session.log_event(&format!("{name} is now {}!", status.kind));
        Some(status.kind)
    } else {
        None
    }
}

/// Fire an offensive reaction through the pipeline with the reactor's move
/// list narrowed to the reaction move. The full list is always restored,
/// with the reaction move's spent PP and ammo carried back.
async fn counter_attack(
    session: &mut BattleSession,
    reactor: CombatantId,
    attacker: CombatantId,
    slot: usize,
) -> AttackOutcome {
    let saved = {
        let r = &mut session.combatants[reactor.index()];
        let saved = std::mem::take(&mut r.attacks);
        r.attacks.push(saved[slot].clone());
        saved
    };

    let request = AttackRequest {
        attacker: reactor,
        target: attacker,
        slot: 0,
        allow_reaction: false,
        presentation: Presentation::Detached,
    };
    let outcome = Box::pin(resolve_request(session, request)).await;

    let r = &mut session.combatants[reactor.index()];
    let used = r.attacks.pop();
    r.attacks = saved;
    if let (Some(used), Some(original)) = (used, r.attacks.get_mut(slot)) {
        original.current_pp = used.current_pp;
        original.current_ammo = used.current_ammo;
    }
    outcome
}
