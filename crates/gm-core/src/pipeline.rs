//! Attack resolution
//!
//! One call resolves one attack from validation to cleanup:
//!
//! 1. validate the attacker, target, move and positions
//! 2. lock the attacker's movement and spend one use of the move
//! 3. roll accuracy, optionally spending a luck token on a poor roll
//! 4. compare against the weather hit threshold
//! 5. let the defender react, or dodge (with its own luck reroll)
//! 6. apply damage, defeat handling and on-hit status
//! 7. play the collected effects and release the lock
//!
//! Multi-hit moves run the full defense only for the first projectile; the
//! rest fan out across the move's cone and strike whatever they meet first.

use hashbrown::HashSet;
use tracing::{debug, warn};

use crate::combatant::{Combatant, CombatantId, TurnFlags};
use crate::dice::{RollResult, dice_pool, roll_dice};
use crate::error::{ActionError, ActionResult};
use crate::luck::{award_tokens, defeat_reward, should_use_luck_token, use_luck_token};
use crate::moves::{AreaShape, Attack, MoveBehavior};
use crate::pathfinding::{adjacent_free_tile, bresenham, combatant_at};
use crate::presenter::Effect;
use crate::reaction::{ReactionReport, try_reaction};
use crate::session::{BattleSession, Presentation};
use crate::status::{StatusKind, try_inflict};
use crate::targeting::{estimate_damage, stat_ratio};
use crate::types::effectiveness;


/// One attack to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackRequest {
    pub attacker: CombatantId,
    pub target: CombatantId,
    /// Index into the attacker's move list
    pub slot: usize,
    /// Whether the defender may react instead of dodging
    pub allow_reaction: bool,
    pub presentation: Presentation,
}

impl AttackRequest {
    pub fn new(attacker: CombatantId, target: CombatantId, slot: usize) -> Self {
        Self {
            attacker,
            target,
            slot,
            allow_reaction: true,
            presentation: Presentation::Inline,
        }
    }
}

/// Which roll a [`RecordedRoll`] was
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollKind {
    Accuracy,
    AccuracyReroll,
    Dodge,
    DodgeReroll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRoll {
    pub kind: RollKind,
    pub roll: RollResult,
}

/// Damage landed on one combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRecord {
    pub target: CombatantId,
    /// Projectile index; 0 for single-target moves
    pub projectile: u8,
    pub damage: u32,
    pub defeated: bool,
}

/// Everything that happened while resolving one attack
#[derive(Debug, Clone, PartialEq)]
pub struct AttackOutcome {
    pub attacker: CombatantId,
    pub target: CombatantId,
    pub attack: Option<String>,
    /// At least one hit landed (or a self move took effect)
    pub success: bool,
    /// Stopped by the weather threshold before any defense
    pub missed: bool,
    /// Attacker's net successes after luck and botch adjustments
    pub net_successes: i32,
    pub rolls: Vec<RecordedRoll>,
    /// Total damage dealt across all hits
    pub damage: u32,
    pub hits: Vec<HitRecord>,
    pub target_defeated: bool,
    pub dodge_attempted: bool,
    pub dodged: bool,
    pub reaction: Option<ReactionReport>,
    pub status_applied: Option<StatusKind>,
    pub luck_tokens_used: u32,
    /// The effect sequence hit the hard timeout
    pub animation_forced: bool,
    pub effects: Vec<Effect>,
    pub log: Vec<String>,
    pub error: Option<ActionError>,
}

impl AttackOutcome {
    fn new(request: &AttackRequest) -> Self {
        Self {
            attacker: request.attacker,
            target: request.target,
            attack: None,
            success: false,
            missed: false,
            net_successes: 0,
            rolls: Vec::new(),
            damage: 0,
            hits: Vec::new(),
            target_defeated: false,
            dodge_attempted: false,
            dodged: false,
            reaction: None,
            status_applied: None,
            luck_tokens_used: 0,
            animation_forced: false,
            effects: Vec::new(),
            log: Vec::new(),
            error: None,
        }
    }

    fn note(&mut self, session: &BattleSession, message: String) {
        session.log_event(&message);
        self.log.push(message);
    }

    pub fn reaction_triggered(&self) -> bool {
        self.reaction.is_some()
    }

    /// First recorded roll of `kind`
    pub fn roll(&self, kind: RollKind) -> Option<&RollResult> {
        self.rolls.iter().find(|r| r.kind == kind).map(|r| &r.roll)
    }
}

/// Damage one hit deals: power x type effectiveness x stat ratio, halved
/// against a curled defender.
///
/// Zero for status moves and immune defenders; otherwise at least 1.
pub fn compute_damage(attacker: &Combatant, defender: &Combatant, attack: &Attack) -> u32 {
    if !attack.is_offensive() || defender.ability.blocks(attack.element) {
        return 0;
    }
    let eff = effectiveness(attack.element, defender.types);
    if eff == 0.0 {
        return 0;
    }
    let mut damage = attack.power as f32 * eff * stat_ratio(attacker, defender, attack.category);
    if defender.flags.contains(TurnFlags::CURLED) {
        damage *= 0.5;
    }
    (damage.floor() as u32).max(1)
}

/// Resolve move `slot` of `attacker` against `target`, played inline with
/// reactions allowed
pub async fn resolve_attack(
    session: &mut BattleSession,
    attacker: CombatantId,
    target: CombatantId,
    slot: usize,
) -> AttackOutcome {
    resolve_request(session, AttackRequest::new(attacker, target, slot)).await
}

/// Resolve one attack request.
///
/// Validation failures come back as an outcome carrying `error`, with no
/// state touched and no random draw taken.
pub async fn resolve_request(session: &mut BattleSession, request: AttackRequest) -> AttackOutcome {
    let mut outcome = AttackOutcome::new(&request);
    let attack = match validate(session, &request) {
        Ok(attack) => attack,
        Err(err) => {
            warn!(attacker = %request.attacker, target = %request.target, error = %err, "attack aborted");
            outcome.note(session, format!("The attack could not be carried out: {err}"));
            outcome.error = Some(err);
            return outcome;
        }
    };
    outcome.attack = Some(attack.name.clone());

    session.set_flags(request.attacker, TurnFlags::MOVEMENT_LOCKED);
    session.combatants[request.attacker.index()].attacks[request.slot].consume();

    match attack.behavior {
        MoveBehavior::Buff { .. } | MoveBehavior::SelfCurl => {
            resolve_self_move(session, &request, &attack, &mut outcome);
        }
        MoveBehavior::MultiHit { projectiles } => {
            resolve_multi_hit(session, &request, &attack, projectiles, &mut outcome).await;
        }
        MoveBehavior::Standard | MoveBehavior::StatusInflict => {
            resolve_single(session, &request, &attack, &mut outcome).await;
        }
    }

    let effects = outcome.effects.clone();
    outcome.animation_forced = !session
        .play_sequence(request.attacker, effects, request.presentation)
        .await;

    session.clear_flags(request.attacker, TurnFlags::MOVEMENT_LOCKED);
    if request.target != request.attacker {
        session.clear_flags(request.target, TurnFlags::REACTION_ACTIVE);
    }
    debug!(
        attacker = %request.attacker,
        target = %request.target,
        attack = %attack.name,
        success = outcome.success,
        net = outcome.net_successes,
        damage = outcome.damage,
        "attack resolved"
    );
    outcome
}

fn validate(session: &BattleSession, request: &AttackRequest) -> ActionResult<Attack> {
    let attacker = session.get(request.attacker)?;
    let target = session.get(request.target)?;
    if attacker.is_defeated() {
        return Err(ActionError::AlreadyDefeated(request.attacker));
    }
    if target.is_defeated() {
        return Err(ActionError::AlreadyDefeated(request.target));
    }
    session.check_position(request.attacker)?;
    session.check_position(request.target)?;
    let attack = attacker.attacks.get(request.slot).ok_or(ActionError::UnknownAttack {
        combatant: request.attacker,
        slot: request.slot,
    })?;
    if !attack.is_usable() {
        return Err(ActionError::NoUsesLeft {
            attack: attack.name.clone(),
        });
    }
    Ok(attack.clone())
}

/// Roll the attacker's accuracy pool, with a luck reroll on a poor result
fn roll_accuracy(session: &mut BattleSession, request: &AttackRequest, attack: &Attack, outcome: &mut AttackOutcome) -> i32 {
    let cap = session.config.dice_cap;
    let modifier = session.weather.accuracy_modifier();
    let Ok((attacker, rng)) = session.combatant_and_rng(request.attacker) else {
        return 0;
    };
    let dice = dice_pool(attacker.accuracy_skill() + attack.accuracy + modifier, cap);
    let roll = roll_dice(dice as i32, rng);
    let mut net = roll.net_successes;
    let mut message = None;
    outcome.rolls.push(RecordedRoll {
        kind: RollKind::Accuracy,
        roll: roll.clone(),
    });
    if attacker.luck_tokens > 0 && should_use_luck_token(net, false, rng) {
        let luck = use_luck_token(attacker, &roll, dice, rng);
        if let Some(reroll) = luck.reroll {
            outcome.rolls.push(RecordedRoll {
                kind: RollKind::AccuracyReroll,
                roll: reroll,
            });
        }
        net = luck.roll.net_successes;
        outcome.luck_tokens_used += 1;
        message = Some(format!("{} used a luck token!", attacker.species));
    }
    if let Some(message) = message {
        outcome.note(session, message);
    }
    net
}

/// Reaction or dodge. Returns true if the attack lands; `net` picks up the
/// botch bonus from a negative dodge.
async fn defend(
    session: &mut BattleSession,
    request: &AttackRequest,
    attack: &Attack,
    net: &mut i32,
    outcome: &mut AttackOutcome,
) -> bool {
    if request.allow_reaction {
        if let Some(report) = try_reaction(session, request.target, request.attacker, attack).await {
            outcome.reaction = Some(report);
            return true;
        }
    }

    outcome.dodge_attempted = true;
    let cap = session.config.dice_cap;
    let (critical, helpless) = {
        let attacker = &session.combatants[request.attacker.index()];
        let defender = &session.combatants[request.target.index()];
        let critical = estimate_damage(attacker, defender, attack).is_some_and(|d| d >= defender.hp as f32);
        (critical, defender.statuses.cannot_dodge())
    };
    if helpless {
        debug!(combatant = %request.target, "defender cannot dodge");
        return true;
    }

    session.set_flags(request.target, TurnFlags::DODGING);
    let mut message = None;
    let dodge_net = {
        let Ok((defender, rng)) = session.combatant_and_rng(request.target) else {
            return true;
        };
        let dice = dice_pool(defender.dodge_skill(), cap);
        let roll = roll_dice(dice as i32, rng);
        let mut dodge_net = roll.net_successes;
        let failing = dodge_net < *net;
        outcome.rolls.push(RecordedRoll {
            kind: RollKind::Dodge,
            roll: roll.clone(),
        });
        if failing && defender.luck_tokens > 0 && should_use_luck_token(dodge_net, critical, rng) {
            let luck = use_luck_token(defender, &roll, dice, rng);
            if let Some(reroll) = luck.reroll {
                outcome.rolls.push(RecordedRoll {
                    kind: RollKind::DodgeReroll,
                    roll: reroll,
                });
            }
            dodge_net = luck.roll.net_successes;
            message = Some(format!("{} used a luck token!", defender.species));
        }
        dodge_net
    };
    session.clear_flags(request.target, TurnFlags::DODGING);
    if let Some(message) = message {
        outcome.note(session, message);
    }

    if dodge_net >= *net {
        outcome.dodged = true;
        let name = session.combatants[request.target.index()].species.clone();
        outcome.note(session, format!("{name} dodged the attack!"));
        return false;
    }
    if dodge_net < 0 {
        *net += -dodge_net;
        debug!(combatant = %request.target, bonus = -dodge_net, "botched dodge");
    }
    true
}

fn names(session: &BattleSession, a: CombatantId, b: CombatantId) -> (String, String) {
    (
        session.combatants[a.index()].species.clone(),
        session.combatants[b.index()].species.clone(),
    )
}

/// Roll, threshold check and announcement shared by single and multi-hit
/// moves. Returns the net successes, or `None` on a miss.
fn open_attack(
    session: &mut BattleSession,
    request: &AttackRequest,
    attack: &Attack,
    outcome: &mut AttackOutcome,
) -> Option<i32> {
    let net = roll_accuracy(session, request, attack, outcome);
    outcome.net_successes = net;
    let (attacker, _) = names(session, request.attacker, request.target);
    outcome.effects.push(Effect::AttackStart {
        attacker: request.attacker,
        target: request.target,
        attack: attack.name.clone(),
    });
    outcome.note(session, format!("{attacker} used {}!", attack.name));

    let threshold = session.config.hit_threshold(session.weather);
    if net < threshold {
        outcome.missed = true;
        outcome.effects.push(Effect::Miss {
            attacker: request.attacker,
            target: request.target,
        });
        outcome.note(session, format!("{attacker}'s attack missed!"));
        return None;
    }
    Some(net)
}

async fn resolve_single(
    session: &mut BattleSession,
    request: &AttackRequest,
    attack: &Attack,
    outcome: &mut AttackOutcome,
) {
    let Some(mut net) = open_attack(session, request, attack, outcome) else {
        return;
    };
    if !defend(session, request, attack, &mut net, outcome).await {
        let pos = session.combatants[request.target.index()].pos();
        outcome.effects.push(Effect::Dodge {
            combatant: request.target,
            from: pos,
            to: pos,
        });
        return;
    }
    outcome.net_successes = net;
    outcome.success = true;
    land_hit(session, request.attacker, request.target, attack, true, 0, outcome);
}

/// Buff or curl used as a turn action
fn resolve_self_move(session: &mut BattleSession, request: &AttackRequest, attack: &Attack, outcome: &mut AttackOutcome) {
    outcome.target = request.attacker;
    outcome.effects.push(Effect::AttackStart {
        attacker: request.attacker,
        target: request.attacker,
        attack: attack.name.clone(),
    });
    let user = &mut session.combatants[request.attacker.index()];
    let name = user.species.clone();
    let message = match attack.behavior {
        MoveBehavior::Buff { stat, stages } => match user.stages.apply(stat, stages) {
            0 => format!("{name}'s {stat} won't go any further!"),
            change if change > 0 => format!("{name}'s {stat} rose!"),
            _ => format!("{name}'s {stat} fell!"),
        },
        MoveBehavior::SelfCurl => {
            user.flags.insert(TurnFlags::CURLED);
            format!("{name} curled up!")
        }
        _ => return,
    };
    outcome.success = true;
    outcome.note(session, format!("{name} used {}!", attack.name));
    outcome.note(session, message);
}

/// Damage, defeat and status for one landed hit
fn land_hit(
    session: &mut BattleSession,
    attacker: CombatantId,
    victim: CombatantId,
    attack: &Attack,
    allow_status: bool,
    projectile: u8,
    outcome: &mut AttackOutcome,
) {
    let damage = compute_damage(
        &session.combatants[attacker.index()],
        &session.combatants[victim.index()],
        attack,
    );
    let target = &mut session.combatants[victim.index()];
    let name = target.species.clone();
    let applied = target.take_damage(damage);
    if damage > 0 {
        target.flags.remove(TurnFlags::CURLED);
    }
    outcome.damage += applied.dealt;
    outcome.hits.push(HitRecord {
        target: victim,
        projectile,
        damage: applied.dealt,
        defeated: applied.defeated_now,
    });

    if attack.is_offensive() {
        if damage == 0 {
            outcome.note(session, format!("It doesn't affect {name}..."));
        } else {
            outcome.effects.push(Effect::Hit {
                target: victim,
                damage: applied.dealt,
            });
            outcome.note(session, format!("{name} took {} damage!", applied.dealt));
        }
    }

    if applied.defeated_now {
        on_defeat(session, attacker, victim, outcome);
        return;
    }
    if !allow_status {
        return;
    }
    let Some(status) = attack.status else {
        return;
    };
    let Ok((target, rng)) = session.combatant_and_rng(victim) else {
        return;
    };
    let inflicted = try_inflict(
        &mut target.statuses,
        status.kind,
        status.chance,
        Some(attacker),
        target.types,
        &target.ability,
        rng,
    );
    match inflicted {
        Ok(()) => {
            outcome.status_applied = Some(status.kind);
            outcome.effects.push(Effect::Status {
                target: victim,
                status: status.kind,
            });
            outcome.note(session, format!("{name} is now {}!", status.kind));
        }
        Err(block) => debug!(target = %victim, status = %status.kind, %block, "status not applied"),
    }
}

/// Log the faint and reward the attacker with luck tokens
fn on_defeat(session: &mut BattleSession, attacker: CombatantId, victim: CombatantId, outcome: &mut AttackOutcome) {
    let (name, bst) = {
        let v = &session.combatants[victim.index()];
        (v.species.clone(), v.base_stat_total())
    };
    if victim == outcome.target {
        outcome.target_defeated = true;
    }
    outcome.effects.push(Effect::Defeat { combatant: victim });
    outcome.note(session, format!("{name} fainted!"));

    let cap = session.config.max_luck_tokens;
    let winner = &mut session.combatants[attacker.index()];
    if attacker == victim || winner.is_defeated() {
        return;
    }
    let gained = award_tokens(winner, defeat_reward(bst), cap);
    if gained > 0 {
        let winner = winner.species.clone();
        outcome.note(session, format!("{winner} gained {gained} luck token(s)!"));
    }
}

/// End tile of projectile `index` of `count`, spread evenly across the cone
fn spread_endpoint(origin: (i32, i32), aim: (i32, i32), attack: &Attack, index: u8, count: u8) -> (i32, i32) {
    let base = ((aim.1 - origin.1) as f32).atan2((aim.0 - origin.0) as f32);
    let spread = match attack.area {
        AreaShape::Cone { angle } => angle.to_radians(),
        _ => 0.0,
    };
    let offset = if count > 1 {
        index as f32 / (count - 1) as f32 - 0.5
    } else {
        0.0
    };
    let theta = base + spread * offset;
    let reach = attack.range.max(1) as f32;
    (
        origin.0 + (theta.cos() * reach).round() as i32,
        origin.1 + (theta.sin() * reach).round() as i32,
    )
}

/// Move a combatant that dodged a projectile onto a free neighbouring tile
fn sidestep(session: &mut BattleSession, id: CombatantId, outcome: &mut AttackOutcome) {
    let (from, tile) = {
        let c = &session.combatants[id.index()];
        (c.pos(), adjacent_free_tile(&session.grid, &session.combatants, c))
    };
    let to = tile.unwrap_or(from);
    let c = &mut session.combatants[id.index()];
    c.x = to.0;
    c.y = to.1;
    outcome.effects.push(Effect::Dodge { combatant: id, from, to });
}

async fn resolve_multi_hit(
    session: &mut BattleSession,
    request: &AttackRequest,
    attack: &Attack,
    projectiles: u8,
    outcome: &mut AttackOutcome,
) {
    let Some(trigger) = open_attack(session, request, attack, outcome) else {
        return;
    };
    let origin = session.combatants[request.attacker.index()].pos();
    let aim = session.combatants[request.target.index()].pos();
    let status_allowed = trigger >= session.config.multi_hit_status_threshold;
    let mut struck: HashSet<CombatantId> = HashSet::new();

    outcome.effects.push(Effect::Projectile {
        attacker: request.attacker,
        index: 0,
        from: origin,
        to: aim,
    });
    let mut net = trigger;
    if defend(session, request, attack, &mut net, outcome).await {
        struck.insert(request.target);
        land_hit(
            session,
            request.attacker,
            request.target,
            attack,
            status_allowed,
            0,
            outcome,
        );
    } else {
        sidestep(session, request.target, outcome);
    }

    for index in 1..projectiles.max(1) {
        let end = spread_endpoint(origin, aim, attack, index, projectiles);
        let victim = bresenham(origin, end).into_iter().find_map(|(x, y)| {
            combatant_at(&session.combatants, x, y)
                .filter(|c| c.id != request.attacker)
                .map(|c| (c.id, (x, y)))
        });
        outcome.effects.push(Effect::Projectile {
            attacker: request.attacker,
            index,
            from: origin,
            to: victim.map_or(end, |(_, tile)| tile),
        });
        let Some((victim, _)) = victim else {
            continue;
        };
        if !struck.insert(victim) {
            debug!(target = %victim, index, "projectile hit an already damaged target");
            continue;
        }
        land_hit(
            session,
            request.attacker,
            victim,
            attack,
            status_allowed,
            index,
            outcome,
        );
    }
    outcome.success = !struck.is_empty();
}
