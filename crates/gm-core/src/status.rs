//! Status conditions
//!
//! A combatant carries an ordered set of status instances. Each kind appears
//! at most once; applying a kind that is already present is a no-op.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::combatant::CombatantId;
use crate::rng::RandomSource;
use crate::types::{Ability, ElementType, TypeSet};

/// Kind of status condition
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatusKind {
    Poisoned,
    BadlyPoisoned,
    Burned,
    Asleep,
    Paralyzed,
    Frozen,
    Confused,
    Cursed,
    Infatuated,
    Held,
    Seeded,
    Snared,
}

impl StatusKind {
    /// Types that can never carry this status
    pub fn immune_types(&self) -> TypeSet {
        match self {
            StatusKind::Burned => ElementType::Fire.bit(),
            StatusKind::Poisoned | StatusKind::BadlyPoisoned => {
                ElementType::Poison.bit() | ElementType::Steel.bit()
            }
            StatusKind::Paralyzed => ElementType::Electric.bit(),
            StatusKind::Frozen => ElementType::Ice.bit(),
            StatusKind::Seeded => ElementType::Grass.bit(),
            _ => TypeSet::empty(),
        }
    }

    /// Default duration in turns (`None` = until cured or battle end)
    pub fn default_duration(&self) -> Option<u32> {
        match self {
            StatusKind::Confused => Some(3),
            StatusKind::Held | StatusKind::Snared => Some(2),
            StatusKind::Infatuated => Some(4),
            _ => None,
        }
    }

    /// The poison family shares immunity and blocks each other
    pub fn is_poison(&self) -> bool {
        matches!(self, StatusKind::Poisoned | StatusKind::BadlyPoisoned)
    }

    /// Prevents the combatant from moving
    pub fn prevents_movement(&self) -> bool {
        matches!(
            self,
            StatusKind::Asleep | StatusKind::Frozen | StatusKind::Held | StatusKind::Snared
        )
    }
}

/// An active status on a combatant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInstance {
    pub kind: StatusKind,
    /// Who inflicted it, if anyone
    pub source: Option<CombatantId>,
    /// Remaining turns (`None` = no timer)
    pub turns_left: Option<u32>,
    /// Turns this status has been active; drives escalating poison
    pub counter: u32,
}

impl StatusInstance {
    pub fn new(kind: StatusKind, source: Option<CombatantId>) -> Self {
        Self {
            kind,
            source,
            turns_left: kind.default_duration(),
            counter: 0,
        }
    }

    /// Set a custom duration
    pub fn with_duration(mut self, turns: u32) -> Self {
        self.turns_left = Some(turns);
        self
    }
}

/// Ordered, idempotent-by-kind set of statuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSet {
    effects: Vec<StatusInstance>,
}

impl StatusSet {
    pub const fn new() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    /// Insert a status. Returns false if that kind is already active.
    pub fn insert(&mut self, instance: StatusInstance) -> bool {
        if self.has(instance.kind) {
            return false;
        }
        self.effects.push(instance);
        true
    }

    pub fn remove(&mut self, kind: StatusKind) -> Option<StatusInstance> {
        let idx = self.effects.iter().position(|e| e.kind == kind)?;
        Some(self.effects.remove(idx))
    }

    pub fn has(&self, kind: StatusKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    /// Poisoned or badly poisoned
    pub fn is_poisoned(&self) -> bool {
        self.effects.iter().any(|e| e.kind.is_poison())
    }

    pub fn get(&self, kind: StatusKind) -> Option<&StatusInstance> {
        self.effects.iter().find(|e| e.kind == kind)
    }

    pub fn get_mut(&mut self, kind: StatusKind) -> Option<&mut StatusInstance> {
        self.effects.iter_mut().find(|e| e.kind == kind)
    }

    /// Active statuses in the order they were applied
    pub fn iter(&self) -> impl Iterator<Item = &StatusInstance> {
        self.effects.iter()
    }

    pub fn kinds(&self) -> impl Iterator<Item = StatusKind> + '_ {
        self.effects.iter().map(|e| e.kind)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    /// Whether any active status stops movement this turn
    pub fn prevents_movement(&self) -> bool {
        self.effects.iter().any(|e| e.kind.prevents_movement())
    }

    /// Count down timed statuses and drop the expired ones.
    ///
    /// Returns the kinds that expired.
    pub fn tick(&mut self) -> Vec<StatusKind> {
        let mut expired = Vec::new();
        for effect in &mut self.effects {
            effect.counter += 1;
            if let Some(turns) = effect.turns_left.as_mut() {
                *turns = turns.saturating_sub(1);
                if *turns == 0 {
                    expired.push(effect.kind);
                }
            }
        }
        self.effects.retain(|e| e.turns_left != Some(0));
        expired
    }

    /// Dice removed from accuracy pools by active statuses
    pub fn accuracy_penalty(&self) -> i32 {
        self.kinds()
            .map(|k| match k {
                StatusKind::Paralyzed | StatusKind::Confused | StatusKind::Infatuated => 1,
                StatusKind::Cursed => 1,
                _ => 0,
            })
            .sum()
    }

    /// Dice removed from dodge pools by active statuses
    pub fn dodge_penalty(&self) -> i32 {
        self.kinds()
            .map(|k| match k {
                StatusKind::Paralyzed => 2,
                StatusKind::Held | StatusKind::Snared => 1,
                _ => 0,
            })
            .sum()
    }

    /// Asleep or frozen combatants cannot dodge at all
    pub fn cannot_dodge(&self) -> bool {
        self.has(StatusKind::Asleep) || self.has(StatusKind::Frozen)
    }
}

/// Why a status application did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StatusBlock {
    AlreadyActive,
    TypeImmune,
    AbilityImmune,
    ChanceFailed,
}

/// Check whether `kind` can be applied to a holder with these types/ability
pub fn can_apply(
    kind: StatusKind,
    types: TypeSet,
    ability: &Ability,
    current: &StatusSet,
) -> Result<(), StatusBlock> {
    if current.has(kind) || (kind.is_poison() && current.is_poisoned()) {
        return Err(StatusBlock::AlreadyActive);
    }
    if types.any_of(kind.immune_types()) {
        return Err(StatusBlock::TypeImmune);
    }
    if ability.blocks_status(kind) {
        return Err(StatusBlock::AbilityImmune);
    }
    Ok(())
}

/// Roll `chance` percent and apply the status if allowed.
///
/// Immunity is checked before the roll so an immune target never consumes a draw.
pub fn try_inflict(
    set: &mut StatusSet,
    kind: StatusKind,
    chance: u32,
    source: Option<CombatantId>,
    types: TypeSet,
    ability: &Ability,
    rng: &mut dyn RandomSource,
) -> Result<(), StatusBlock> {
    can_apply(kind, types, ability, set)?;
    if chance < 100 && !rng.percent(chance) {
        return Err(StatusBlock::ChanceFailed);
    }
    let mut instance = StatusInstance::new(kind, source);
    if kind == StatusKind::Asleep {
        instance = instance.with_duration(2 + rng.rn2(3));
    }
    set.insert(instance);
    Ok(())
}

// ============================================================================
// Turn consequences
// ============================================================================

/// Chance a frozen combatant thaws at the start of its turn
pub const THAW_CHANCE: u32 = 20;
/// Chance paralysis stops a turn
pub const FULL_PARALYSIS_CHANCE: u32 = 25;
/// Chance infatuation stops a turn
pub const INFATUATION_CHANCE: u32 = 50;

/// What the start-of-turn status check decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnGate {
    /// Status that makes the combatant lose this turn
    pub skip: Option<StatusKind>,
    /// Frozen status melted this turn
    pub thawed: bool,
}

/// Roll start-of-turn statuses in application order.
///
/// Sleep is counted down by [`StatusSet::tick`] at end of turn, so a sleeper
/// simply loses the turn here.
pub fn start_of_turn(set: &mut StatusSet, rng: &mut dyn RandomSource) -> TurnGate {
    let mut gate = TurnGate::default();
    if set.has(StatusKind::Asleep) {
        gate.skip = Some(StatusKind::Asleep);
        return gate;
    }
    if set.has(StatusKind::Frozen) {
        if rng.percent(THAW_CHANCE) {
            set.remove(StatusKind::Frozen);
            gate.thawed = true;
        } else {
            gate.skip = Some(StatusKind::Frozen);
            return gate;
        }
    }
    if set.has(StatusKind::Paralyzed) && rng.percent(FULL_PARALYSIS_CHANCE) {
        gate.skip = Some(StatusKind::Paralyzed);
        return gate;
    }
    if set.has(StatusKind::Infatuated) && rng.percent(INFATUATION_CHANCE) {
        gate.skip = Some(StatusKind::Infatuated);
    }
    gate
}

/// HP change a status causes at end of turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Residual {
    pub kind: StatusKind,
    pub amount: u32,
    /// Heals the holder instead of hurting it
    pub heals: bool,
    /// Drained HP goes to this combatant
    pub drain_to: Option<CombatantId>,
}

fn fraction(max_hp: u32, numerator: u32, denominator: u32) -> u32 {
    (max_hp * numerator / denominator).max(1)
}

/// End-of-turn HP changes, in application order
pub fn residual_effects(set: &StatusSet, max_hp: u32, ability: &Ability) -> Vec<Residual> {
    set.iter()
        .filter_map(|effect| {
            let (amount, drain_to) = match effect.kind {
                StatusKind::Poisoned => (fraction(max_hp, 1, 8), None),
                StatusKind::BadlyPoisoned => {
                    (fraction(max_hp, (effect.counter + 1).min(15), 16), None)
                }
                StatusKind::Burned => (fraction(max_hp, 1, 16), None),
                StatusKind::Cursed => (fraction(max_hp, 1, 4), None),
                StatusKind::Seeded => (fraction(max_hp, 1, 8), effect.source),
                _ => return None,
            };
            let heals = effect.kind.is_poison() && ability.thrives_in_swamp();
            Some(Residual {
                kind: effect.kind,
                amount: if heals { fraction(max_hp, 1, 8) } else { amount },
                heals,
                drain_to: if heals { None } else { drain_to },
            })
        })
        .collect()
}
