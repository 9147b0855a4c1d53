//! Combatant runtime state
//!
//! Combatants are normalized once from roster templates at battle start and
//! then mutated in place for the rest of the battle. They are never removed,
//! only marked defeated.

use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::warn;

use crate::moves::{Attack, BuffStat, MoveTemplate};
use crate::status::{StatusKind, StatusSet};
use crate::types::{Ability, ElementType, TypeSet};

/// Stable identifier of a combatant (its index in the session)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

impl CombatantId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for CombatantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Heuristic label driving automated target and move selection
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Strategy {
    #[default]
    Aggressive,
    Opportunistic,
    Aiming,
    Fleeing,
    /// Prefers status moves
    Sneaky,
    Tricky,
    /// Reacts more often
    Reinforcing,
}

impl Strategy {
    /// Modifier added to the 1-100 status-preference roll
    pub const fn status_roll_modifier(&self) -> i32 {
        match self {
            Strategy::Aggressive | Strategy::Aiming | Strategy::Opportunistic => 20,
            Strategy::Sneaky | Strategy::Tricky => -30,
            _ => 0,
        }
    }

    /// Parse a roster label; unknown labels fall back to aggressive
    pub fn from_label(label: &str) -> Self {
        match Strategy::from_str(label.trim()) {
            Ok(strategy) => strategy,
            Err(_) => {
                warn!(label, "unknown strategy label, using aggressive");
                Strategy::Aggressive
            }
        }
    }
}

/// Base stats supplied by the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaseStats {
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub special_attack: u32,
    pub special_defense: u32,
    pub speed: u32,
}

impl BaseStats {
    pub const fn uniform(value: u32) -> Self {
        Self {
            hp: value,
            attack: value,
            defense: value,
            special_attack: value,
            special_defense: value,
            speed: value,
        }
    }

    /// Sum of all six stats
    pub const fn total(&self) -> u32 {
        self.hp + self.attack + self.defense + self.special_attack + self.special_defense + self.speed
    }
}

/// Stage changes from buffs, each in `[-6, 6]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatStages {
    pub attack: i8,
    pub defense: i8,
    pub special_attack: i8,
    pub special_defense: i8,
    pub speed: i8,
    pub accuracy: i8,
    pub dodge: i8,
}

impl StatStages {
    pub const MAX: i8 = 6;

    pub fn get(&self, stat: BuffStat) -> i8 {
        match stat {
            BuffStat::Attack => self.attack,
            BuffStat::Defense => self.defense,
            BuffStat::SpecialAttack => self.special_attack,
            BuffStat::SpecialDefense => self.special_defense,
            BuffStat::Speed => self.speed,
            BuffStat::Accuracy => self.accuracy,
            BuffStat::Dodge => self.dodge,
        }
    }

    fn slot(&mut self, stat: BuffStat) -> &mut i8 {
        match stat {
            BuffStat::Attack => &mut self.attack,
            BuffStat::Defense => &mut self.defense,
            BuffStat::SpecialAttack => &mut self.special_attack,
            BuffStat::SpecialDefense => &mut self.special_defense,
            BuffStat::Speed => &mut self.speed,
            BuffStat::Accuracy => &mut self.accuracy,
            BuffStat::Dodge => &mut self.dodge,
        }
    }

    /// Apply a delta, clamped. Returns the change actually applied.
    pub fn apply(&mut self, stat: BuffStat, delta: i8) -> i8 {
        let slot = self.slot(stat);
        let before = *slot;
        *slot = (before as i16 + delta as i16).clamp(-(Self::MAX as i16), Self::MAX as i16) as i8;
        *slot - before
    }

    /// Multiplier for a stage: (2+s)/2 when raised, 2/(2-s) when lowered
    pub fn multiplier(stage: i8) -> f32 {
        if stage >= 0 {
            (2.0 + stage as f32) / 2.0
        } else {
            2.0 / (2.0 - stage as f32)
        }
    }
}

bitflags! {
    /// Transient per-turn flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TurnFlags: u8 {
        /// An animated or multi-hit attack is in flight; movement is refused
        const MOVEMENT_LOCKED = 1 << 0;
        /// Defender is mid-dodge
        const DODGING = 1 << 1;
        /// A reaction by this combatant is running
        const REACTION_ACTIVE = 1 << 2;
        /// Next incoming hit is halved
        const CURLED = 1 << 3;
    }
}

bitflags! {
    /// Movement capabilities independent of type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Mobility: u8 {
        const FLYING = 1 << 0;
        const SWIMMING = 1 << 1;
    }
}

/// Result of applying damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageApplied {
    /// HP actually removed
    pub dealt: u32,
    /// This call moved the combatant to defeated
    pub defeated_now: bool,
}

/// Combatant definition as supplied by the roster loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantTemplate {
    pub species: String,
    pub types: Vec<ElementType>,
    #[serde(default)]
    pub ability: Option<String>,
    pub stats: BaseStats,
    #[serde(default)]
    pub accuracy: Option<i32>,
    #[serde(default)]
    pub dodge: Option<i32>,
    #[serde(default)]
    pub size: Option<u8>,
    #[serde(default)]
    pub movement: Option<u32>,
    #[serde(default)]
    pub luck_tokens: Option<u32>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub can_fly: bool,
    #[serde(default)]
    pub can_swim: bool,
    pub moves: Vec<MoveTemplate>,
}

/// Default dice in an accuracy pool
pub const DEFAULT_ACCURACY: i32 = 4;
/// Default luck tokens at battle start
pub const DEFAULT_LUCK_TOKENS: u32 = 1;

/// A participant's battle-runtime state
#[derive(Debug, Clone)]
pub struct Combatant {
    pub id: CombatantId,
    pub team: u8,
    pub species: String,
    pub types: TypeSet,
    pub ability: Ability,
    pub stats: BaseStats,
    pub stages: StatStages,
    /// Accuracy skill (dice before modifiers)
    pub accuracy: i32,
    /// Dodge skill (dice before modifiers)
    pub dodge: i32,
    pub hp: u32,
    pub max_hp: u32,
    defeated: bool,
    /// Footprint centre
    pub x: i32,
    pub y: i32,
    /// Size category, at least 1
    pub size: u8,
    /// Movement points per turn before status modifiers
    pub movement: u32,
    pub attacks: Vec<Attack>,
    pub luck_tokens: u32,
    pub statuses: StatusSet,
    pub strategy: Strategy,
    pub flags: TurnFlags,
    pub mobility: Mobility,
}

impl Combatant {
    /// Minimal combatant; use the builder methods to fill it in
    pub fn new(id: CombatantId, team: u8, species: &str, types: &[ElementType]) -> Self {
        let stats = BaseStats::uniform(50);
        Self {
            id,
            team,
            species: species.to_string(),
            types: TypeSet::of(types),
            ability: Ability::None,
            stats,
            stages: StatStages::default(),
            accuracy: DEFAULT_ACCURACY,
            dodge: default_dodge(&stats),
            hp: stats.hp,
            max_hp: stats.hp,
            defeated: false,
            x: 0,
            y: 0,
            size: 1,
            movement: default_movement(&stats),
            attacks: Vec::new(),
            luck_tokens: 0,
            statuses: StatusSet::new(),
            strategy: Strategy::Aggressive,
            flags: TurnFlags::empty(),
            mobility: Mobility::empty(),
        }
    }

    /// Normalize a roster template: full HP/PP, no statuses, defaults resolved
    pub fn from_template(id: CombatantId, team: u8, template: &CombatantTemplate, pos: (i32, i32)) -> Self {
        let stats = template.stats;
        let mut mobility = Mobility::empty();
        if template.can_fly {
            mobility |= Mobility::FLYING;
        }
        if template.can_swim {
            mobility |= Mobility::SWIMMING;
        }
        let max_hp = stats.hp.max(1);
        Self {
            id,
            team,
            species: template.species.clone(),
            types: TypeSet::of(&template.types),
            ability: template.ability.as_deref().map(Ability::parse).unwrap_or_default(),
            stats,
            stages: StatStages::default(),
            accuracy: template.accuracy.unwrap_or(DEFAULT_ACCURACY),
            dodge: template.dodge.unwrap_or_else(|| default_dodge(&stats)),
            hp: max_hp,
            max_hp,
            defeated: false,
            x: pos.0,
            y: pos.1,
            size: template.size.unwrap_or(1).max(1),
            movement: template.movement.unwrap_or_else(|| default_movement(&stats)),
            attacks: template.moves.iter().map(Attack::from_template).collect(),
            luck_tokens: template.luck_tokens.unwrap_or(DEFAULT_LUCK_TOKENS),
            statuses: StatusSet::new(),
            strategy: template
                .strategy
                .as_deref()
                .map(Strategy::from_label)
                .unwrap_or_default(),
            flags: TurnFlags::empty(),
            mobility,
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_stats(mut self, stats: BaseStats) -> Self {
        self.stats = stats;
        self.max_hp = stats.hp.max(1);
        self.hp = self.max_hp;
        self.movement = default_movement(&stats);
        self
    }

    pub fn with_hp(mut self, hp: u32, max_hp: u32) -> Self {
        self.max_hp = max_hp.max(1);
        self.hp = hp.min(self.max_hp);
        self
    }

    pub fn with_skills(mut self, accuracy: i32, dodge: i32) -> Self {
        self.accuracy = accuracy;
        self.dodge = dodge;
        self
    }

    pub fn with_attack(mut self, attack: Attack) -> Self {
        self.attacks.push(attack);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_luck(mut self, tokens: u32) -> Self {
        self.luck_tokens = tokens;
        self
    }

    pub fn with_size(mut self, size: u8) -> Self {
        self.size = size.max(1);
        self
    }

    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.ability = ability;
        self
    }

    pub fn with_movement(mut self, points: u32) -> Self {
        self.movement = points;
        self
    }

    pub fn with_mobility(mut self, mobility: Mobility) -> Self {
        self.mobility = mobility;
        self
    }

    // ------------------------------------------------------------------
    // Vitals
    // ------------------------------------------------------------------

    pub fn is_defeated(&self) -> bool {
        self.defeated
    }

    pub fn is_alive(&self) -> bool {
        !self.defeated
    }

    /// Remove HP, clamped at zero. Defeated combatants are untouched.
    pub fn take_damage(&mut self, amount: u32) -> DamageApplied {
        if self.defeated {
            return DamageApplied::default();
        }
        let dealt = amount.min(self.hp);
        self.hp -= dealt;
        let defeated_now = self.hp == 0 && self.mark_defeated();
        DamageApplied { dealt, defeated_now }
    }

    /// Restore HP, clamped at max. Returns HP gained.
    pub fn heal(&mut self, amount: u32) -> u32 {
        if self.defeated {
            return 0;
        }
        let before = self.hp;
        self.hp = self.hp.saturating_add(amount).min(self.max_hp);
        self.hp - before
    }

    /// Transition to defeated. Returns true only on the first call.
    pub fn mark_defeated(&mut self) -> bool {
        if self.defeated {
            return false;
        }
        debug_assert!(self.hp == 0, "defeating a combatant with HP left");
        self.hp = 0;
        self.defeated = true;
        self.flags = TurnFlags::empty();
        true
    }

    /// Fraction of HP left, 0.0..=1.0
    pub fn hp_fraction(&self) -> f32 {
        self.hp as f32 / self.max_hp.max(1) as f32
    }

    /// Reset to battle-start state
    pub fn reset(&mut self) {
        self.hp = self.max_hp;
        self.defeated = false;
        self.statuses.clear();
        self.stages = StatStages::default();
        self.flags = TurnFlags::empty();
        for attack in &mut self.attacks {
            attack.restore();
        }
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Tiles the footprint extends from the centre in each direction
    pub fn footprint_radius(&self) -> i32 {
        footprint_radius(self.size)
    }

    pub fn pos(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Whether the footprint covers the tile
    pub fn covers(&self, x: i32, y: i32) -> bool {
        let r = self.footprint_radius();
        (x - self.x).abs() <= r && (y - self.y).abs() <= r
    }

    /// Manhattan distance between footprint edges
    pub fn edge_distance(&self, other: &Combatant) -> u32 {
        let centre = (self.x - other.x).abs() + (self.y - other.y).abs();
        (centre - self.footprint_radius() - other.footprint_radius()).max(0) as u32
    }

    /// Manhattan distance between centres
    pub fn manhattan_to(&self, x: i32, y: i32) -> u32 {
        ((self.x - x).abs() + (self.y - y).abs()) as u32
    }

    // ------------------------------------------------------------------
    // Capabilities and derived values
    // ------------------------------------------------------------------

    pub fn has_type(&self, element: ElementType) -> bool {
        self.types.has(element)
    }

    pub fn can_fly(&self) -> bool {
        self.mobility.contains(Mobility::FLYING)
            || self.types.has(ElementType::Flying)
            || self.ability.levitates()
    }

    pub fn can_swim(&self) -> bool {
        self.mobility.contains(Mobility::SWIMMING) || self.types.has(ElementType::Water)
    }

    pub fn is_locked(&self) -> bool {
        self.flags.contains(TurnFlags::MOVEMENT_LOCKED)
    }

    /// Stat after stage multipliers
    pub fn effective_stat(&self, stat: BuffStat) -> f32 {
        let base = match stat {
            BuffStat::Attack => self.stats.attack,
            BuffStat::Defense => self.stats.defense,
            BuffStat::SpecialAttack => self.stats.special_attack,
            BuffStat::SpecialDefense => self.stats.special_defense,
            BuffStat::Speed => self.stats.speed,
            BuffStat::Accuracy => return (self.accuracy + self.stages.accuracy as i32) as f32,
            BuffStat::Dodge => return (self.dodge + self.stages.dodge as i32) as f32,
        };
        base.max(1) as f32 * StatStages::multiplier(self.stages.get(stat))
    }

    /// Accuracy skill after stages and status penalties
    pub fn accuracy_skill(&self) -> i32 {
        self.accuracy + self.stages.accuracy as i32 - self.statuses.accuracy_penalty()
    }

    /// Dodge skill after stages and status penalties
    pub fn dodge_skill(&self) -> i32 {
        if self.statuses.cannot_dodge() {
            return 0;
        }
        self.dodge + self.stages.dodge as i32 - self.statuses.dodge_penalty()
    }

    /// Movement points available this turn
    pub fn movement_points(&self) -> u32 {
        if self.statuses.prevents_movement() {
            return 0;
        }
        let mut points = self.movement;
        if self.statuses.has(StatusKind::Paralyzed) {
            points /= 2;
        }
        points
    }

    pub fn base_stat_total(&self) -> u32 {
        self.stats.total()
    }

    /// Moves with PP and ammo left
    pub fn usable_attacks(&self) -> impl Iterator<Item = (usize, &Attack)> {
        self.attacks.iter().enumerate().filter(|(_, a)| a.is_usable())
    }

    /// Usable reaction-flagged moves
    pub fn reaction_moves(&self) -> impl Iterator<Item = (usize, &Attack)> {
        self.usable_attacks().filter(|(_, a)| a.reaction)
    }

    pub fn is_enemy_of(&self, other: &Combatant) -> bool {
        self.team != other.team
    }
}

/// Footprint radius for a size category
pub const fn footprint_radius(size: u8) -> i32 {
    (size / 2) as i32
}

fn default_dodge(stats: &BaseStats) -> i32 {
    1 + (stats.speed / 40) as i32
}

fn default_movement(stats: &BaseStats) -> u32 {
    2 + stats.speed / 40
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusInstance;

    fn mon() -> Combatant {
        Combatant::new(CombatantId(0), 0, "Testmon", &[ElementType::Normal]).with_hp(10, 10)
    }

    #[test]
    fn test_damage_clamps_and_defeats_once() {
        let mut c = mon();
        let first = c.take_damage(25);
        assert_eq!(first.dealt, 10);
        assert!(first.defeated_now);
        assert_eq!(c.hp, 0);
        assert!(c.is_defeated());

        let second = c.take_damage(5);
        assert_eq!(second, DamageApplied::default());
        assert!(!c.mark_defeated());
    }

    #[test]
    fn test_heal_clamps_to_max() {
        let mut c = mon().with_hp(4, 10);
        assert_eq!(c.heal(100), 6);
        assert_eq!(c.hp, 10);
    }

    #[test]
    fn test_defeated_cannot_heal() {
        let mut c = mon();
        c.take_damage(10);
        assert_eq!(c.heal(5), 0);
        assert_eq!(c.hp, 0);
    }

    #[test]
    fn test_footprint() {
        let small = mon().at(5, 5);
        assert!(small.covers(5, 5));
        assert!(!small.covers(6, 5));

        let large = mon().at(5, 5).with_size(3);
        assert_eq!(large.footprint_radius(), 1);
        assert!(large.covers(6, 6));
        assert!(!large.covers(7, 5));
    }

    #[test]
    fn test_edge_distance_accounts_for_size() {
        let a = mon().at(0, 0);
        let b = mon().at(4, 0).with_size(2);
        assert_eq!(a.edge_distance(&b), 3);
        let c = mon().at(1, 0);
        assert_eq!(a.edge_distance(&c), 1);
    }

    #[test]
    fn test_stage_clamp_and_multiplier() {
        let mut stages = StatStages::default();
        assert_eq!(stages.apply(BuffStat::Attack, 4), 4);
        assert_eq!(stages.apply(BuffStat::Attack, 4), 2);
        assert_eq!(stages.attack, 6);
        assert_eq!(StatStages::multiplier(2), 2.0);
        assert_eq!(StatStages::multiplier(-2), 0.5);
    }

    #[test]
    fn test_status_affects_pools_and_movement() {
        let mut c = mon().with_skills(5, 3).with_movement(4);
        c.statuses.insert(StatusInstance::new(StatusKind::Paralyzed, None));
        assert_eq!(c.accuracy_skill(), 4);
        assert_eq!(c.dodge_skill(), 1);
        assert_eq!(c.movement_points(), 2);

        c.statuses.insert(StatusInstance::new(StatusKind::Frozen, None));
        assert_eq!(c.dodge_skill(), 0);
        assert_eq!(c.movement_points(), 0);
    }

    #[test]
    fn test_capabilities() {
        let bird = Combatant::new(CombatantId(1), 0, "Bird", &[ElementType::Flying]);
        assert!(bird.can_fly());
        let floaty = mon().with_ability(Ability::Levitate);
        assert!(floaty.can_fly());
        let fish = Combatant::new(CombatantId(2), 0, "Fish", &[ElementType::Water]);
        assert!(fish.can_swim());
        assert!(!mon().can_swim());
    }

    #[test]
    fn test_strategy_labels() {
        assert_eq!(Strategy::from_label("Opportunistic"), Strategy::Opportunistic);
        assert_eq!(Strategy::from_label(" sneaky "), Strategy::Sneaky);
        assert_eq!(Strategy::from_label("berserk"), Strategy::Aggressive);
        assert_eq!(Strategy::Sneaky.status_roll_modifier(), -30);
        assert_eq!(Strategy::Aiming.status_roll_modifier(), 20);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unknown_strategy_label_warns() {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let strategy = tracing::subscriber::with_default(subscriber, || Strategy::from_label("berserk"));

        assert_eq!(strategy, Strategy::Aggressive);
        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("WARN"));
        assert!(text.contains("unknown strategy label"));
    }

    #[test]
    fn test_from_template_normalizes() {
        let json = r#"{
            "species": "Charmander",
            "types": ["fire"],
            "ability": "Blaze",
            "stats": {"hp": 39, "attack": 52, "defense": 43, "special_attack": 60,
                      "special_defense": 50, "speed": 65},
            "strategy": "aiming",
            "moves": [{"name": "Ember", "category": "special", "power": 40, "type": "fire",
                       "range": 3, "pp": 25}]
        }"#;
        let template: CombatantTemplate = serde_json::from_str(json).unwrap();
        let c = Combatant::from_template(CombatantId(4), 1, &template, (2, 3));
        assert_eq!(c.hp, 39);
        assert_eq!(c.max_hp, 39);
        assert_eq!(c.size, 1);
        assert_eq!(c.luck_tokens, DEFAULT_LUCK_TOKENS);
        assert_eq!(c.strategy, Strategy::Aiming);
        assert_eq!(c.pos(), (2, 3));
        assert_eq!(c.attacks[0].current_pp, Some(25));
        assert_eq!(c.base_stat_total(), 309);
        assert!(matches!(c.ability, Ability::Other(_)));
    }
}
