//! Moves (attacks) carried by combatants
//!
//! A move is static template data plus per-combatant PP/ammo counters.
//! Special handling is selected by [`MoveBehavior`], never by the move's name.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::status::StatusKind;
use crate::types::ElementType;

/// Damage category of a move
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MoveCategory {
    #[default]
    Physical,
    Special,
    Status,
}

/// Area a move covers
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum AreaShape {
    #[default]
    Single,
    /// Cone opening `angle` degrees around the aim direction
    Cone { angle: f32 },
    SelfOnly,
}

/// Stat a buff changes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BuffStat {
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
    Accuracy,
    Dodge,
}

/// Behavior tag dispatched by the pipeline and the reaction system
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveBehavior {
    /// Roll, defend, damage, optional on-hit status
    #[default]
    Standard,
    /// Stage change on the user
    Buff { stat: BuffStat, stages: i8 },
    /// Status-only move, no damage
    StatusInflict,
    /// Spread of sub-projectiles, each target damaged at most once
    MultiHit { projectiles: u8 },
    /// Halves the next incoming hit
    SelfCurl,
}

/// Status a move may inflict, with its chance in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChance {
    pub kind: StatusKind,
    pub chance: u32,
}

/// Move definition as supplied by the roster loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveTemplate {
    pub name: String,
    #[serde(default)]
    pub category: MoveCategory,
    #[serde(default)]
    pub power: u32,
    #[serde(default, rename = "type")]
    pub element: ElementType,
    #[serde(default = "default_range")]
    pub range: u32,
    /// Dice added to (or removed from) the user's accuracy pool
    #[serde(default)]
    pub accuracy: i32,
    #[serde(default)]
    pub reaction: bool,
    #[serde(default)]
    pub area: AreaShape,
    #[serde(default)]
    pub behavior: MoveBehavior,
    #[serde(default)]
    pub status: Option<StatusChance>,
    /// `None` = unlimited
    #[serde(default)]
    pub pp: Option<u32>,
    /// `None` = unlimited
    #[serde(default)]
    pub ammo: Option<u32>,
}

fn default_range() -> u32 {
    1
}

/// A move as owned by one combatant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub name: String,
    pub category: MoveCategory,
    pub power: u32,
    pub element: ElementType,
    pub range: u32,
    pub accuracy: i32,
    /// May be fired as a reaction instead of dodging
    pub reaction: bool,
    pub area: AreaShape,
    pub behavior: MoveBehavior,
    pub status: Option<StatusChance>,
    pub max_pp: Option<u32>,
    pub current_pp: Option<u32>,
    pub max_ammo: Option<u32>,
    pub current_ammo: Option<u32>,
}

impl Attack {
    /// Resolve a template into a fresh move with full PP/ammo
    pub fn from_template(template: &MoveTemplate) -> Self {
        let mut behavior = template.behavior;
        if behavior == MoveBehavior::Standard
            && template.category == MoveCategory::Status
            && template.status.is_some()
        {
            behavior = MoveBehavior::StatusInflict;
        }
        let area = match behavior {
            MoveBehavior::Buff { .. } | MoveBehavior::SelfCurl => AreaShape::SelfOnly,
            _ => template.area,
        };
        Self {
            name: template.name.clone(),
            category: template.category,
            power: template.power,
            element: template.element,
            range: template.range.max(1),
            accuracy: template.accuracy,
            reaction: template.reaction,
            area,
            behavior,
            status: template.status,
            max_pp: template.pp,
            current_pp: template.pp,
            max_ammo: template.ammo,
            current_ammo: template.ammo,
        }
    }

    /// Quick constructor for a standard damaging move
    pub fn damaging(name: &str, element: ElementType, category: MoveCategory, power: u32, range: u32) -> Self {
        Self {
            name: name.to_string(),
            category,
            power,
            element,
            range: range.max(1),
            accuracy: 0,
            reaction: false,
            area: AreaShape::Single,
            behavior: MoveBehavior::Standard,
            status: None,
            max_pp: None,
            current_pp: None,
            max_ammo: None,
            current_ammo: None,
        }
    }

    /// Builder: limit PP
    pub fn with_pp(mut self, pp: u32) -> Self {
        self.max_pp = Some(pp);
        self.current_pp = Some(pp);
        self
    }

    /// Builder: limit ammo
    pub fn with_ammo(mut self, ammo: u32) -> Self {
        self.max_ammo = Some(ammo);
        self.current_ammo = Some(ammo);
        self
    }

    /// Builder: set behavior
    pub fn with_behavior(mut self, behavior: MoveBehavior) -> Self {
        if matches!(behavior, MoveBehavior::Buff { .. } | MoveBehavior::SelfCurl) {
            self.area = AreaShape::SelfOnly;
        }
        self.behavior = behavior;
        self
    }

    /// Builder: on-hit status
    pub fn with_status(mut self, kind: StatusKind, chance: u32) -> Self {
        self.status = Some(StatusChance { kind, chance });
        self
    }

    /// Builder: mark as reaction-eligible
    pub fn as_reaction(mut self) -> Self {
        self.reaction = true;
        self
    }

    /// Has PP and ammo left (untracked counters are unlimited)
    pub fn is_usable(&self) -> bool {
        self.current_pp != Some(0) && self.current_ammo != Some(0)
    }

    /// Spend one use. Counters never go below zero.
    pub fn consume(&mut self) {
        if let Some(pp) = self.current_pp.as_mut() {
            *pp = pp.saturating_sub(1);
        }
        if let Some(ammo) = self.current_ammo.as_mut() {
            *ammo = ammo.saturating_sub(1);
        }
    }

    /// Refill PP and ammo (battle start)
    pub fn restore(&mut self) {
        self.current_pp = self.max_pp;
        self.current_ammo = self.max_ammo;
    }

    /// Self/ally buff move
    pub fn is_buff(&self) -> bool {
        matches!(self.behavior, MoveBehavior::Buff { .. })
    }

    /// Deals damage to a target
    pub fn is_offensive(&self) -> bool {
        self.category != MoveCategory::Status
            && self.power > 0
            && !matches!(self.behavior, MoveBehavior::Buff { .. } | MoveBehavior::SelfCurl)
    }

    /// Non-buff status move with something to inflict
    pub fn is_status_move(&self) -> bool {
        self.behavior == MoveBehavior::StatusInflict && self.status.is_some()
    }

    /// Fires past adjacent tiles; subject to line-of-fire checks
    pub fn is_ranged(&self) -> bool {
        self.range > 1
    }

    pub fn is_multi_hit(&self) -> bool {
        matches!(self.behavior, MoveBehavior::MultiHit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tackle() -> Attack {
        Attack::damaging("Tackle", ElementType::Normal, MoveCategory::Physical, 40, 1)
    }

    #[test]
    fn test_unlimited_move_is_always_usable() {
        let mut m = tackle();
        for _ in 0..50 {
            m.consume();
        }
        assert!(m.is_usable());
        assert_eq!(m.current_pp, None);
    }

    #[test]
    fn test_pp_never_underflows() {
        let mut m = tackle().with_pp(2);
        m.consume();
        m.consume();
        assert!(!m.is_usable());
        m.consume();
        assert_eq!(m.current_pp, Some(0));
        m.restore();
        assert_eq!(m.current_pp, Some(2));
    }

    #[test]
    fn test_ammo_gates_usability() {
        let mut m = tackle().with_ammo(1);
        assert!(m.is_usable());
        m.consume();
        assert!(!m.is_usable());
    }

    #[test]
    fn test_classification() {
        let curl = tackle().with_behavior(MoveBehavior::SelfCurl);
        assert!(!curl.is_offensive());
        assert_eq!(curl.area, AreaShape::SelfOnly);

        let growl = Attack::damaging("Growl", ElementType::Normal, MoveCategory::Status, 0, 3)
            .with_behavior(MoveBehavior::StatusInflict)
            .with_status(StatusKind::Confused, 100);
        assert!(growl.is_status_move());
        assert!(!growl.is_offensive());
        assert!(growl.is_ranged());
    }

    #[test]
    fn test_template_deserialize_defaults() {
        let json = r#"{"name":"Ember","category":"special","power":40,"type":"fire","range":3,
            "status":{"kind":"burned","chance":10},"pp":25}"#;
        let template: MoveTemplate = serde_json::from_str(json).unwrap();
        let attack = Attack::from_template(&template);
        assert_eq!(attack.element, ElementType::Fire);
        assert_eq!(attack.current_pp, Some(25));
        assert_eq!(attack.current_ammo, None);
        assert_eq!(attack.behavior, MoveBehavior::Standard);
        assert!(!attack.reaction);
    }

    #[test]
    fn test_status_category_becomes_status_inflict() {
        let json = r#"{"name":"Poison Powder","category":"status","type":"poison",
            "status":{"kind":"poisoned","chance":100}}"#;
        let template: MoveTemplate = serde_json::from_str(json).unwrap();
        let attack = Attack::from_template(&template);
        assert_eq!(attack.behavior, MoveBehavior::StatusInflict);
        assert_eq!(attack.range, 1);
    }

    #[test]
    fn test_tagged_behavior_deserialize() {
        let json = r#"{"name":"Flamethrower","category":"special","power":90,"type":"fire","range":4,
            "area":{"shape":"cone","angle":40.0},"behavior":{"kind":"multi_hit","projectiles":5}}"#;
        let template: MoveTemplate = serde_json::from_str(json).unwrap();
        let attack = Attack::from_template(&template);
        assert_eq!(attack.behavior, MoveBehavior::MultiHit { projectiles: 5 });
        assert_eq!(attack.area, AreaShape::Cone { angle: 40.0 });
    }
}
