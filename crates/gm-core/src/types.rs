//! Elemental types, the type chart and ability immunities

use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::status::StatusKind;

/// Elemental type of a combatant or a move
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
#[repr(u8)]
pub enum ElementType {
    #[default]
    Normal = 0,
    Fire = 1,
    Water = 2,
    Electric = 3,
    Grass = 4,
    Ice = 5,
    Fighting = 6,
    Poison = 7,
    Ground = 8,
    Flying = 9,
    Psychic = 10,
    Bug = 11,
    Rock = 12,
    Ghost = 13,
    Dragon = 14,
    Dark = 15,
    Steel = 16,
    Fairy = 17,
}

bitflags! {
    /// Set of elemental types, used for membership checks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeSet: u32 {
        const NORMAL = 1 << 0;
        const FIRE = 1 << 1;
        const WATER = 1 << 2;
        const ELECTRIC = 1 << 3;
        const GRASS = 1 << 4;
        const ICE = 1 << 5;
        const FIGHTING = 1 << 6;
        const POISON = 1 << 7;
        const GROUND = 1 << 8;
        const FLYING = 1 << 9;
        const PSYCHIC = 1 << 10;
        const BUG = 1 << 11;
        const ROCK = 1 << 12;
        const GHOST = 1 << 13;
        const DRAGON = 1 << 14;
        const DARK = 1 << 15;
        const STEEL = 1 << 16;
        const FAIRY = 1 << 17;
    }
}

impl ElementType {
    /// Single-bit set for this type
    pub const fn bit(self) -> TypeSet {
        TypeSet::from_bits_truncate(1 << self as u32)
    }
}

impl TypeSet {
    /// Build a set from a list of types
    pub fn of(types: &[ElementType]) -> Self {
        types.iter().fold(TypeSet::empty(), |acc, t| acc | t.bit())
    }

    /// Whether the set holds this type
    pub fn has(&self, element: ElementType) -> bool {
        self.contains(element.bit())
    }

    /// Whether the set shares any type with `other`
    pub fn any_of(&self, other: TypeSet) -> bool {
        self.intersects(other)
    }

    /// Iterate the types in the set, in chart order
    pub fn types(&self) -> impl Iterator<Item = ElementType> + '_ {
        ElementType::iter().filter(move |t| self.has(*t))
    }
}

/// Effectiveness of one attacking type against one defending type
pub fn effectiveness_single(attack: ElementType, defend: ElementType) -> f32 {
    use ElementType::*;

    let (strong, weak, immune): (&[ElementType], &[ElementType], &[ElementType]) = match attack {
        Normal => (&[], &[Rock, Steel], &[Ghost]),
        Fire => (&[Grass, Ice, Bug, Steel], &[Fire, Water, Rock, Dragon], &[]),
        Water => (&[Fire, Ground, Rock], &[Water, Grass, Dragon], &[]),
        Electric => (&[Water, Flying], &[Electric, Grass, Dragon], &[Ground]),
        Grass => (
            &[Water, Ground, Rock],
            &[Fire, Grass, Poison, Flying, Bug, Dragon, Steel],
            &[],
        ),
        Ice => (&[Grass, Ground, Flying, Dragon], &[Fire, Water, Ice, Steel], &[]),
        Fighting => (
            &[Normal, Ice, Rock, Dark, Steel],
            &[Poison, Flying, Psychic, Bug, Fairy],
            &[Ghost],
        ),
        Poison => (&[Grass, Fairy], &[Poison, Ground, Rock, Ghost], &[Steel]),
        Ground => (&[Fire, Electric, Poison, Rock, Steel], &[Grass, Bug], &[Flying]),
        Flying => (&[Grass, Fighting, Bug], &[Electric, Rock, Steel], &[]),
        Psychic => (&[Fighting, Poison], &[Psychic, Steel], &[Dark]),
        Bug => (
            &[Grass, Psychic, Dark],
            &[Fire, Fighting, Poison, Flying, Ghost, Steel, Fairy],
            &[],
        ),
        Rock => (&[Fire, Ice, Flying, Bug], &[Fighting, Ground, Steel], &[]),
        Ghost => (&[Psychic, Ghost], &[Dark], &[Normal]),
        Dragon => (&[Dragon], &[Steel], &[Fairy]),
        Dark => (&[Psychic, Ghost], &[Fighting, Dark, Fairy], &[]),
        Steel => (&[Ice, Rock, Fairy], &[Fire, Water, Electric, Steel], &[]),
        Fairy => (&[Fighting, Dragon, Dark], &[Fire, Poison, Steel], &[]),
    };

    if immune.contains(&defend) {
        0.0
    } else if strong.contains(&defend) {
        2.0
    } else if weak.contains(&defend) {
        0.5
    } else {
        1.0
    }
}

/// Combined effectiveness against every type of the defender
pub fn effectiveness(attack: ElementType, defender: TypeSet) -> f32 {
    defender
        .types()
        .map(|t| effectiveness_single(attack, t))
        .product()
}

/// Abilities the battle core reacts to
///
/// Unknown ability names parse into [`Ability::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Ability {
    #[default]
    None,
    Levitate,
    FlashFire,
    WaterAbsorb,
    StormDrain,
    DrySkin,
    VoltAbsorb,
    LightningRod,
    MotorDrive,
    SapSipper,
    EarthEater,
    WellBakedBody,
    PoisonHeal,
    Limber,
    Insomnia,
    WaterVeil,
    Immunity,
    MagmaArmor,
    #[strum(default)]
    Other(String),
}

impl Ability {
    /// Parse a display name such as "Flash Fire" or "flash-fire"
    pub fn parse(name: &str) -> Self {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if key.is_empty() {
            return Ability::None;
        }
        match Ability::from_str(&key) {
            Ok(Ability::Other(_)) | Err(_) => Ability::Other(name.to_string()),
            Ok(ability) => ability,
        }
    }

    /// Damage types this ability makes its holder immune to
    pub fn immune_types(&self) -> &'static [ElementType] {
        match self {
            Ability::Levitate | Ability::EarthEater => &[ElementType::Ground],
            Ability::FlashFire | Ability::WellBakedBody => &[ElementType::Fire],
            Ability::WaterAbsorb | Ability::StormDrain | Ability::DrySkin => {
                &[ElementType::Water]
            }
            Ability::VoltAbsorb | Ability::LightningRod | Ability::MotorDrive => {
                &[ElementType::Electric]
            }
            Ability::SapSipper => &[ElementType::Grass],
            _ => &[],
        }
    }

    /// Whether the ability blocks damage of this type
    pub fn blocks(&self, element: ElementType) -> bool {
        self.immune_types().contains(&element)
    }

    /// Status conditions this ability prevents
    pub fn blocks_status(&self, status: StatusKind) -> bool {
        match self {
            Ability::Limber => status == StatusKind::Paralyzed,
            Ability::Insomnia => status == StatusKind::Asleep,
            Ability::WaterVeil => status == StatusKind::Burned,
            Ability::Immunity => {
                matches!(status, StatusKind::Poisoned | StatusKind::BadlyPoisoned)
            }
            Ability::MagmaArmor => status == StatusKind::Frozen,
            _ => false,
        }
    }

    /// Swamp tiles heal instead of harm (poison-heal equivalent)
    pub fn thrives_in_swamp(&self) -> bool {
        matches!(self, Ability::PoisonHeal)
    }

    /// Holder hovers like a flyer
    pub fn levitates(&self) -> bool {
        matches!(self, Ability::Levitate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chart_entries() {
        assert_eq!(effectiveness_single(ElementType::Fire, ElementType::Grass), 2.0);
        assert_eq!(effectiveness_single(ElementType::Fire, ElementType::Water), 0.5);
        assert_eq!(effectiveness_single(ElementType::Normal, ElementType::Ghost), 0.0);
        assert_eq!(effectiveness_single(ElementType::Ground, ElementType::Flying), 0.0);
        assert_eq!(effectiveness_single(ElementType::Water, ElementType::Normal), 1.0);
    }

    #[test]
    fn test_dual_type_multiplies() {
        let rock_ground = TypeSet::of(&[ElementType::Rock, ElementType::Ground]);
        assert_eq!(effectiveness(ElementType::Water, rock_ground), 4.0);
        let water_flying = TypeSet::of(&[ElementType::Water, ElementType::Flying]);
        assert_eq!(effectiveness(ElementType::Electric, water_flying), 4.0);
        assert_eq!(effectiveness(ElementType::Ground, water_flying), 0.0);
    }

    #[test]
    fn test_type_set_membership() {
        let set = TypeSet::of(&[ElementType::Fire, ElementType::Flying]);
        assert!(set.has(ElementType::Fire));
        assert!(!set.has(ElementType::Water));
        assert_eq!(set.types().count(), 2);
        assert!(set.any_of(TypeSet::FLYING | TypeSet::DRAGON));
    }

    #[test]
    fn test_type_parse() {
        assert_eq!("Fire".parse::<ElementType>().ok(), Some(ElementType::Fire));
        assert_eq!("steel".parse::<ElementType>().ok(), Some(ElementType::Steel));
        assert!("plasma".parse::<ElementType>().is_err());
    }

    #[test]
    fn test_ability_parse_and_immunities() {
        assert_eq!(Ability::parse("Flash Fire"), Ability::FlashFire);
        assert_eq!(Ability::parse("volt-absorb"), Ability::VoltAbsorb);
        assert_eq!(Ability::parse(""), Ability::None);
        assert_eq!(
            Ability::parse("Huge Power"),
            Ability::Other("Huge Power".to_string())
        );
        assert!(Ability::Levitate.blocks(ElementType::Ground));
        assert!(!Ability::Levitate.blocks(ElementType::Fire));
        assert!(Ability::Limber.blocks_status(StatusKind::Paralyzed));
    }
}
