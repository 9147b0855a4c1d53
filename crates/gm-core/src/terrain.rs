//! Terrain grid and the terrain cost model
//!
//! The grid is generated once per battle and never changes afterwards.
//! Three separate questions are answered per tile and combatant:
//! - movement cost, spent from the combatant's movement points
//! - path weight, a preference score that steers route choice
//! - status risk, rolled each time a tile is entered

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::combatant::Combatant;
use crate::config::BattleConfig;
use crate::error::GridError;
use crate::rng::RandomSource;
use crate::status::{StatusKind, can_apply};
use crate::types::ElementType;

/// Terrain type of one tile
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
pub enum Terrain {
    #[default]
    Grass = 0,
    Water = 1,
    Mountain = 2,
    Sand = 3,
    Lava = 4,
    Swamp = 5,
    Snow = 6,
}

impl Terrain {
    /// Map glyph used in fixtures and the simulator's map dump
    pub const fn glyph(&self) -> char {
        match self {
            Terrain::Grass => '.',
            Terrain::Water => '~',
            Terrain::Mountain => '^',
            Terrain::Sand => ':',
            Terrain::Lava => '!',
            Terrain::Swamp => '%',
            Terrain::Snow => '*',
        }
    }

    pub const fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' => Some(Terrain::Grass),
            '~' => Some(Terrain::Water),
            '^' => Some(Terrain::Mountain),
            ':' => Some(Terrain::Sand),
            '!' => Some(Terrain::Lava),
            '%' => Some(Terrain::Swamp),
            '*' => Some(Terrain::Snow),
            _ => None,
        }
    }
}

/// Scenario selector for grid generation
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
pub enum Scenario {
    #[default]
    Plains,
    Volcanic,
    Tundra,
    Wetlands,
    Highlands,
    Mixed,
}

impl Scenario {
    /// Terrain mix as (terrain, weight) pairs; weights sum to 100
    fn distribution(&self) -> &'static [(Terrain, u32)] {
        match self {
            Scenario::Plains => &[
                (Terrain::Grass, 80),
                (Terrain::Sand, 10),
                (Terrain::Water, 6),
                (Terrain::Mountain, 4),
            ],
            Scenario::Volcanic => &[
                (Terrain::Grass, 40),
                (Terrain::Sand, 20),
                (Terrain::Lava, 25),
                (Terrain::Mountain, 15),
            ],
            Scenario::Tundra => &[
                (Terrain::Snow, 60),
                (Terrain::Grass, 20),
                (Terrain::Water, 10),
                (Terrain::Mountain, 10),
            ],
            Scenario::Wetlands => &[
                (Terrain::Grass, 40),
                (Terrain::Swamp, 30),
                (Terrain::Water, 25),
                (Terrain::Sand, 5),
            ],
            Scenario::Highlands => &[
                (Terrain::Grass, 45),
                (Terrain::Mountain, 40),
                (Terrain::Snow, 10),
                (Terrain::Water, 5),
            ],
            Scenario::Mixed => &[
                (Terrain::Grass, 50),
                (Terrain::Water, 10),
                (Terrain::Mountain, 10),
                (Terrain::Sand, 10),
                (Terrain::Lava, 6),
                (Terrain::Swamp, 7),
                (Terrain::Snow, 7),
            ],
        }
    }

    fn pick(&self, rng: &mut dyn RandomSource) -> Terrain {
        let table = self.distribution();
        let total: u32 = table.iter().map(|(_, w)| w).sum();
        let mut roll = rng.rn2(total);
        for &(terrain, weight) in table {
            if roll < weight {
                return terrain;
            }
            roll -= weight;
        }
        Terrain::Grass
    }
}

/// Columns at each edge kept as grass so both sides have somewhere to deploy
pub const DEPLOY_COLUMNS: usize = 2;

/// Immutable 2D terrain map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainGrid {
    width: usize,
    height: usize,
    cells: Vec<Terrain>,
}

impl TerrainGrid {
    /// Uniform grid
    pub fn new(width: usize, height: usize, fill: Terrain) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width * height],
        }
    }

    /// Build from glyph rows, top row first
    pub fn from_rows(rows: &[&str]) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(GridError::Empty);
        }
        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(GridError::Ragged {
                    row: y,
                    expected: width,
                    found,
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                let terrain =
                    Terrain::from_glyph(glyph).ok_or(GridError::UnknownGlyph { glyph, x, y })?;
                cells.push(terrain);
            }
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Generate a grid for a scenario
    pub fn generate(
        scenario: Scenario,
        width: usize,
        height: usize,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let mut grid = Self::new(width, height, Terrain::Grass);
        for y in 0..height {
            for x in 0..width {
                if x < DEPLOY_COLUMNS || x + DEPLOY_COLUMNS >= width {
                    continue;
                }
                grid.cells[y * width + x] = scenario.pick(rng);
            }
        }
        grid
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Terrain at a tile, `None` when out of bounds
    pub fn get(&self, x: i32, y: i32) -> Option<Terrain> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(self.cells[y as usize * self.width + x as usize])
    }

    /// Render as glyph rows
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(Terrain::glyph).collect())
            .collect()
    }
}

// ============================================================================
// Cost model
// ============================================================================

/// Mountain cost tier for a single type
fn mountain_tier(element: ElementType) -> u32 {
    use ElementType::*;
    match element {
        Flying | Dragon | Rock | Ground | Steel => 1,
        Fire | Electric | Fighting | Bug | Ghost | Dark | Normal => 2,
        Grass | Ice | Fairy => 3,
        Water | Poison | Psychic => 4,
    }
}

/// Movement points spent entering a tile
pub fn movement_cost(terrain: Terrain, combatant: &Combatant) -> u32 {
    let flies = combatant.can_fly();
    match terrain {
        Terrain::Grass => 1,
        Terrain::Sand => 2,
        Terrain::Water => {
            if flies || combatant.can_swim() {
                1
            } else {
                2
            }
        }
        Terrain::Mountain => {
            if flies {
                1
            } else {
                combatant.types.types().map(mountain_tier).min().unwrap_or(2)
            }
        }
        Terrain::Lava => {
            if flies {
                1
            } else {
                2
            }
        }
        Terrain::Swamp => {
            if flies || combatant.has_type(ElementType::Poison) {
                1
            } else {
                2
            }
        }
        Terrain::Snow => {
            if flies || combatant.has_type(ElementType::Ice) || combatant.has_type(ElementType::Fire)
            {
                1
            } else {
                2
            }
        }
    }
}

/// Penalty weights for hazards the combatant is not immune to
const WATER_PENALTY: f32 = 5.0;
const LAVA_PENALTY: f32 = 10.0;
const SWAMP_PENALTY: f32 = 3.0;
const SNOW_PENALTY: f32 = 3.0;

/// Route preference for a tile; lower is better
pub fn path_weight(terrain: Terrain, combatant: &Combatant) -> f32 {
    if combatant.can_fly() {
        return 1.0;
    }
    match terrain {
        Terrain::Water if !combatant.can_swim() => WATER_PENALTY,
        Terrain::Lava if combatant.has_type(ElementType::Fire) => 0.1,
        Terrain::Lava if !burn_immune(combatant) => LAVA_PENALTY,
        Terrain::Swamp if combatant.ability.thrives_in_swamp() => 0.0,
        Terrain::Swamp if !poison_immune(combatant) => SWAMP_PENALTY,
        Terrain::Snow if !freeze_immune(combatant) => SNOW_PENALTY,
        _ => movement_cost(terrain, combatant) as f32,
    }
}

fn burn_immune(combatant: &Combatant) -> bool {
    can_apply(
        StatusKind::Burned,
        combatant.types,
        &combatant.ability,
        &combatant.statuses,
    )
    .is_err()
}

fn poison_immune(combatant: &Combatant) -> bool {
    can_apply(
        StatusKind::Poisoned,
        combatant.types,
        &combatant.ability,
        &combatant.statuses,
    )
    .is_err()
}

fn freeze_immune(combatant: &Combatant) -> bool {
    combatant.can_fly()
        || combatant.has_type(ElementType::Fire)
        || can_apply(
            StatusKind::Frozen,
            combatant.types,
            &combatant.ability,
            &combatant.statuses,
        )
        .is_err()
}

/// Consequence rolled when a tile is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainEffect {
    /// HP lost to deep water
    Damage(u32),
    /// Status the tile inflicts
    Status(StatusKind),
}

/// Outcome of a terrain risk roll
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TerrainRisk {
    pub effect: Option<TerrainEffect>,
    pub message: Option<String>,
}

impl TerrainRisk {
    fn none() -> Self {
        Self::default()
    }

    fn with(effect: TerrainEffect, message: String) -> Self {
        Self {
            effect: Some(effect),
            message: Some(message),
        }
    }
}

/// Roll the risk of entering `terrain` from `from`.
///
/// Lava and swamp only strike when entered from a different terrain;
/// water and snow strike on every entry.
pub fn status_risk(
    terrain: Terrain,
    from: Option<Terrain>,
    combatant: &Combatant,
    config: &BattleConfig,
    rng: &mut dyn RandomSource,
) -> TerrainRisk {
    let name = &combatant.species;
    let entering = from != Some(terrain);
    match terrain {
        Terrain::Water if !combatant.can_fly() && !combatant.can_swim() => {
            let damage = rng.rnd(6);
            TerrainRisk::with(
                TerrainEffect::Damage(damage),
                format!("{name} struggles through deep water and takes {damage} damage!"),
            )
        }
        Terrain::Lava if entering && !combatant.can_fly() && !burn_immune(combatant) => {
            if rng.percent(config.lava_burn_chance) {
                TerrainRisk::with(
                    TerrainEffect::Status(StatusKind::Burned),
                    format!("{name} was burned by the lava!"),
                )
            } else {
                TerrainRisk::none()
            }
        }
        Terrain::Swamp
            if entering && !combatant.ability.thrives_in_swamp() && !poison_immune(combatant) =>
        {
            TerrainRisk::with(
                TerrainEffect::Status(StatusKind::Poisoned),
                format!("{name} was poisoned by the swamp!"),
            )
        }
        Terrain::Snow if !freeze_immune(combatant) => {
            if rng.percent(config.snow_freeze_chance) {
                TerrainRisk::with(
                    TerrainEffect::Status(StatusKind::Frozen),
                    format!("{name} froze solid in the snow!"),
                )
            } else {
                TerrainRisk::none()
            }
        }
        _ => TerrainRisk::none(),
    }
}
