//! Reachability, footprint occupancy and line of fire
//!
//! Reachability is a breadth-first expansion costed by terrain. A tile is
//! expanded again only when it is reached with strictly more movement left,
//! which bounds the search on any finite grid.

use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::combatant::{Combatant, CombatantId, footprint_radius};
use crate::terrain::{TerrainGrid, movement_cost, path_weight};

/// The four orthogonal directions
pub const DIRECTIONS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// A tile the combatant can end its movement on
#[derive(Debug, Clone, PartialEq)]
pub struct Reachable {
    pub x: i32,
    pub y: i32,
    /// Tiles stepped through, start excluded, destination included
    pub path: Vec<(i32, i32)>,
    pub total_cost: u32,
    pub total_weight: f32,
    pub movement_left: u32,
}

/// Whether a footprint of `size` centred on (x, y) fits on the grid without
/// overlapping any living combatant not listed in `exclude`.
pub fn can_occupy(
    grid: &TerrainGrid,
    combatants: &[Combatant],
    x: i32,
    y: i32,
    size: u8,
    exclude: &[CombatantId],
) -> bool {
    let r = footprint_radius(size);
    for ty in (y - r)..=(y + r) {
        for tx in (x - r)..=(x + r) {
            if !grid.in_bounds(tx, ty) {
                return false;
            }
        }
    }
    !combatants.iter().any(|other| {
        other.is_alive()
            && !exclude.contains(&other.id)
            && footprints_overlap(x, y, r, other.x, other.y, other.footprint_radius())
    })
}

fn footprints_overlap(ax: i32, ay: i32, ar: i32, bx: i32, by: i32, br: i32) -> bool {
    (ax - bx).abs() <= ar + br && (ay - by).abs() <= ar + br
}

/// Every tile reachable from `start` with `movement_points`, in discovery
/// order. The start tile is always included.
pub fn find_reachable(
    grid: &TerrainGrid,
    combatants: &[Combatant],
    start: (i32, i32),
    movement_points: u32,
    mover: &Combatant,
    exclude_self: CombatantId,
) -> Vec<Reachable> {
    let exclude = [exclude_self];
    let mut best_left: HashMap<(i32, i32), u32> = HashMap::new();
    let mut slot: HashMap<(i32, i32), usize> = HashMap::new();
    let mut results: Vec<Reachable> = Vec::new();
    let mut queue: VecDeque<Reachable> = VecDeque::new();

    let origin = Reachable {
        x: start.0,
        y: start.1,
        path: Vec::new(),
        total_cost: 0,
        total_weight: 0.0,
        movement_left: movement_points,
    };
    best_left.insert(start, movement_points);
    slot.insert(start, 0);
    results.push(origin.clone());
    queue.push_back(origin);

    while let Some(node) = queue.pop_front() {
        if best_left.get(&(node.x, node.y)).is_some_and(|&b| b > node.movement_left) {
            continue;
        }
        for (dx, dy) in DIRECTIONS {
            let (nx, ny) = (node.x + dx, node.y + dy);
            let Some(terrain) = grid.get(nx, ny) else {
                continue;
            };
            let cost = movement_cost(terrain, mover);
            if cost > node.movement_left {
                continue;
            }
            let left = node.movement_left - cost;
            if best_left.get(&(nx, ny)).is_some_and(|&b| b >= left) {
                continue;
            }
            if !can_occupy(grid, combatants, nx, ny, mover.size, &exclude) {
                continue;
            }
            best_left.insert((nx, ny), left);

            let mut path = node.path.clone();
            path.push((nx, ny));
            let next = Reachable {
                x: nx,
                y: ny,
                path,
                total_cost: node.total_cost + cost,
                total_weight: node.total_weight + path_weight(terrain, mover),
                movement_left: left,
            };
            match slot.get(&(nx, ny)) {
                Some(&i) => results[i] = next.clone(),
                None => {
                    slot.insert((nx, ny), results.len());
                    results.push(next.clone());
                }
            }
            queue.push_back(next);
        }
    }
    results
}

/// Bresenham line between two tiles, both endpoints included
pub fn bresenham(from: (i32, i32), to: (i32, i32)) -> Vec<(i32, i32)> {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if to.0 > x { 1 } else { -1 };
    let sy = if to.1 > y { 1 } else { -1 };
    let mut err = dx + dy;
    let mut line = Vec::with_capacity((dx - dy + 1) as usize);
    loop {
        line.push((x, y));
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    line
}

/// Whether a ranged attack from `attacker` reaches `target` without passing
/// over one of the attacker's living allies.
pub fn line_of_fire_clear(combatants: &[Combatant], attacker: &Combatant, target: &Combatant) -> bool {
    let line = bresenham(attacker.pos(), target.pos());
    if line.len() <= 2 {
        return true;
    }
    line[1..line.len() - 1].iter().all(|&(x, y)| {
        !combatants.iter().any(|c| {
            c.id != attacker.id
                && c.id != target.id
                && c.is_alive()
                && c.team == attacker.team
                && c.covers(x, y)
        })
    })
}

/// Living combatant whose footprint covers the tile
pub fn combatant_at(combatants: &[Combatant], x: i32, y: i32) -> Option<&Combatant> {
    combatants.iter().find(|c| c.is_alive() && c.covers(x, y))
}

/// First free orthogonal neighbour tile a combatant could sidestep to
pub fn adjacent_free_tile(
    grid: &TerrainGrid,
    combatants: &[Combatant],
    mover: &Combatant,
) -> Option<(i32, i32)> {
    DIRECTIONS
        .iter()
        .map(|(dx, dy)| (mover.x + dx, mover.y + dy))
        .find(|&(x, y)| can_occupy(grid, combatants, x, y, mover.size, &[mover.id]))
}
