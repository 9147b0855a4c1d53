//! Dice pools and roll results
//!
//! A pool of d6 is rolled for every contested check. Each face is a success,
//! a failure or neutral; checks compare net successes.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::rng::RandomSource;

/// Sides on every pool die
pub const DIE_SIDES: u32 = 6;

/// Outcome of a single die
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum DieOutcome {
    Failure,
    Neutral,
    Success,
}

impl DieOutcome {
    /// Fixed face mapping: 1 fails, 2-3 are neutral, 4-6 succeed
    pub const fn from_face(face: u32) -> Self {
        match face {
            0 | 1 => DieOutcome::Failure,
            2 | 3 => DieOutcome::Neutral,
            _ => DieOutcome::Success,
        }
    }
}

/// Result of rolling a dice pool
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RollResult {
    /// Face of every die rolled, in roll order
    pub faces: Vec<u32>,
    pub successes: u32,
    pub failures: u32,
    /// successes - failures
    pub net_successes: i32,
}

impl RollResult {
    /// A roll of zero dice
    pub const EMPTY: RollResult = RollResult {
        faces: Vec::new(),
        successes: 0,
        failures: 0,
        net_successes: 0,
    };

    /// Build a result from already-rolled faces
    pub fn from_faces(faces: Vec<u32>) -> Self {
        let mut successes = 0;
        let mut failures = 0;
        for &face in &faces {
            match DieOutcome::from_face(face) {
                DieOutcome::Success => successes += 1,
                DieOutcome::Failure => failures += 1,
                DieOutcome::Neutral => {}
            }
        }
        Self {
            faces,
            successes,
            failures,
            net_successes: successes as i32 - failures as i32,
        }
    }

    /// Number of dice in the pool
    pub fn dice(&self) -> usize {
        self.faces.len()
    }

    /// Outcome of each die, in roll order
    pub fn outcomes(&self) -> impl Iterator<Item = DieOutcome> + '_ {
        self.faces.iter().map(|&f| DieOutcome::from_face(f))
    }
}

/// Convert a skill value (accuracy, dodge) into a number of dice.
///
/// One die per point, clamped to `[0, cap]`.
pub fn dice_pool(skill: i32, cap: u32) -> u32 {
    skill.clamp(0, cap as i32) as u32
}

/// Roll `count` d6. A count of zero or less rolls nothing.
pub fn roll_dice(count: i32, rng: &mut dyn RandomSource) -> RollResult {
    if count <= 0 {
        return RollResult::EMPTY;
    }
    let faces = (0..count).map(|_| rng.rnd(DIE_SIDES)).collect();
    RollResult::from_faces(faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{GameRng, ScriptedRng};

    #[test]
    fn test_face_mapping() {
        assert_eq!(DieOutcome::from_face(1), DieOutcome::Failure);
        assert_eq!(DieOutcome::from_face(2), DieOutcome::Neutral);
        assert_eq!(DieOutcome::from_face(3), DieOutcome::Neutral);
        for face in 4..=6 {
            assert_eq!(DieOutcome::from_face(face), DieOutcome::Success);
        }
    }

    #[test]
    fn test_zero_and_negative_counts_roll_nothing() {
        let mut rng = GameRng::new(7);
        for count in [0, -1, -20] {
            let roll = roll_dice(count, &mut rng);
            assert_eq!(roll.dice(), 0);
            assert_eq!(roll.net_successes, 0);
        }
    }

    #[test]
    fn test_net_successes_from_script() {
        let mut rng = ScriptedRng::new([]);
        rng.faces(&[6, 5, 1, 2, 4]);
        let roll = roll_dice(5, &mut rng);
        assert_eq!(roll.successes, 3);
        assert_eq!(roll.failures, 1);
        assert_eq!(roll.net_successes, 2);
        assert_eq!(roll.faces, vec![6, 5, 1, 2, 4]);
    }

    #[test]
    fn test_net_bounded_by_pool() {
        let mut rng = GameRng::new(11);
        for _ in 0..500 {
            let roll = roll_dice(4, &mut rng);
            assert!(roll.net_successes.abs() <= 4);
            assert_eq!(roll.successes + roll.failures + roll.outcomes().filter(|o| *o == DieOutcome::Neutral).count() as u32, 4);
        }
    }

    #[test]
    fn test_dice_pool_clamps() {
        assert_eq!(dice_pool(-3, 20), 0);
        assert_eq!(dice_pool(5, 20), 5);
        assert_eq!(dice_pool(50, 20), 20);
    }
}
