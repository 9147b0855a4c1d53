//! Random number generation for battles
//!
//! Uses a seeded ChaCha RNG for reproducible battles. Every random draw in the
//! core goes through [`RandomSource`] so tests can substitute a scripted source.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Source of randomness consumed by the battle core.
///
/// Only [`RandomSource::rn2`] must be implemented; everything else is derived
/// from it so a scripted source controls every draw.
pub trait RandomSource: Send {
    /// Returns a value in `0..n`. Returns 0 if n is 0.
    fn rn2(&mut self, n: u32) -> u32;

    /// Returns a value in `1..=n`. Returns 0 if n is 0.
    fn rnd(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.rn2(n) + 1
    }

    /// Roll n dice with m sides and sum them
    fn dice(&mut self, n: u32, m: u32) -> u32 {
        if m == 0 {
            return 0;
        }
        (0..n).map(|_| self.rnd(m)).sum()
    }

    /// Returns true with probability percent/100
    fn percent(&mut self, percent: u32) -> bool {
        self.rn2(100) < percent
    }

    /// Pick a random index into a collection of `len` items
    fn choose_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.rn2(len as u32) as usize)
        }
    }
}

/// Battle random number generator
///
/// Wraps ChaCha8Rng for reproducible battles.
/// Note: RNG state is not serialized - sessions restore with a new RNG from the original seed.
#[derive(Debug, Clone)]
pub struct GameRng {
    rng: ChaCha8Rng,
    seed: u64,
}

// Custom serialization - only serialize seed, recreate RNG on deserialize
impl Serialize for GameRng {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.seed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GameRng {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let seed = u64::deserialize(deserializer)?;
        Ok(GameRng::new(seed))
    }
}

impl GameRng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create a new RNG with a random seed
    pub fn from_entropy() -> Self {
        let seed = rand::random();
        Self::new(seed)
    }

    /// Get the seed used to create this RNG
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for GameRng {
    fn rn2(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Deterministic source that replays a script of raw draws.
///
/// Each call to `rn2(n)` pops the next scripted value (saturated to `n - 1`).
/// Once the script runs out, draws come from a `GameRng` seeded with 0.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    script: VecDeque<u32>,
    fallback: GameRng,
}

impl ScriptedRng {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            script: values.into_iter().collect(),
            fallback: GameRng::new(0),
        }
    }

    /// Queue a raw draw
    pub fn push(&mut self, value: u32) -> &mut Self {
        self.script.push_back(value);
        self
    }

    /// Queue d6 faces (1..=6) for a dice roll
    pub fn faces(&mut self, faces: &[u32]) -> &mut Self {
        for &face in faces {
            self.script.push_back(face.saturating_sub(1));
        }
        self
    }

    /// Queue a percent check that passes for any probability above 0
    pub fn pass(&mut self) -> &mut Self {
        self.push(0)
    }

    /// Queue a percent check that fails for any probability below 100
    pub fn fail(&mut self) -> &mut Self {
        self.push(99)
    }

    /// Number of scripted draws not consumed yet
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl RandomSource for ScriptedRng {
    fn rn2(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        match self.script.pop_front() {
            Some(value) => value.min(n - 1),
            None => self.fallback.rn2(n),
        }
    }
}
