//! The single source of randomness for the simulation.
//!
//! Every roll (walk steps, battle rolls, item finds, quest sampling and
//! failure) goes through [`Dice`], so scenario tests can swap in
//! [`ScriptedDice`] and force exact outcomes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

pub trait Dice: Send {
    /// Uniform integer in `[0, upper)`. `upper` of zero yields zero.
    fn below(&mut self, upper: u64) -> u64;

    /// Uniform integer in `[lo, hi]`.
    fn between(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo) as u64 + 1;
        lo + self.below(span) as i64
    }

    /// True with probability `1 / odds`. Odds of zero never fire.
    fn one_in(&mut self, odds: u64) -> bool {
        odds != 0 && self.below(odds) == 0
    }

    /// True with probability `pct / 100`.
    fn percent(&mut self, pct: u32) -> bool {
        self.below(100) < u64::from(pct)
    }
}

/// `StdRng`-backed dice, seeded explicitly or from entropy.
pub struct SeededDice {
    rng: StdRng,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Dice for SeededDice {
    fn below(&mut self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        self.rng.gen_range(0..upper)
    }
}

/// Replays a fixed list of raw values, each reduced modulo the requested
/// bound. Once exhausted every roll returns `fallback % upper`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    script: VecDeque<u64>,
    fallback: u64,
}

impl ScriptedDice {
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: values.into_iter().collect(),
            fallback: 0,
        }
    }

    /// Dice that always roll `value` (reduced modulo the bound).
    pub fn constant(value: u64) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: value,
        }
    }

    pub fn push(&mut self, value: u64) {
        self.script.push_back(value);
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Dice for ScriptedDice {
    fn below(&mut self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        self.script.pop_front().unwrap_or(self.fallback) % upper
    }
}
