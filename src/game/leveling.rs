//! Time-to-level arithmetic.
//!
//! The seconds needed to leave level `L` are `floor(base * step^L)` up to
//! the exponential ceiling, then grow by a flat `linear` amount per level.
//! All TTL values are whole seconds so a run of decrements is exactly
//! additive no matter how it is split across ticks.

use crate::config::LevelingConfig;

use super::types::{Ally, Character};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Curve {
    pub base: f64,
    pub step: f64,
    pub ceiling: u32,
    pub linear: i64,
}

impl Curve {
    pub fn character(cfg: &LevelingConfig) -> Self {
        Self {
            base: cfg.base,
            step: cfg.step,
            ceiling: cfg.exp_ceiling,
            linear: cfg.linear_step,
        }
    }

    pub fn ally(cfg: &LevelingConfig) -> Self {
        Self {
            base: cfg.ally_base,
            step: cfg.ally_step,
            ceiling: cfg.exp_ceiling,
            linear: cfg.linear_step,
        }
    }

    /// Seconds of TTL granted on reaching `level`.
    pub fn step_for(&self, level: u32) -> i64 {
        let exp_level = level.min(self.ceiling);
        let exp = (self.base * self.step.powi(exp_level as i32)) as i64;
        if level <= self.ceiling {
            exp
        } else {
            exp.saturating_add(self.linear.saturating_mul(i64::from(level - self.ceiling)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Climber {
    Character,
    Ally,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUp {
    pub name: String,
    pub who: Climber,
    pub level: u32,
    /// TTL remaining after this level-up was applied.
    pub ttl: i64,
}

/// Applies one level-up per threshold crossed. Returns the levels reached,
/// ascending.
fn climb(level: &mut u32, ttl: &mut i64, curve: &Curve) -> Vec<(u32, i64)> {
    let mut reached = Vec::new();
    while *ttl <= 0 {
        *level += 1;
        let grant = curve.step_for(*level);
        assert!(grant > 0, "level {} grants no time; TTL would never recover", *level);
        *ttl = ttl.saturating_add(grant);
        reached.push((*level, *ttl));
    }
    reached
}

/// Burns `dt` seconds of TTL off the character and its ally and applies
/// every level-up the deficit covers, in increasing level order. A
/// non-positive `dt` is a no-op.
pub fn advance(character: &mut Character, dt: i64, curve: &Curve, ally_curve: &Curve) -> Vec<LevelUp> {
    if dt <= 0 {
        return Vec::new();
    }
    character.ttl -= dt;
    character.idled += dt;

    let mut ups: Vec<LevelUp> = climb(&mut character.level, &mut character.ttl, curve)
        .into_iter()
        .map(|(level, ttl)| LevelUp {
            name: character.name.clone(),
            who: Climber::Character,
            level,
            ttl,
        })
        .collect();
    if !ups.is_empty() {
        character.level_penalty = 0;
    }

    if let Some(ally) = character.ally.as_mut() {
        ally.ttl -= dt;
        ups.extend(
            climb(&mut ally.level, &mut ally.ttl, ally_curve)
                .into_iter()
                .map(|(level, ttl)| LevelUp {
                    name: character.name.clone(),
                    who: Climber::Ally,
                    level,
                    ttl,
                }),
        );
    }
    ups
}

/// A fresh ally at level zero.
pub fn new_ally(ally_curve: &Curve) -> Ally {
    Ally {
        level: 0,
        ttl: ally_curve.step_for(0),
    }
}
