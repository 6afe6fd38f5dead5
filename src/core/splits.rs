use std::collections::BTreeMap;

use serde::Serialize;

use super::error::{ModelError, Result};
use super::types::{Level, ModelConfig, Role, RoleSplit};

const SPLITS_TABLE: &str = "fee splits";

#[derive(Debug, Clone)]
struct LevelSplits {
    current: RoleSplit,
    baseline: RoleSplit,
    accepted: RoleSplit,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizeOutcome {
    AlreadyBalanced,
    Rebalanced,
    AllRolesLocked,
}

/// Per-level fee-split state machine. `current` is whatever the user last
/// typed, `baseline` is the reference for lock detection, and `accepted` is
/// the last valid split the financial calculator is allowed to read.
#[derive(Debug, Clone)]
pub struct SplitNormalizer {
    levels: BTreeMap<Level, LevelSplits>,
    total_tolerance: f64,
    lock_tolerance: f64,
}

impl SplitNormalizer {
    pub fn new(defaults: &BTreeMap<Level, RoleSplit>, config: &ModelConfig) -> Self {
        let levels = defaults
            .iter()
            .map(|(level, split)| {
                (
                    *level,
                    LevelSplits {
                        current: split.clone(),
                        baseline: split.clone(),
                        accepted: split.clone(),
                    },
                )
            })
            .collect();
        Self {
            levels,
            total_tolerance: config.split_total_tolerance,
            lock_tolerance: config.lock_tolerance,
        }
    }

    /// Replaces a level's session state, e.g. when a request carries the
    /// client's editing state. `accepted` is reset to the baseline (the last
    /// known-good split); call `commit_if_valid` afterwards to promote
    /// `current`.
    pub fn restore(&mut self, level: Level, current: RoleSplit, baseline: RoleSplit) -> Result<()> {
        let state = self.state_mut(level)?;
        state.accepted = baseline.clone();
        state.baseline = baseline;
        state.current = current;
        Ok(())
    }

    pub fn set_role_value(&mut self, level: Level, role: Role, value: f64) -> Result<()> {
        let state = self.state_mut(level)?;
        state.current.insert(role, value.clamp(0.0, 100.0));
        Ok(())
    }

    pub fn current(&self, level: Level) -> Result<&RoleSplit> {
        Ok(&self.state(level)?.current)
    }

    pub fn baseline(&self, level: Level) -> Result<&RoleSplit> {
        Ok(&self.state(level)?.baseline)
    }

    pub fn accepted(&self, level: Level) -> Result<&RoleSplit> {
        Ok(&self.state(level)?.accepted)
    }

    pub fn total(&self, level: Level) -> Result<f64> {
        Ok(self.state(level)?.current.values().sum())
    }

    pub fn is_valid(&self, level: Level) -> Result<bool> {
        Ok((self.total(level)? - 100.0).abs() <= self.total_tolerance)
    }

    pub fn commit_if_valid(&mut self, level: Level) -> Result<bool> {
        if !self.is_valid(level)? {
            return Ok(false);
        }
        let state = self.state_mut(level)?;
        state.accepted = state.current.clone();
        Ok(true)
    }

    /// Rebalances the unlocked roles so the total returns to 100%. A role is
    /// locked once its current value sits more than `lock_tolerance` away
    /// from the baseline. Validate-then-apply: an already-valid level is left
    /// untouched.
    pub fn normalize(&mut self, level: Level) -> Result<NormalizeOutcome> {
        if self.is_valid(level)? {
            return Ok(NormalizeOutcome::AlreadyBalanced);
        }

        let lock_tolerance = self.lock_tolerance;
        let state = self.state_mut(level)?;

        let mut locked_total = 0.0;
        let mut free = Vec::new();
        for (role, value) in &state.current {
            let base = state.baseline.get(role).copied().unwrap_or(*value);
            if (value - base).abs() > lock_tolerance {
                locked_total += value;
            } else {
                free.push(*role);
            }
        }

        if free.is_empty() {
            return Ok(NormalizeOutcome::AllRolesLocked);
        }

        // May be negative when locked roles alone exceed 100; allowed, the
        // invalid-total flag keeps reporting it.
        let even_share = round2((100.0 - locked_total) / free.len() as f64);
        for role in free {
            state.current.insert(role, even_share);
        }
        state.accepted = state.current.clone();
        state.baseline = state.current.clone();
        Ok(NormalizeOutcome::Rebalanced)
    }

    fn state(&self, level: Level) -> Result<&LevelSplits> {
        self.levels.get(&level).ok_or(ModelError::MissingLevel {
            table: SPLITS_TABLE,
            level,
        })
    }

    fn state_mut(&mut self, level: Level) -> Result<&mut LevelSplits> {
        self.levels.get_mut(&level).ok_or(ModelError::MissingLevel {
            table: SPLITS_TABLE,
            level,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
