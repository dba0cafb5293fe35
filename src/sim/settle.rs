//! Settlement detection
//!
//! idle → rolling → settled. Time here is simulation time, counted in fixed
//! steps, so every client settles a given roll on the same step no matter how
//! fast its frames arrive. A roll settles when the step cap is reached, or
//! once the minimum duration has passed and every die has stayed at rest for
//! a full rest window. The engine also arms a safety timer on the driver's
//! clock in case frames stop arriving.

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_ROLL_MS, MIN_ROLL_MS, REST_SPEED, REST_STEPS, STEP_MS};

/// Timing bounds and rest rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Never settle before this much simulation time (ms)
    pub min_roll_ms: f64,
    /// Always settle once this much simulation time has passed (ms)
    pub max_roll_ms: f64,
    /// Linear and angular speed under which a die counts as resting
    pub rest_speed: f32,
    /// Consecutive resting steps required
    pub rest_steps: u32,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            min_roll_ms: MIN_ROLL_MS,
            max_roll_ms: MAX_ROLL_MS,
            rest_speed: REST_SPEED,
            rest_steps: REST_STEPS,
        }
    }
}

impl SettleConfig {
    pub fn min_steps(&self) -> u64 {
        ms_to_steps(self.min_roll_ms)
    }

    /// Step cap; at least one step so a roll always ends
    pub fn max_steps(&self) -> u64 {
        ms_to_steps(self.max_roll_ms).max(1)
    }
}

fn ms_to_steps(ms: f64) -> u64 {
    if ms.is_finite() && ms > 0.0 {
        (ms / STEP_MS).round() as u64
    } else {
        0
    }
}

/// Why a roll settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleReason {
    /// Minimum duration passed with every die at rest
    AtRest,
    /// Step cap reached
    TimedOut,
    /// Safety timer fired before the frame loop got there
    SafetyTimer,
}

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RollPhase {
    Idle,
    Rolling {
        /// Driver clock at start (ms)
        started_at: f64,
    },
    Settled {
        started_at: f64,
        /// Steps simulated when the roll settled
        steps: u64,
        reason: SettleReason,
    },
}

#[derive(Debug, Clone)]
pub struct SettlementDetector {
    config: SettleConfig,
    phase: RollPhase,
    steps: u64,
    rest_streak: u32,
}

impl SettlementDetector {
    pub fn new(config: SettleConfig) -> Self {
        Self {
            config,
            phase: RollPhase::Idle,
            steps: 0,
            rest_streak: 0,
        }
    }

    pub fn config(&self) -> &SettleConfig {
        &self.config
    }

    pub fn phase(&self) -> RollPhase {
        self.phase
    }

    pub fn is_rolling(&self) -> bool {
        matches!(self.phase, RollPhase::Rolling { .. })
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.phase, RollPhase::Settled { .. })
    }

    /// Begin a roll at driver time `now` (ms)
    pub fn start(&mut self, now: f64) {
        self.phase = RollPhase::Rolling { started_at: now };
        self.steps = 0;
        self.rest_streak = 0;
    }

    pub fn reset(&mut self) {
        self.phase = RollPhase::Idle;
        self.steps = 0;
        self.rest_streak = 0;
    }

    /// Steps observed since the roll started
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulation time since the roll started (ms)
    pub fn elapsed_ms(&self) -> f64 {
        self.steps as f64 * STEP_MS
    }

    /// When the safety timer must fire for the current roll (driver clock)
    pub fn safety_deadline(&self) -> Option<f64> {
        match self.phase {
            RollPhase::Rolling { started_at } => Some(started_at + self.config.max_roll_ms),
            _ => None,
        }
    }

    /// Call once after every physics step; returns the reason on the
    /// transition into settled
    pub fn observe_step(&mut self, still_moving: bool) -> Option<SettleReason> {
        let RollPhase::Rolling { started_at } = self.phase else {
            return None;
        };
        self.steps += 1;
        self.rest_streak = if still_moving {
            0
        } else {
            self.rest_streak.saturating_add(1)
        };

        let reason = if self.steps >= self.config.max_steps() {
            SettleReason::TimedOut
        } else if self.steps >= self.config.min_steps()
            && self.rest_streak >= self.config.rest_steps
        {
            SettleReason::AtRest
        } else {
            return None;
        };

        self.phase = RollPhase::Settled {
            started_at,
            steps: self.steps,
            reason,
        };
        Some(reason)
    }

    /// Relabel a roll the safety timer finished
    pub fn mark_forced(&mut self) {
        if let RollPhase::Settled { reason, .. } = &mut self.phase {
            *reason = SettleReason::SafetyTimer;
        }
    }
}
