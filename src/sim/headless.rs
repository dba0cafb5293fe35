//! Headless roll driver
//!
//! Runs a roll to settlement without rendering or transport. The stepping
//! helpers here are shared with the frame-driven engine, so both settle a
//! roll on the same step.

use serde::{Deserialize, Serialize};

use super::dice::{RollRequest, RollResult};
use super::registry::ModelRegistry;
use super::resolve::resolve_values;
use super::settle::{SettleConfig, SettleReason, SettlementDetector};
use super::world::{ColliderKind, PhysicsWorld};
use crate::consts::{FRAME_MS, MAX_SUBSTEPS};
use crate::error::AssetError;

/// How a headless driver paces frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramePacing {
    /// Driver clock advance per frame (ms)
    pub frame_ms: f64,
    /// Physics steps per frame
    pub substeps: u32,
}

impl Default for FramePacing {
    fn default() -> Self {
        Self {
            frame_ms: FRAME_MS,
            substeps: 1,
        }
    }
}

impl FramePacing {
    /// Fall back to the nominal interval and clamp substeps into range
    pub fn validated(self) -> Self {
        Self {
            frame_ms: if self.frame_ms.is_finite() && self.frame_ms > 0.0 {
                self.frame_ms
            } else {
                FRAME_MS
            },
            substeps: self.substeps.clamp(1, MAX_SUBSTEPS),
        }
    }
}

/// Outcome of a headless roll
#[derive(Debug, Clone)]
pub struct SimulatedRoll {
    pub result: RollResult,
    pub reason: SettleReason,
    /// Simulation time from start to settlement (ms)
    pub elapsed_ms: f64,
    pub steps: u64,
    pub frames: u64,
    /// Driver clock at settlement (`frames × frame_ms`)
    pub clock_ms: f64,
    pub colliders: Vec<ColliderKind>,
}

/// One physics step followed by the settlement check
pub fn step_once(
    world: &mut PhysicsWorld,
    detector: &mut SettlementDetector,
) -> Option<SettleReason> {
    world.step();
    let still_moving = world.any_moving(detector.config().rest_speed);
    detector.observe_step(still_moving)
}

/// Step until the detector settles; `None` if it was not rolling
///
/// Bounded by the detector's step cap.
pub fn step_to_settlement(
    world: &mut PhysicsWorld,
    detector: &mut SettlementDetector,
) -> Option<SettleReason> {
    while detector.is_rolling() {
        if let Some(reason) = step_once(world, detector) {
            return Some(reason);
        }
    }
    None
}

/// Build, step and resolve one roll without a frame clock
pub fn simulate_roll(
    registry: &ModelRegistry,
    request: &RollRequest,
    settle: &SettleConfig,
    pacing: FramePacing,
) -> Result<SimulatedRoll, AssetError> {
    let pacing = pacing.validated();
    let mut world = PhysicsWorld::build(registry, request)?;
    let mut detector = SettlementDetector::new(*settle);
    detector.start(0.0);

    let mut frames = 0u64;
    let mut settled = None;
    while settled.is_none() && detector.is_rolling() {
        frames += 1;
        for _ in 0..pacing.substeps {
            settled = step_once(&mut world, &mut detector);
            if settled.is_some() {
                break;
            }
        }
    }
    let reason = settled.unwrap_or(SettleReason::TimedOut);

    world.freeze();
    let values = resolve_values(registry, world.orientations())?;

    Ok(SimulatedRoll {
        result: RollResult {
            seed: request.seed,
            count: request.count,
            sides: request.sides.sides(),
            values,
            triggered_by: request.triggered_by.clone(),
        },
        reason,
        elapsed_ms: detector.elapsed_ms(),
        steps: world.steps(),
        frames,
        clock_ms: frames as f64 * pacing.frame_ms,
        colliders: world.dice().iter().map(|d| d.collider).collect(),
    })
}
