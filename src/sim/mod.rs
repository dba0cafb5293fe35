//! Deterministic dice simulation
//!
//! Everything that decides a roll's outcome lives here and must stay pure:
//! - Seeded draws only, consumed in a fixed order
//! - Fixed timestep only
//! - A fresh world per roll
//! - No rendering, transport or platform dependencies

pub mod dice;
pub mod headless;
pub mod registry;
pub mod resolve;
pub mod seed;
pub mod settle;
pub mod world;

pub use dice::{DieKind, RollKey, RollRequest, RollResult, check_count};
pub use headless::{FramePacing, SimulatedRoll, simulate_roll, step_once, step_to_settlement};
pub use registry::{CalibrationTable, ColliderShape, DieModel, FaceNormal, ModelRegistry};
pub use resolve::{FaceReading, UP, read_face, resolve_values};
pub use seed::{SeedStream, fresh_seed};
pub use settle::{RollPhase, SettleConfig, SettleReason, SettlementDetector};
pub use world::{ColliderKind, DieInstance, DieVisual, Launch, PhysicsWorld, collider_for};
