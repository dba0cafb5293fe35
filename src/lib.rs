//! Dice Tray - synchronised physical dice for shared tabletop rooms
//!
//! Only a roll's seed and parameters travel between clients; every client
//! simulates the throw itself and reads the same faces.
//!
//! Core modules:
//! - `sim`: Deterministic simulation (seed stream, world, settlement, faces)
//! - `engine`: Roll lifecycle, frame/timer callbacks, asset loading
//! - `transport`: Roll propagation between tabs and devices
//! - `renderer`: WebGPU dice rendering
//! - `platform`: Browser/native platform abstraction
//! - `settings`: Persisted per-user preferences
//! - `history`: Recent results per room

pub mod engine;
pub mod error;
pub mod history;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;
pub mod transport;

pub use engine::{DiceEngine, EngineConfig, EngineStatus};
pub use error::{AssetError, RenderError, RollError, TransportError};
pub use history::RollHistory;
pub use settings::EngineSettings;
pub use sim::{DieKind, ModelRegistry, RollRequest, RollResult};

/// Simulation configuration constants
pub mod consts {
    /// Fixed physics timestep (one step per frame callback)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Simulation time covered by one step (ms)
    pub const STEP_MS: f64 = 1000.0 / 60.0;
    /// Nominal frame interval for headless drivers (ms)
    pub const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Upper bound on physics sub-steps per headless frame
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Settlement bounds in simulation time (ms)
    pub const MIN_ROLL_MS: f64 = 1500.0;
    pub const MAX_ROLL_MS: f64 = 6000.0;
    /// Speed below which a die counts as resting (units/s and rad/s)
    pub const REST_SPEED: f32 = 0.02;
    /// Consecutive resting steps before a roll counts as settled
    pub const REST_STEPS: u32 = 30;

    /// Largest die count accepted in one roll
    pub const MAX_DICE: u32 = 20;

    /// Arena (z is up, floor at z = 0)
    pub const ARENA_HALF_X: f32 = 6.0;
    pub const ARENA_HALF_Y: f32 = 4.0;
    pub const ARENA_HEIGHT: f32 = 10.0;
    pub const WALL_THICKNESS: f32 = 0.5;

    /// Spawn region
    pub const SPAWN_MARGIN: f32 = 1.2;
    pub const SPAWN_HEIGHT: f32 = 2.0;
    pub const SPAWN_LAYERS: usize = 4;
    pub const SPAWN_LAYER_GAP: f32 = 1.8;

    /// Launch ranges
    pub const LAUNCH_PLANAR_SPEED: f32 = 6.0;
    pub const LAUNCH_MIN_LIFT: f32 = 2.0;
    pub const LAUNCH_LIFT_RANGE: f32 = 4.0;
    pub const LAUNCH_SPIN: f32 = 14.0;

    /// Downward acceleration (exaggerated so throws read quickly)
    pub const GRAVITY: f32 = 25.0;
    pub const DIE_LINEAR_DAMPING: f32 = 0.1;
    pub const DIE_ANGULAR_DAMPING: f32 = 0.3;

    /// Contact surfaces
    pub const FLOOR_RESTITUTION: f32 = 0.3;
    pub const FLOOR_FRICTION: f32 = 0.6;
    pub const WALL_RESTITUTION: f32 = 0.5;
    pub const WALL_FRICTION: f32 = 0.2;
    pub const CEILING_RESTITUTION: f32 = 0.1;
    pub const CEILING_FRICTION: f32 = 0.1;
}
