//! WebGPU rendering module
//!
//! Top-down orthographic view of the arena. Dice are flat-shaded hull meshes
//! transformed on the CPU each frame; the GPU only rasterizes.

pub mod mesh;
pub mod pipeline;

pub use mesh::{MeshSet, Triangle, Vertex, hull_faces};
pub use pipeline::DiceRenderState;

use crate::error::RenderError;
use crate::sim::{DieVisual, ModelRegistry};

/// Anything that can draw the dice of the active roll
pub trait DiceRenderer {
    /// Called once when the model registry finishes loading
    fn prepare(&mut self, _registry: &ModelRegistry) {}

    /// Draw one frame
    fn render(&mut self, dice: &[DieVisual]) -> Result<(), RenderError>;
}
