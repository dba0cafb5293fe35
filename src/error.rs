//! Error types
//!
//! None of these are fatal to the page: the engine logs them and degrades
//! (queue the roll, fall back to a simpler collider, drop a bad frame).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollError {
    #[error("die count {0} is out of range")]
    InvalidCount(u32),
    #[error("unsupported die type d{0}")]
    UnsupportedDie(u32),
    #[error("dice engine has been torn down")]
    TornDown,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("malformed model document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no model registered for d{0}")]
    MissingModel(u32),
    #[error("d{sides} calibration has {found} faces")]
    FaceCount { sides: u32, found: usize },
    #[error("d{sides} calibration has invalid face value {value}")]
    FaceValue { sides: u32, value: u32 },
    #[error("d{sides} face {value} has a zero-length normal")]
    ZeroNormal { sides: u32, value: u32 },
    #[error("d{0} has no usable vertices")]
    NoVertices(u32),
    #[error("asset loading failed: {0}")]
    Load(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{0} channel is not available")]
    Unavailable(&'static str),
    #[error("{channel} send failed: {reason}")]
    Send {
        channel: &'static str,
        reason: String,
    },
    #[error("could not encode roll message: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("no suitable graphics adapter: {0}")]
    Adapter(String),
    #[error("device request failed: {0}")]
    Device(String),
}
