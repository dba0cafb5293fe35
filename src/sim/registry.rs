//! Die geometry and face calibration
//!
//! The registry is loaded once per process and handed explicitly to the world
//! builder and the face resolver. Vertices are stored at unit circumradius and
//! scaled by the model radius when a collider is built.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::dice::DieKind;
use crate::error::AssetError;

/// Embedded geometry and calibration for the standard die set
const BUILTIN_MODELS: &str = include_str!("../../assets/dice_models.json");

/// Collider family used for a die type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColliderShape {
    /// Exact box (six-sided die)
    Cuboid,
    /// Convex hull of the model vertices
    Hull,
}

/// One calibrated face: value and its local-space outward unit normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceNormal {
    pub value: u32,
    pub normal: Vec3,
}

/// Face value → outward normal mapping for one die type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationTable {
    faces: Vec<FaceNormal>,
}

impl CalibrationTable {
    /// Build and check a table for `kind`; normals are re-normalised
    pub fn new(kind: DieKind, faces: Vec<FaceNormal>) -> Result<Self, AssetError> {
        let sides = kind.sides();
        if faces.len() != sides as usize {
            return Err(AssetError::FaceCount {
                sides,
                found: faces.len(),
            });
        }

        let mut seen = vec![false; sides as usize + 1];
        let mut checked = Vec::with_capacity(faces.len());
        for face in faces {
            if !kind.is_valid_value(face.value) || seen[face.value as usize] {
                return Err(AssetError::FaceValue {
                    sides,
                    value: face.value,
                });
            }
            seen[face.value as usize] = true;

            let normal = face.normal.try_normalize().ok_or(AssetError::ZeroNormal {
                sides,
                value: face.value,
            })?;
            checked.push(FaceNormal {
                value: face.value,
                normal,
            });
        }

        Ok(Self { faces: checked })
    }

    pub fn faces(&self) -> &[FaceNormal] {
        &self.faces
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Physical and calibration data for one die type
#[derive(Debug, Clone, PartialEq)]
pub struct DieModel {
    pub kind: DieKind,
    pub shape: ColliderShape,
    /// Circumradius in world units
    pub radius: f32,
    pub density: f32,
    pub restitution: f32,
    pub friction: f32,
    /// Hull vertices at unit circumradius
    pub vertices: Vec<Vec3>,
    pub calibration: CalibrationTable,
}

impl DieModel {
    /// Vertices in world units
    pub fn scaled_vertices(&self) -> Vec<Vec3> {
        self.vertices.iter().map(|v| *v * self.radius).collect()
    }

    /// Radius of the sphere enclosing every scaled vertex
    pub fn bounding_radius(&self) -> f32 {
        self.scaled_vertices()
            .iter()
            .map(|v| v.length())
            .fold(0.0_f32, f32::max)
            .max(f32::EPSILON)
    }

    /// Half extents of the axis-aligned box around the scaled vertices
    pub fn half_extents(&self) -> Vec3 {
        self.scaled_vertices()
            .iter()
            .fold(Vec3::ZERO, |acc, v| acc.max(v.abs()))
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ModelDocument {
    #[serde(default)]
    version: u32,
    dice: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ModelEntry {
    sides: u32,
    collider: ColliderShape,
    radius: f32,
    density: f32,
    restitution: f32,
    friction: f32,
    vertices: Vec<[f32; 3]>,
    faces: Vec<FaceEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct FaceEntry {
    value: u32,
    normal: [f32; 3],
}

impl ModelEntry {
    fn into_model(self) -> Result<DieModel, AssetError> {
        let kind = DieKind::from_sides(self.sides).ok_or(AssetError::MissingModel(self.sides))?;
        if self.vertices.is_empty() {
            return Err(AssetError::NoVertices(self.sides));
        }
        let faces = self
            .faces
            .into_iter()
            .map(|f| FaceNormal {
                value: f.value,
                normal: Vec3::from_array(f.normal),
            })
            .collect();

        Ok(DieModel {
            kind,
            shape: self.collider,
            radius: self.radius,
            density: self.density,
            restitution: self.restitution,
            friction: self.friction,
            vertices: self.vertices.into_iter().map(Vec3::from_array).collect(),
            calibration: CalibrationTable::new(kind, faces)?,
        })
    }
}

/// Process-scoped, read-only set of die models
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<DieKind, DieModel>,
}

impl ModelRegistry {
    /// Empty registry (tests build their own)
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard die set shipped with the crate
    pub fn builtin() -> Result<Self, AssetError> {
        Self::from_json(BUILTIN_MODELS)
    }

    /// Parse a model document
    pub fn from_json(json: &str) -> Result<Self, AssetError> {
        let doc: ModelDocument = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for entry in doc.dice {
            registry.insert(entry.into_model()?);
        }
        log::debug!(
            "Model registry v{} loaded ({} die types)",
            doc.version,
            registry.models.len()
        );
        Ok(registry)
    }

    /// Add or replace the model for its die type
    pub fn insert(&mut self, model: DieModel) {
        self.models.insert(model.kind, model);
    }

    pub fn with_model(mut self, model: DieModel) -> Self {
        self.insert(model);
        self
    }

    pub fn get(&self, kind: DieKind) -> Result<&DieModel, AssetError> {
        self.models
            .get(&kind)
            .ok_or(AssetError::MissingModel(kind.sides()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = DieKind> + '_ {
        self.models.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
