//! Dice meshes and per-frame vertex building
//!
//! Meshes are triangulated once from the registry's hull vertices. Each frame
//! the visible (upward-facing) triangles are transformed on the CPU, shaded by
//! face normal and sorted low-to-high so higher dice paint over lower ones.

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};

use crate::consts::{ARENA_HALF_X, ARENA_HALF_Y};
use crate::sim::{DieKind, DieVisual, ModelRegistry};

/// 2D vertex in arena units with a color
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub const fn new(x: f32, y: f32, color: [f32; 4]) -> Self {
        Self {
            position: [x, y],
            color,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Colors for scene elements
pub mod colors {
    pub const FLOOR: [f32; 4] = [0.10, 0.22, 0.14, 1.0];
    pub const BACKGROUND: [f32; 4] = [0.04, 0.05, 0.06, 1.0];
    pub const D4: [f32; 4] = [0.90, 0.35, 0.30, 1.0];
    pub const D6: [f32; 4] = [0.95, 0.93, 0.88, 1.0];
    pub const D8: [f32; 4] = [0.35, 0.60, 0.95, 1.0];
    pub const D10: [f32; 4] = [0.95, 0.75, 0.25, 1.0];
    pub const D12: [f32; 4] = [0.60, 0.40, 0.90, 1.0];
    pub const D20: [f32; 4] = [0.30, 0.85, 0.60, 1.0];
}

pub fn die_color(kind: DieKind) -> [f32; 4] {
    match kind {
        DieKind::D4 => colors::D4,
        DieKind::D6 => colors::D6,
        DieKind::D8 => colors::D8,
        DieKind::D10 => colors::D10,
        DieKind::D12 => colors::D12,
        DieKind::D20 => colors::D20,
    }
}

/// Light direction for flat shading (mostly overhead)
const LIGHT_DIR: Vec3 = Vec3::new(-0.3, 0.4, 0.866);
const AMBIENT: f32 = 0.35;

/// One hull triangle in die-local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub corners: [Vec3; 3],
    /// Outward unit normal
    pub normal: Vec3,
}

/// Triangulate the convex hull of a small point set
///
/// Brute force over every triple; fine for the handful of vertices a die has.
/// Coplanar faces with more than three corners yield overlapping triangles,
/// which is harmless for flat shading.
pub fn hull_faces(points: &[Vec3]) -> Vec<Triangle> {
    const EPS: f32 = 1e-4;
    let mut faces = Vec::new();
    let n = points.len();

    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let (a, b, c) = (points[i], points[j], points[k]);
                let cross = (b - a).cross(c - a);
                if cross.length_squared() < EPS * EPS {
                    continue;
                }
                let normal = cross.normalize();

                let mut above = false;
                let mut below = false;
                for (m, p) in points.iter().enumerate() {
                    if m == i || m == j || m == k {
                        continue;
                    }
                    let d = (*p - a).dot(normal);
                    above |= d > EPS;
                    below |= d < -EPS;
                }

                match (above, below) {
                    (false, false) | (true, true) => {}
                    (false, true) => faces.push(Triangle {
                        corners: [a, b, c],
                        normal,
                    }),
                    (true, false) => faces.push(Triangle {
                        corners: [a, c, b],
                        normal: -normal,
                    }),
                }
            }
        }
    }
    faces
}

/// Triangulated mesh per die type
#[derive(Debug, Clone, Default)]
pub struct MeshSet {
    meshes: BTreeMap<DieKind, Vec<Triangle>>,
}

impl MeshSet {
    pub fn from_registry(registry: &ModelRegistry) -> Self {
        let mut meshes = BTreeMap::new();
        for kind in registry.kinds() {
            if let Ok(model) = registry.get(kind) {
                let faces = hull_faces(&model.scaled_vertices());
                if faces.is_empty() {
                    log::warn!("{kind} mesh has no faces; it will not be drawn");
                }
                meshes.insert(kind, faces);
            }
        }
        Self { meshes }
    }

    pub fn get(&self, kind: DieKind) -> Option<&[Triangle]> {
        self.meshes.get(&kind).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Vertices (arena units) for the floor and every die, in paint order
    pub fn build_frame(&self, dice: &[DieVisual]) -> Vec<Vertex> {
        let mut vertices = floor_quad();
        let light = LIGHT_DIR.normalize();

        // (height, corners, color)
        let mut tris: Vec<(f32, [Vec3; 3], [f32; 4])> = Vec::new();
        for die in dice {
            let Some(mesh) = self.get(die.kind) else {
                continue;
            };
            let base = die_color(die.kind);
            for tri in mesh {
                let normal = die.rotation * tri.normal;
                // Top-down camera: faces pointing away from +Z are hidden
                if normal.z <= 0.0 {
                    continue;
                }
                let corners = transform(tri.corners, die.rotation, die.position);
                let height = (corners[0].z + corners[1].z + corners[2].z) / 3.0;
                let shade = AMBIENT + (1.0 - AMBIENT) * normal.dot(light).max(0.0);
                tris.push((height, corners, shaded(base, shade)));
            }
        }

        tris.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, corners, color) in tris {
            for c in corners {
                vertices.push(Vertex::new(c.x, c.y, color));
            }
        }
        vertices
    }
}

fn transform(corners: [Vec3; 3], rotation: Quat, position: Vec3) -> [Vec3; 3] {
    corners.map(|c| rotation * c + position)
}

fn shaded(color: [f32; 4], shade: f32) -> [f32; 4] {
    [color[0] * shade, color[1] * shade, color[2] * shade, color[3]]
}

fn floor_quad() -> Vec<Vertex> {
    let (x, y) = (ARENA_HALF_X, ARENA_HALF_Y);
    let c = colors::FLOOR;
    vec![
        Vertex::new(-x, -y, c),
        Vertex::new(x, -y, c),
        Vertex::new(x, y, c),
        Vertex::new(-x, -y, c),
        Vertex::new(x, y, c),
        Vertex::new(-x, y, c),
    ]
}
