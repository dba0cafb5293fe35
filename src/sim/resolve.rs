//! Face resolution
//!
//! A settled die reads the calibrated face whose rotated normal is most
//! aligned with world up. Maximum alignment rather than exact contact keeps the
//! read stable when a die comes to rest slightly cocked.

use glam::{Quat, Vec3};

use super::dice::DieKind;
use super::registry::{CalibrationTable, ModelRegistry};
use crate::error::AssetError;

/// World up axis
pub const UP: Vec3 = Vec3::Z;

/// Resolved face plus how squarely it points up (1.0 = flat)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceReading {
    pub value: u32,
    pub alignment: f32,
}

/// Pick the face whose rotated normal best matches `UP`
///
/// Ties keep the earlier table entry so every client reads the same value.
pub fn read_face(table: &CalibrationTable, orientation: Quat) -> Option<FaceReading> {
    let mut best: Option<FaceReading> = None;
    for face in table.faces() {
        let alignment = (orientation * face.normal).dot(UP);
        if best.is_none_or(|b| alignment > b.alignment) {
            best = Some(FaceReading {
                value: face.value,
                alignment,
            });
        }
    }
    best
}

/// Resolve one value per die, in die order
pub fn resolve_values(
    registry: &ModelRegistry,
    dice: impl IntoIterator<Item = (DieKind, Quat)>,
) -> Result<Vec<u32>, AssetError> {
    dice.into_iter()
        .map(|(kind, orientation)| {
            let model = registry.get(kind)?;
            let reading = read_face(&model.calibration, orientation.normalize())
                .ok_or(AssetError::FaceCount {
                    sides: kind.sides(),
                    found: 0,
                })?;
            if reading.alignment < 0.5 {
                log::debug!(
                    "{kind} resting cocked (alignment {:.2}), reading {}",
                    reading.alignment,
                    reading.value
                );
            }
            Ok(reading.value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn registry() -> ModelRegistry {
        ModelRegistry::builtin().unwrap()
    }

    #[test]
    fn test_identity_d6_reads_top_face() {
        let reg = registry();
        let table = &reg.get(DieKind::D6).unwrap().calibration;
        let reading = read_face(table, Quat::IDENTITY).unwrap();
        assert_eq!(reading.value, 1);
        assert!((reading.alignment - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_quarter_turn_d6() {
        let reg = registry();
        let table = &reg.get(DieKind::D6).unwrap().calibration;
        // +Y rotated about X by +90° points at +Z
        let reading = read_face(table, Quat::from_rotation_x(FRAC_PI_2)).unwrap();
        assert_eq!(reading.value, 2);
        // Upside down shows the opposite face
        let reading = read_face(table, Quat::from_rotation_x(std::f32::consts::PI)).unwrap();
        assert_eq!(reading.value, 6);
    }

    #[test]
    fn test_every_face_resolves_when_turned_up() {
        let reg = registry();
        for kind in DieKind::ALL {
            let table = &reg.get(kind).unwrap().calibration;
            for face in table.faces() {
                let orientation = Quat::from_rotation_arc(face.normal, UP);
                let reading = read_face(table, orientation).unwrap();
                assert_eq!(reading.value, face.value, "{kind}");
            }
        }
    }

    #[test]
    fn test_slight_tilt_keeps_reading() {
        let reg = registry();
        let table = &reg.get(DieKind::D20).unwrap().calibration;
        for face in table.faces() {
            let tilt = Quat::from_rotation_y(0.08) * Quat::from_rotation_x(-0.05);
            let orientation = tilt * Quat::from_rotation_arc(face.normal, UP);
            assert_eq!(read_face(table, orientation).unwrap().value, face.value);
        }
    }

    #[test]
    fn test_resolve_values_in_range_for_arbitrary_orientations() {
        let reg = registry();
        let mut angle = 0.0_f32;
        for kind in DieKind::ALL {
            let dice: Vec<(DieKind, Quat)> = (0..25)
                .map(|_| {
                    angle += 0.731;
                    let axis = Vec3::new(angle.sin(), angle.cos(), 0.3).normalize();
                    (kind, Quat::from_axis_angle(axis, angle))
                })
                .collect();
            let values = resolve_values(&reg, dice).unwrap();
            assert_eq!(values.len(), 25);
            assert!(values.iter().all(|v| kind.is_valid_value(*v)));
        }
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let empty = ModelRegistry::new();
        assert!(resolve_values(&empty, [(DieKind::D6, Quat::IDENTITY)]).is_err());
    }
}
