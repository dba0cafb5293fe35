//! Die types and the roll request/result records

use serde::{Deserialize, Serialize};

use crate::consts::MAX_DICE;
use crate::error::RollError;

/// Supported die types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DieKind {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
}

impl DieKind {
    pub const ALL: [DieKind; 6] = [
        DieKind::D4,
        DieKind::D6,
        DieKind::D8,
        DieKind::D10,
        DieKind::D12,
        DieKind::D20,
    ];

    pub fn sides(&self) -> u32 {
        match self {
            DieKind::D4 => 4,
            DieKind::D6 => 6,
            DieKind::D8 => 8,
            DieKind::D10 => 10,
            DieKind::D12 => 12,
            DieKind::D20 => 20,
        }
    }

    pub fn from_sides(sides: u32) -> Option<Self> {
        match sides {
            4 => Some(DieKind::D4),
            6 => Some(DieKind::D6),
            8 => Some(DieKind::D8),
            10 => Some(DieKind::D10),
            12 => Some(DieKind::D12),
            20 => Some(DieKind::D20),
            _ => None,
        }
    }

    /// Whether a face value can appear on this die
    pub fn is_valid_value(&self, value: u32) -> bool {
        (1..=self.sides()).contains(&value)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DieKind::D4 => "d4",
            DieKind::D6 => "d6",
            DieKind::D8 => "d8",
            DieKind::D10 => "d10",
            DieKind::D12 => "d12",
            DieKind::D20 => "d20",
        }
    }
}

impl TryFrom<u32> for DieKind {
    type Error = RollError;

    fn try_from(sides: u32) -> Result<Self, Self::Error> {
        DieKind::from_sides(sides).ok_or(RollError::UnsupportedDie(sides))
    }
}

impl From<DieKind> for u32 {
    fn from(kind: DieKind) -> u32 {
        kind.sides()
    }
}

impl std::fmt::Display for DieKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Validate a requested die count
pub fn check_count(count: u32) -> Result<u32, RollError> {
    if count == 0 || count > MAX_DICE {
        return Err(RollError::InvalidCount(count));
    }
    Ok(count)
}

/// Identity of a roll for the reported guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RollKey {
    pub seed: u32,
    pub count: u32,
}

/// Parameters of one roll, shared verbatim with every client in the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollRequest {
    pub seed: u32,
    pub count: u32,
    pub sides: DieKind,
    pub room: String,
    pub origin_instance: String,
    /// Display name of whoever triggered the roll
    #[serde(default)]
    pub triggered_by: String,
}

impl RollRequest {
    pub fn new(
        seed: u32,
        count: u32,
        sides: u32,
        room: impl Into<String>,
        origin_instance: impl Into<String>,
    ) -> Result<Self, RollError> {
        let count = check_count(count)?;
        let sides = DieKind::try_from(sides)?;
        Ok(Self {
            seed,
            count,
            sides,
            room: room.into(),
            origin_instance: origin_instance.into(),
            triggered_by: String::new(),
        })
    }

    pub fn with_triggered_by(mut self, name: impl Into<String>) -> Self {
        self.triggered_by = name.into();
        self
    }

    pub fn key(&self) -> RollKey {
        RollKey {
            seed: self.seed,
            count: self.count,
        }
    }

    /// Same dice thrown the same way (ignores who sent it)
    pub fn same_throw(&self, other: &RollRequest) -> bool {
        self.seed == other.seed && self.count == other.count && self.sides == other.sides
    }
}

/// Settled outcome of a roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    pub seed: u32,
    pub count: u32,
    pub sides: u32,
    /// Face values in die order
    pub values: Vec<u32>,
    pub triggered_by: String,
}

impl RollResult {
    pub fn total(&self) -> u32 {
        self.values.iter().sum()
    }

    /// Compact "2d6: 3 + 5 = 8" summary
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        format!(
            "{}d{}: {} = {}",
            self.count,
            self.sides,
            parts.join(" + "),
            self.total()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_die_kind_round_trip_sides() {
        for kind in DieKind::ALL {
            assert_eq!(DieKind::from_sides(kind.sides()), Some(kind));
        }
        assert_eq!(DieKind::from_sides(7), None);
        assert_eq!(DieKind::from_sides(0), None);
    }

    #[test]
    fn test_valid_value_range() {
        assert!(!DieKind::D8.is_valid_value(0));
        assert!(DieKind::D8.is_valid_value(1));
        assert!(DieKind::D8.is_valid_value(8));
        assert!(!DieKind::D8.is_valid_value(9));
        assert!(DieKind::D10.is_valid_value(10));
    }

    #[test]
    fn test_request_validation() {
        assert!(RollRequest::new(1, 2, 6, "room", "tab").is_ok());
        assert_eq!(
            RollRequest::new(1, 0, 6, "room", "tab"),
            Err(RollError::InvalidCount(0))
        );
        assert_eq!(
            RollRequest::new(1, MAX_DICE + 1, 6, "room", "tab"),
            Err(RollError::InvalidCount(MAX_DICE + 1))
        );
        assert_eq!(
            RollRequest::new(1, 2, 7, "room", "tab"),
            Err(RollError::UnsupportedDie(7))
        );
    }

    #[test]
    fn test_sides_serialize_as_number() {
        let req = RollRequest::new(5, 1, 20, "r", "o").unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["sides"], 20);
        assert_eq!(json["originInstance"], "o");
    }

    #[test]
    fn test_result_summary() {
        let result = RollResult {
            seed: 1,
            count: 2,
            sides: 6,
            values: vec![3, 5],
            triggered_by: "Ada".into(),
        };
        assert_eq!(result.total(), 8);
        assert_eq!(result.summary(), "2d6: 3 + 5 = 8");
    }
}
