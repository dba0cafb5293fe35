//! Recent roll results
//!
//! Persisted per room to LocalStorage, newest first, capped at 20 entries.

use serde::{Deserialize, Serialize};

use crate::platform;
use crate::sim::RollResult;

/// Maximum number of results to keep
pub const MAX_HISTORY: usize = 20;

/// A single logged roll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub result: RollResult,
    /// Unix timestamp (ms) when it settled
    pub timestamp: f64,
}

/// Dice log for one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RollHistory {
    pub entries: Vec<HistoryEntry>,
}

impl RollHistory {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn storage_key(room: &str) -> String {
        format!("dice_tray_history:{room}")
    }

    /// Add a settled result at the front
    pub fn record(&mut self, result: RollResult, timestamp: f64) {
        self.entries.insert(0, HistoryEntry { result, timestamp });
        self.entries.truncate(MAX_HISTORY);
    }

    pub fn latest(&self) -> Option<&RollResult> {
        self.entries.first().map(|e| &e.result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Load a room's history (empty natively)
    pub fn load(room: &str) -> Self {
        if let Some(json) = platform::storage_get(&Self::storage_key(room)) {
            if let Ok(mut history) = serde_json::from_str::<RollHistory>(&json) {
                history.entries.truncate(MAX_HISTORY);
                log::info!("Loaded {} logged rolls for room {room}", history.len());
                return history;
            }
        }
        Self::new()
    }

    pub fn save(&self, room: &str) {
        if let Ok(json) = serde_json::to_string(self) {
            if platform::storage_set(&Self::storage_key(room), &json) {
                log::debug!("Roll history saved ({} entries)", self.entries.len());
            }
        }
    }
}
