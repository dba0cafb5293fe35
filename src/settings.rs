//! User preferences
//!
//! Persisted separately from roll history in LocalStorage. Nothing here may
//! influence a roll's outcome: every client in a room must simulate a roll
//! message identically, so the simulation tuning lives in [`crate::consts`].

use serde::{Deserialize, Serialize};

use crate::platform;

/// Per-user preferences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Name attached to locally triggered rolls
    pub display_name: String,
}

impl EngineSettings {
    /// LocalStorage key
    const STORAGE_KEY: &'static str = "dice_tray_settings";

    /// Normalise user input
    pub fn validated(mut self) -> Self {
        self.display_name = self.display_name.trim().to_string();
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self.validated()
    }

    /// Load settings (LocalStorage on web, defaults natively)
    pub fn load() -> Self {
        if let Some(json) = platform::storage_get(Self::STORAGE_KEY) {
            match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from LocalStorage");
                    return settings;
                }
                Err(e) => log::warn!("Ignoring stored settings: {e}"),
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Parse a stored document; fields from older versions are ignored
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::validated)
    }

    pub fn save(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            if platform::storage_set(Self::STORAGE_KEY, &json) {
                log::info!("Settings saved");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_trims_name() {
        let s = EngineSettings::default().with_display_name("  Ada ");
        assert_eq!(s.display_name, "Ada");
        assert_eq!(s.clone().validated(), s);
    }

    #[test]
    fn test_simulation_fields_in_storage_are_ignored() {
        let stored = r#"{"min_roll_ms":400,"max_roll_ms":400,"rest_speed":1.0,"substeps":3,"display_name":"Bo"}"#;
        let s = EngineSettings::from_json(stored).unwrap();
        assert_eq!(s, EngineSettings::default().with_display_name("Bo"));
        assert_eq!(serde_json::to_string(&s).unwrap(), r#"{"display_name":"Bo"}"#);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(EngineSettings::from_json("{}").unwrap(), EngineSettings::default());
        assert!(EngineSettings::from_json("[1,").is_err());
    }

    #[test]
    fn test_load_native_is_default() {
        assert_eq!(EngineSettings::load(), EngineSettings::default());
    }
}
