//! Viewer configuration.

use crate::loader::AssetPath;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("clip list is empty")]
    EmptyClipList,
    #[error("base clip {0:?} is not in the clip list")]
    BaseNotListed(String),
    #[error("{name} must be a finite, non-negative duration (got {value})")]
    BadDuration { name: &'static str, value: f32 },
    #[error("invalid config JSON: {0}")]
    Json(String),
}

/// Clips, asset location and fade timings for one viewer session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Clip loaded before playback starts
    pub base_clip: String,
    /// Selectable clips, in key / "next" order
    pub clips: Vec<String>,
    pub asset_path: AssetPath,
    /// Seconds to blend between clips on a switch
    pub cross_fade_duration: f32,
    /// Seconds to fade in the base clip
    pub base_fade_in: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_clip: "Capoeira".to_string(),
            clips: [
                "Capoeira",
                "Dying",
                "Hip Hop Dancing",
                "Jumping Down",
                "Praying",
                "Reaction",
                "Rumba Dancing",
                "Sitting Clap",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            asset_path: AssetPath::default(),
            cross_fade_duration: 0.25,
            base_fade_in: 0.2,
        }
    }
}

impl ViewerConfig {
    /// Parse and validate; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clips.is_empty() {
            return Err(ConfigError::EmptyClipList);
        }
        if !self.clips.contains(&self.base_clip) {
            return Err(ConfigError::BaseNotListed(self.base_clip.clone()));
        }
        for (name, value) in [
            ("cross_fade_duration", self.cross_fade_duration),
            ("base_fade_in", self.base_fade_in),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::BadDuration { name, value });
            }
        }
        Ok(())
    }

    /// Every listed clip except the base, in list order
    pub fn preload_clips(&self) -> Vec<String> {
        self.clips
            .iter()
            .filter(|c| **c != self.base_clip)
            .cloned()
            .collect()
    }
}
