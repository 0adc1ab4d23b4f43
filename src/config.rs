//! Engine configuration
//!
//! Everything is optional in the JSON form; missing fields take the values
//! the app ships with. Per-layer volumes and the custom chime come from the
//! user's saved preferences and are plain inputs to `load`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::platform::AudioModeConfig;
use crate::engine::AudioSource;
use crate::error::{AudioError, Result};
use crate::layers::Layer;

/// Fade length used when the caller does not give one
const DEFAULT_FADE_MS: u64 = 2000;

/// Token of the chime shipped with the app
const BUNDLED_CHIME: &str = "chime";

/// Saved per-user audio preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioPreferences {
    pub voice_volume: f32,
    pub ambient_volume: f32,
    pub chime_volume: f32,
    /// User-chosen chime replacing the session's own
    pub custom_chime: Option<AudioSource>,
}

impl Default for AudioPreferences {
    fn default() -> Self {
        Self {
            voice_volume: 0.8,
            ambient_volume: 0.4,
            chime_volume: 0.6,
            custom_chime: None,
        }
    }
}

impl AudioPreferences {
    pub fn volume_for(&self, layer: Layer) -> f32 {
        match layer {
            Layer::Voice => self.voice_volume,
            Layer::Ambient => self.ambient_volume,
            Layer::Chime => self.chime_volume,
        }
    }
}

/// Delays used by the session choreography, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimings {
    pub ambient_fade_in_ms: u64,
    /// Gap between the ambient bed reaching full volume and narration starting
    pub voice_delay_ms: u64,
    pub voice_fade_out_ms: u64,
    pub ambient_fade_out_ms: u64,
    /// Wait after the closing fades before everything is unloaded
    pub cleanup_grace_ms: u64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            ambient_fade_in_ms: 3000,
            voice_delay_ms: 5000,
            voice_fade_out_ms: 2000,
            ambient_fade_out_ms: 3000,
            cleanup_grace_ms: 3000,
        }
    }
}

impl SessionTimings {
    /// Scale every delay by `factor` (e.g. 0.01 for a quick dry run)
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |ms: u64| (ms as f64 * factor.max(0.0)).round() as u64;
        Self {
            ambient_fade_in_ms: scale(self.ambient_fade_in_ms),
            voice_delay_ms: scale(self.voice_delay_ms),
            voice_fade_out_ms: scale(self.voice_fade_out_ms),
            ambient_fade_out_ms: scale(self.ambient_fade_out_ms),
            cleanup_grace_ms: scale(self.cleanup_grace_ms),
        }
    }

    pub fn ambient_fade_in(&self) -> Duration {
        Duration::from_millis(self.ambient_fade_in_ms)
    }

    pub fn voice_delay(&self) -> Duration {
        Duration::from_millis(self.voice_delay_ms)
    }

    pub fn voice_fade_out(&self) -> Duration {
        Duration::from_millis(self.voice_fade_out_ms)
    }

    pub fn ambient_fade_out(&self) -> Duration {
        Duration::from_millis(self.ambient_fade_out_ms)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio_mode: AudioModeConfig,
    pub default_fade_ms: u64,
    pub preferences: AudioPreferences,
    /// Fallback when an external chime fails to load
    pub bundled_chime: AudioSource,
    pub timings: SessionTimings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audio_mode: AudioModeConfig::default(),
            default_fade_ms: DEFAULT_FADE_MS,
            preferences: AudioPreferences::default(),
            bundled_chime: AudioSource::bundled(BUNDLED_CHIME),
            timings: SessionTimings::default(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for layer in Layer::ALL {
            let volume = self.preferences.volume_for(layer);
            if !(0.0..=1.0).contains(&volume) {
                return Err(AudioError::ConfigInvalid {
                    reason: format!("{}_volume must be within 0.0..=1.0, got {}", layer, volume),
                });
            }
        }
        if self.default_fade_ms == 0 {
            return Err(AudioError::ConfigInvalid {
                reason: "default_fade_ms must be greater than zero".to_string(),
            });
        }
        if self.bundled_chime.is_external() {
            return Err(AudioError::ConfigInvalid {
                reason: format!("bundled_chime must be an asset, got {}", self.bundled_chime),
            });
        }
        Ok(())
    }

    pub fn default_fade(&self) -> Duration {
        Duration::from_millis(self.default_fade_ms)
    }

    /// Bundled source to retry with when an external source fails on `layer`
    pub fn bundled_default(&self, layer: Layer) -> Option<&AudioSource> {
        match layer {
            Layer::Chime => Some(&self.bundled_chime),
            Layer::Voice | Layer::Ambient => None,
        }
    }
}
