//! Platform media layer seam
//!
//! Decoding, mixing and device output belong to the platform. The engine only
//! needs to open a player for a source, drive its transport, and read back
//! its state.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::AudioSource;
use crate::error::PlatformError;

/// Process-wide audio session options applied once by `initialize()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioModeConfig {
    /// Keep the microphone route closed
    pub allows_recording: bool,
    /// Keep playing when the hardware silent switch is on
    pub plays_in_silent_mode: bool,
    /// Keep playing when the app is backgrounded
    pub stays_active_in_background: bool,
    /// Lower other apps' audio while we play
    pub duck_others: bool,
}

impl Default for AudioModeConfig {
    fn default() -> Self {
        Self {
            allows_recording: false,
            plays_in_silent_mode: true,
            stays_active_in_background: true,
            duck_others: true,
        }
    }
}

/// Options a player is created with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerOptions {
    pub volume: f32,
    pub looping: bool,
}

/// What the platform reports about a player right now
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackState {
    pub playing: bool,
    pub position: Duration,
    /// `None` while the platform has not determined the length (streams)
    pub duration: Option<Duration>,
}

/// A single platform audio player.
///
/// Methods take `&self`; implementations handle their own interior state.
#[async_trait]
pub trait PlatformPlayer: Send + Sync {
    async fn play(&self) -> Result<(), PlatformError>;

    async fn pause(&self) -> Result<(), PlatformError>;

    async fn seek(&self, position: Duration) -> Result<(), PlatformError>;

    async fn set_volume(&self, volume: f32) -> Result<(), PlatformError>;

    /// Free the underlying resource. Further calls fail with `Released`.
    async fn release(&self) -> Result<(), PlatformError>;

    /// Read the player's current state without side effects
    fn state(&self) -> Result<PlaybackState, PlatformError>;
}

/// Factory for players plus the process-wide audio session
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn configure_session(&self, mode: &AudioModeConfig) -> Result<(), PlatformError>;

    async fn open(
        &self,
        source: &AudioSource,
        options: PlayerOptions,
    ) -> Result<Box<dyn PlatformPlayer>, PlatformError>;
}
