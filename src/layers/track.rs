//! Track handles
//!
//! A `TrackHandle` exclusively owns one platform player bound to a layer.
//! Volume is cached on the handle (the platform has no getter for it);
//! playing state and position are always read from the player.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::platform::{PlatformPlayer, PlayerOptions};
use crate::engine::AudioSource;
use crate::error::PlatformError;
use crate::layers::Layer;

/// Clamp a requested volume into [0, 1]. NaN maps to silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Read-only snapshot of a loaded layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackStatus {
    pub layer: Layer,
    pub source: AudioSource,
    pub playing: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub volume: f32,
    pub is_looping: bool,
    pub loaded_at: DateTime<Utc>,
}

/// Live binding of a layer to a loaded, playable source
pub struct TrackHandle {
    id: Uuid,
    layer: Layer,
    source: AudioSource,
    player: Box<dyn PlatformPlayer>,
    /// f32 bits
    volume: AtomicU32,
    looping: bool,
    loaded_at: DateTime<Utc>,
}

impl TrackHandle {
    pub fn new(
        layer: Layer,
        source: AudioSource,
        player: Box<dyn PlatformPlayer>,
        options: PlayerOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            layer,
            source,
            player,
            volume: AtomicU32::new(clamp_volume(options.volume).to_bits()),
            looping: options.looping,
            loaded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Acquire))
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Whether the platform reports the player as playing.
    /// A player that cannot be queried counts as not playing.
    pub fn is_playing(&self) -> bool {
        self.player.state().map(|s| s.playing).unwrap_or(false)
    }

    /// Start playback. Does nothing if already playing.
    pub async fn play(&self) -> Result<(), PlatformError> {
        if self.player.state()?.playing {
            return Ok(());
        }
        self.player.play().await
    }

    /// Pause, keeping the position
    pub async fn pause(&self) -> Result<(), PlatformError> {
        self.player.pause().await
    }

    /// Pause and rewind to the start
    pub async fn stop(&self) -> Result<(), PlatformError> {
        self.player.pause().await?;
        self.player.seek(Duration::ZERO).await
    }

    /// Apply a volume (clamped). The cached value only changes if the
    /// platform accepted it.
    pub async fn set_volume(&self, volume: f32) -> Result<(), PlatformError> {
        let volume = clamp_volume(volume);
        self.player.set_volume(volume).await?;
        self.volume.store(volume.to_bits(), Ordering::Release);
        Ok(())
    }

    /// Free the platform player
    pub async fn release(&self) -> Result<(), PlatformError> {
        self.player.release().await
    }

    pub fn status(&self) -> Result<TrackStatus, PlatformError> {
        let state = self.player.state()?;
        Ok(TrackStatus {
            layer: self.layer,
            source: self.source.clone(),
            playing: state.playing,
            position: state.position,
            duration: state.duration,
            volume: self.volume(),
            is_looping: self.looping,
            loaded_at: self.loaded_at,
        })
    }
}

impl std::fmt::Debug for TrackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackHandle")
            .field("id", &self.id)
            .field("layer", &self.layer)
            .field("source", &self.source)
            .field("volume", &self.volume())
            .field("looping", &self.looping)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::platform::AudioBackend;
    use crate::engine::simulated::SimulatedBackend;
    use approx::assert_relative_eq;

    async fn open_handle(backend: &SimulatedBackend, layer: Layer, volume: f32) -> TrackHandle {
        let source = AudioSource::bundled("bell");
        let options = PlayerOptions {
            volume,
            looping: layer.loops(),
        };
        let player = backend.open(&source, options).await.unwrap();
        TrackHandle::new(layer, source, player, options)
    }

    #[test]
    fn test_clamp_volume() {
        assert_eq!(clamp_volume(-0.5), 0.0);
        assert_eq!(clamp_volume(1.5), 1.0);
        assert_eq!(clamp_volume(f32::NAN), 0.0);
        assert_relative_eq!(clamp_volume(0.25), 0.25);
    }

    #[tokio::test]
    async fn test_play_is_idempotent() {
        let backend = SimulatedBackend::new();
        let handle = open_handle(&backend, Layer::Chime, 0.6).await;

        handle.play().await.unwrap();
        handle.play().await.unwrap();

        let probe = backend.probe(handle.source()).unwrap();
        assert_eq!(probe.play_calls(), 1);
        assert!(handle.is_playing());
    }

    #[tokio::test]
    async fn test_stop_rewinds() {
        let backend = SimulatedBackend::new();
        let handle = open_handle(&backend, Layer::Voice, 0.8).await;

        handle.play().await.unwrap();
        handle.stop().await.unwrap();

        let status = handle.status().unwrap();
        assert!(!status.playing);
        assert_eq!(status.position, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_set_volume_clamps_and_caches() {
        let backend = SimulatedBackend::new();
        let handle = open_handle(&backend, Layer::Ambient, 0.4).await;
        assert_relative_eq!(handle.volume(), 0.4);

        handle.set_volume(3.0).await.unwrap();
        assert_relative_eq!(handle.volume(), 1.0);
        assert!(handle.status().unwrap().is_looping);
    }

    #[tokio::test]
    async fn test_released_player_reports_errors() {
        let backend = SimulatedBackend::new();
        let handle = open_handle(&backend, Layer::Voice, 0.8).await;

        handle.release().await.unwrap();
        assert_eq!(handle.play().await, Err(PlatformError::Released));
        assert!(handle.status().is_err());
        assert!(!handle.is_playing());
    }
}
