//! Playback Lifecycle
//!
//! Acquires and releases platform players and drives basic transport on a
//! layer. Every operation degrades gracefully: a missing layer is a logged
//! no-op and a platform failure is logged and swallowed, so one broken layer
//! never holds up the others.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::fade::FadeTracker;
use crate::engine::platform::{AudioBackend, PlayerOptions};
use crate::engine::AudioSource;
use crate::error::{AudioError, PlatformError, Result};
use crate::layers::{clamp_volume, Layer, LayerRegistry, TrackHandle, TrackStatus};

pub struct PlaybackLifecycle {
    backend: Arc<dyn AudioBackend>,
    registry: LayerRegistry,
    fades: FadeTracker,
    /// Serializes load/unload on one layer (get-then-set on the registry)
    layer_locks: [tokio::sync::Mutex<()>; 3],
}

impl PlaybackLifecycle {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            registry: LayerRegistry::new(),
            fades: FadeTracker::default(),
            layer_locks: Default::default(),
        }
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub(crate) fn fades(&self) -> &FadeTracker {
        &self.fades
    }

    pub(crate) fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    /// Load `source` onto `layer` at `volume`.
    ///
    /// Any track already on the layer is released first, so if opening the
    /// new source fails the layer ends up empty. Loop policy comes from the
    /// layer.
    pub async fn load(&self, layer: Layer, source: &AudioSource, volume: f32) -> Result<()> {
        let _guard = self.layer_locks[layer.index()].lock().await;
        self.fades.cancel(layer);
        self.release(layer).await;

        let options = PlayerOptions {
            volume: clamp_volume(volume),
            looping: layer.loops(),
        };
        let player = self
            .backend
            .open(source, options)
            .await
            .map_err(|source_err| AudioError::LoadFailure {
                layer,
                source_str: source.to_string(),
                source: source_err,
            })?;

        let handle = Arc::new(TrackHandle::new(layer, source.clone(), player, options));
        self.registry.set(layer, handle);
        info!(
            layer = %layer,
            source = %source,
            volume = options.volume,
            looping = options.looping,
            "Track loaded"
        );
        Ok(())
    }

    /// Cancel the layer's fade, release its player, and clear the entry.
    ///
    /// Returns false if nothing was loaded.
    pub async fn unload(&self, layer: Layer) -> bool {
        let _guard = self.layer_locks[layer.index()].lock().await;
        self.fades.cancel(layer);
        self.release(layer).await
    }

    async fn release(&self, layer: Layer) -> bool {
        let Some(handle) = self.registry.remove(layer) else {
            return false;
        };
        // The entry is gone either way; a failed release must not pin the layer.
        if let Err(source) = handle.release().await {
            AudioError::TransportFailure {
                layer,
                action: "unload",
                source,
            }
            .report();
        }
        debug!(layer = %layer, "Track unloaded");
        true
    }

    pub async fn play(&self, layer: Layer) {
        self.transport(layer, "play", |h| async move { h.play().await })
            .await
    }

    pub async fn pause(&self, layer: Layer) {
        self.transport(layer, "pause", |h| async move { h.pause().await })
            .await
    }

    /// Pause and rewind to the start
    pub async fn stop(&self, layer: Layer) {
        self.transport(layer, "stop", |h| async move { h.stop().await })
            .await
    }

    /// Apply a volume directly, clamped to [0, 1]
    pub async fn set_volume(&self, layer: Layer, volume: f32) {
        self.transport(layer, "set_volume", move |h| async move {
            h.set_volume(volume).await
        })
        .await
    }

    pub fn status(&self, layer: Layer) -> Option<TrackStatus> {
        let handle = self.registry.get(layer)?;
        match handle.status() {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(layer = %layer, error = %e, "Could not read track status");
                None
            }
        }
    }

    async fn transport<F, Fut>(&self, layer: Layer, action: &'static str, call: F)
    where
        F: FnOnce(Arc<TrackHandle>) -> Fut,
        Fut: Future<Output = std::result::Result<(), PlatformError>>,
    {
        let Some(handle) = self.registry.get(layer) else {
            warn!(layer = %layer, action, "No track loaded");
            return;
        };
        if let Err(source) = call(handle).await {
            AudioError::TransportFailure {
                layer,
                action,
                source,
            }
            .report();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::simulated::{SimCall, SimulatedBackend};
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn lifecycle() -> (SimulatedBackend, PlaybackLifecycle) {
        let backend = SimulatedBackend::new();
        let lifecycle = PlaybackLifecycle::new(Arc::new(backend.clone()));
        (backend, lifecycle)
    }

    #[tokio::test]
    async fn test_load_applies_layer_loop_policy() {
        let (backend, lifecycle) = lifecycle();
        let ocean = AudioSource::bundled("ocean");
        let bell = AudioSource::bundled("bell");

        lifecycle.load(Layer::Ambient, &ocean, 0.4).await.unwrap();
        lifecycle.load(Layer::Chime, &bell, 0.6).await.unwrap();

        assert!(backend.probe(&ocean).unwrap().is_looping());
        assert!(!backend.probe(&bell).unwrap().is_looping());
        assert!(lifecycle.status(Layer::Ambient).unwrap().is_looping);
    }

    #[tokio::test]
    async fn test_load_releases_previous_track() {
        let (backend, lifecycle) = lifecycle();
        let first = AudioSource::bundled("rain");
        let second = AudioSource::bundled("forest");

        lifecycle.load(Layer::Ambient, &first, 0.4).await.unwrap();
        lifecycle.load(Layer::Ambient, &second, 0.4).await.unwrap();

        assert!(backend.probe(&first).unwrap().is_released());
        assert!(!backend.probe(&second).unwrap().is_released());
        assert_eq!(lifecycle.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_layer_empty() {
        let (backend, lifecycle) = lifecycle();
        backend.fail_source("file:///missing.wav");
        let good = AudioSource::bundled("intro");
        let missing = AudioSource::parse("file:///missing.wav").unwrap();

        lifecycle.load(Layer::Voice, &good, 0.8).await.unwrap();
        let err = lifecycle.load(Layer::Voice, &missing, 0.8).await.unwrap_err();

        assert_eq!(err.error_code(), "LOAD_FAILURE");
        assert_eq!(err.layer(), Some(Layer::Voice));
        assert!(lifecycle.status(Layer::Voice).is_none());
        assert!(backend.probe(&good).unwrap().is_released());
    }

    #[tokio::test]
    async fn test_load_clamps_volume() {
        let (_backend, lifecycle) = lifecycle();
        lifecycle
            .load(Layer::Chime, &AudioSource::bundled("bell"), 1.7)
            .await
            .unwrap();
        assert_relative_eq!(lifecycle.status(Layer::Chime).unwrap().volume, 1.0);
    }

    #[tokio::test]
    async fn test_unload_is_idempotent() {
        let (backend, lifecycle) = lifecycle();
        let source = AudioSource::bundled("intro");
        lifecycle.load(Layer::Voice, &source, 0.8).await.unwrap();

        assert!(lifecycle.unload(Layer::Voice).await);
        assert!(!lifecycle.unload(Layer::Voice).await);
        assert!(backend.probe(&source).unwrap().is_released());
    }

    #[tokio::test]
    async fn test_failed_release_still_clears_entry() {
        let (backend, lifecycle) = lifecycle();
        backend.fail_call("asset:intro", SimCall::Release);
        lifecycle
            .load(Layer::Voice, &AudioSource::bundled("intro"), 0.8)
            .await
            .unwrap();

        assert!(lifecycle.unload(Layer::Voice).await);
        assert!(!lifecycle.registry().contains(Layer::Voice));
    }

    #[tokio::test]
    async fn test_transport_on_empty_layer_is_noop() {
        let (_backend, lifecycle) = lifecycle();
        lifecycle.play(Layer::Voice).await;
        lifecycle.pause(Layer::Voice).await;
        lifecycle.stop(Layer::Voice).await;
        lifecycle.set_volume(Layer::Voice, 0.5).await;
        assert!(lifecycle.status(Layer::Voice).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_keeps_position_stop_rewinds() {
        let (_backend, lifecycle) = lifecycle();
        lifecycle
            .load(Layer::Voice, &AudioSource::bundled("intro"), 0.8)
            .await
            .unwrap();

        lifecycle.play(Layer::Voice).await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        lifecycle.pause(Layer::Voice).await;

        let paused = lifecycle.status(Layer::Voice).unwrap();
        assert!(!paused.playing);
        assert_eq!(paused.position, Duration::from_secs(4));

        lifecycle.play(Layer::Voice).await;
        lifecycle.stop(Layer::Voice).await;
        let stopped = lifecycle.status(Layer::Voice).unwrap();
        assert!(!stopped.playing);
        assert_eq!(stopped.position, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_transport_failure_is_contained() {
        let (backend, lifecycle) = lifecycle();
        backend.fail_call("asset:ocean", SimCall::Play);
        let ocean = AudioSource::bundled("ocean");
        let intro = AudioSource::bundled("intro");
        lifecycle.load(Layer::Ambient, &ocean, 0.4).await.unwrap();
        lifecycle.load(Layer::Voice, &intro, 0.8).await.unwrap();

        lifecycle.play(Layer::Ambient).await;
        lifecycle.play(Layer::Voice).await;

        assert!(!backend.probe(&ocean).unwrap().is_playing());
        assert!(backend.probe(&intro).unwrap().is_playing());
        assert!(lifecycle.registry().contains(Layer::Ambient));
    }

    #[tokio::test]
    async fn test_set_volume_clamps() {
        let (backend, lifecycle) = lifecycle();
        let source = AudioSource::bundled("ocean");
        lifecycle.load(Layer::Ambient, &source, 0.4).await.unwrap();

        lifecycle.set_volume(Layer::Ambient, -2.0).await;
        assert_eq!(backend.probe(&source).unwrap().volume(), 0.0);
        assert_eq!(lifecycle.status(Layer::Ambient).unwrap().volume, 0.0);
    }
}
