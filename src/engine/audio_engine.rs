//! Audio Engine
//!
//! The public surface: per-layer transport and fades plus session-wide
//! operations. An engine is constructed explicitly and owned by whatever runs
//! the meditation session; there is no global instance.
//!
//! No method here returns an error that should end a session. Failures are
//! logged where they are caught and reported back as plain values.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::fade::{FadeController, FadeDirection, FadeOutcome};
use crate::engine::lifecycle::PlaybackLifecycle;
use crate::engine::platform::AudioBackend;
use crate::engine::AudioSource;
use crate::error::{AudioError, Result};
use crate::layers::{Layer, TrackStatus};

/// What a load call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// The requested source failed; the bundled default was loaded instead
    LoadedFallback,
    /// The source string was not a recognized form; nothing was attempted
    Unsupported,
    /// Nothing could be loaded; the layer is empty
    Failed,
}

impl LoadOutcome {
    pub fn is_loaded(self) -> bool {
        matches!(self, LoadOutcome::Loaded | LoadOutcome::LoadedFallback)
    }
}

/// Process-level audio session bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSession {
    pub initialized: bool,
    pub configured_at: Option<DateTime<Utc>>,
    /// How many times the platform session has been configured
    pub configure_count: u32,
}

pub struct AudioEngine {
    config: EngineConfig,
    lifecycle: Arc<PlaybackLifecycle>,
    fades: FadeController,
    session: tokio::sync::Mutex<EngineSession>,
}

impl AudioEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, config: EngineConfig) -> Self {
        let lifecycle = Arc::new(PlaybackLifecycle::new(backend));
        Self {
            config,
            fades: FadeController::new(lifecycle.clone()),
            lifecycle,
            session: tokio::sync::Mutex::new(EngineSession::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Configure the platform audio session.
    ///
    /// Runs at most once until `cleanup()` re-arms it. A failure leaves the
    /// engine uninitialized so the next call retries.
    pub async fn initialize(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.initialized {
            return Ok(());
        }
        self.lifecycle
            .backend()
            .configure_session(&self.config.audio_mode)
            .await
            .map_err(AudioError::SessionConfig)?;

        session.initialized = true;
        session.configured_at = Some(Utc::now());
        session.configure_count += 1;
        info!(mode = ?self.config.audio_mode, "Audio session configured");
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.session.lock().await.initialized
    }

    pub async fn session(&self) -> EngineSession {
        *self.session.lock().await
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load `source` onto `layer`.
    ///
    /// If an external source fails and the layer has a bundled default, that
    /// default is tried once before giving up on the layer. This applies to
    /// any remote or local-file chime, whether it came from the user's
    /// preferences or from the caller.
    pub async fn load(&self, layer: Layer, source: AudioSource, volume: f32) -> LoadOutcome {
        if let Err(e) = self.initialize().await {
            // Playback may still work on the platform's default session.
            e.report();
        }

        let err = match self.lifecycle.load(layer, &source, volume).await {
            Ok(()) => return LoadOutcome::Loaded,
            Err(err) => err,
        };
        err.report();

        let fallback = match self.config.bundled_default(layer) {
            Some(fallback) if source.is_external() && *fallback != source => fallback,
            _ => return LoadOutcome::Failed,
        };
        warn!(layer = %layer, fallback = %fallback, "Retrying with bundled default");
        match self.lifecycle.load(layer, fallback, volume).await {
            Ok(()) => LoadOutcome::LoadedFallback,
            Err(err) => {
                err.report();
                LoadOutcome::Failed
            }
        }
    }

    /// Parse `source` and load it. Unrecognized strings are logged and skipped.
    pub async fn load_uri(&self, layer: Layer, source: &str, volume: f32) -> LoadOutcome {
        match AudioSource::parse(source) {
            Ok(source) => self.load(layer, source, volume).await,
            Err(err) => {
                err.report();
                LoadOutcome::Unsupported
            }
        }
    }

    /// Load using the volume saved in the user's preferences.
    ///
    /// For the chime layer a user's custom chime takes the place of `source`.
    pub async fn load_with_preferences(&self, layer: Layer, source: AudioSource) -> LoadOutcome {
        let prefs = &self.config.preferences;
        let source = match (&prefs.custom_chime, layer) {
            (Some(custom), Layer::Chime) => custom.clone(),
            _ => source,
        };
        self.load(layer, source, prefs.volume_for(layer)).await
    }

    /// Cancel the layer's fade and release its track. No-op if unloaded.
    pub async fn unload(&self, layer: Layer) -> bool {
        self.lifecycle.unload(layer).await
    }

    // ========================================================================
    // Per-layer transport
    // ========================================================================

    pub async fn play(&self, layer: Layer) {
        self.lifecycle.play(layer).await
    }

    pub async fn pause(&self, layer: Layer) {
        self.lifecycle.pause(layer).await
    }

    /// Cancel the layer's fade, then pause and rewind
    pub async fn stop(&self, layer: Layer) {
        if self.fades.cancel(layer) {
            debug!(layer = %layer, "Cancelled fade before stop");
        }
        self.lifecycle.stop(layer).await
    }

    pub async fn set_volume(&self, layer: Layer, volume: f32) {
        self.lifecycle.set_volume(layer, volume).await
    }

    // ========================================================================
    // Fades
    // ========================================================================

    pub async fn fade_in(&self, layer: Layer, duration: Duration, target: f32) -> FadeOutcome {
        self.fades.fade_in(layer, duration, target).await
    }

    pub async fn fade_out(&self, layer: Layer, duration: Duration) -> FadeOutcome {
        self.fades.fade_out(layer, duration).await
    }

    /// Fade in to the layer's preferred volume over the default duration
    pub async fn fade_in_default(&self, layer: Layer) -> FadeOutcome {
        let target = self.config.preferences.volume_for(layer);
        self.fades
            .fade_in(layer, self.config.default_fade(), target)
            .await
    }

    pub async fn fade_out_default(&self, layer: Layer) -> FadeOutcome {
        self.fades.fade_out(layer, self.config.default_fade()).await
    }

    pub fn cancel_fade(&self, layer: Layer) -> bool {
        self.fades.cancel(layer)
    }

    pub fn is_fading(&self, layer: Layer) -> bool {
        self.fades.is_fading(layer)
    }

    pub fn fade_direction(&self, layer: Layer) -> Option<FadeDirection> {
        self.fades.direction(layer)
    }

    // ========================================================================
    // Session-wide operations
    // ========================================================================

    pub async fn play_all(&self) {
        for layer in self.loaded_layers() {
            self.lifecycle.play(layer).await;
        }
    }

    pub async fn pause_all(&self) {
        for layer in self.loaded_layers() {
            self.lifecycle.pause(layer).await;
        }
    }

    /// Stop every layer.
    ///
    /// Fades are cancelled before anything is stopped, otherwise a ramp step
    /// landing after the stop could raise the volume again.
    pub async fn stop_all(&self) {
        let cancelled = self.fades.cancel_all();
        debug!(cancelled, "Cancelled fades before stop");
        for layer in self.loaded_layers() {
            self.lifecycle.stop(layer).await;
        }
    }

    /// Cancel all fades, unload every layer, and require re-initialization
    pub async fn cleanup(&self) {
        self.fades.cancel_all();
        for layer in Layer::ALL {
            self.lifecycle.unload(layer).await;
        }
        let mut session = self.session.lock().await;
        session.initialized = false;
        info!("Audio engine cleaned up");
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Snapshot of a layer, or `None` if nothing is loaded
    pub fn get_status(&self, layer: Layer) -> Option<TrackStatus> {
        self.lifecycle.status(layer)
    }

    pub fn is_loaded(&self, layer: Layer) -> bool {
        self.lifecycle.registry().contains(layer)
    }

    pub fn loaded_layers(&self) -> Vec<Layer> {
        self.lifecycle.registry().layers()
    }
}
