//! Fade Controller
//!
//! Linear volume ramps in a fixed number of steps, one fade per layer.
//!
//! Starting a fade cancels the layer's current fade and then waits on the
//! layer's fade lane, which the previous fade holds until it has fully
//! retired. Cancellation is cooperative: the token is checked after each
//! step's sleep, so a cancelled fade stops within one step interval and never
//! writes another volume once a newer fade on the same layer has begun.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::PlaybackLifecycle;
use crate::error::AudioError;
use crate::layers::{clamp_volume, Layer, TrackHandle};

/// Number of volume steps in every fade
pub const FADE_STEPS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeDirection {
    In,
    Out,
}

/// How a fade ended. Informational only; fades never return errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// All steps ran (and, for fade-out, the layer was stopped)
    Completed,
    /// A newer fade, a stop, or an unload cancelled it
    Cancelled,
    /// A platform call failed mid-ramp, or the track went away
    Aborted,
    /// Nothing was loaded on the layer
    Skipped,
}

// ============================================================================
// Fade bookkeeping
// ============================================================================

#[derive(Debug)]
struct ActiveFade {
    id: Uuid,
    direction: FadeDirection,
    token: CancellationToken,
}

/// Tracks the single active fade per layer
#[derive(Debug, Default)]
pub(crate) struct FadeTracker {
    active: Mutex<HashMap<Layer, ActiveFade>>,
    lanes: [tokio::sync::Mutex<()>; 3],
}

impl FadeTracker {
    fn active(&self) -> MutexGuard<'_, HashMap<Layer, ActiveFade>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new fade, cancelling whatever was running on the layer
    pub(crate) fn begin(
        &self,
        layer: Layer,
        direction: FadeDirection,
        duration: Duration,
    ) -> FadeOperation<'_> {
        let token = CancellationToken::new();
        let id = Uuid::new_v4();
        let previous = self.active().insert(
            layer,
            ActiveFade {
                id,
                direction,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            debug!(layer = %layer, superseded = ?previous.direction, "Cancelled previous fade");
        }
        FadeOperation {
            tracker: self,
            id,
            layer,
            direction,
            duration,
            token,
        }
    }

    /// Cancel the layer's fade, if any. Never blocks.
    pub(crate) fn cancel(&self, layer: Layer) -> bool {
        match self.active().remove(&layer) {
            Some(fade) => {
                fade.token.cancel();
                debug!(layer = %layer, direction = ?fade.direction, "Fade cancelled");
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.active().drain().collect();
        for (_, fade) in &drained {
            fade.token.cancel();
        }
        drained.len()
    }

    pub(crate) fn direction(&self, layer: Layer) -> Option<FadeDirection> {
        self.active().get(&layer).map(|f| f.direction)
    }

    async fn lane(&self, layer: Layer) -> tokio::sync::MutexGuard<'_, ()> {
        self.lanes[layer.index()].lock().await
    }

    fn retire(&self, layer: Layer, id: Uuid) {
        let mut active = self.active();
        if active.get(&layer).is_some_and(|f| f.id == id) {
            active.remove(&layer);
        }
    }
}

/// An in-flight fade. Dropping it retires the fade.
#[derive(Debug)]
pub struct FadeOperation<'a> {
    tracker: &'a FadeTracker,
    id: Uuid,
    layer: Layer,
    direction: FadeDirection,
    duration: Duration,
    token: CancellationToken,
}

impl FadeOperation<'_> {
    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn direction(&self) -> FadeDirection {
        self.direction
    }

    pub fn steps(&self) -> usize {
        FADE_STEPS
    }

    /// Time between volume steps
    pub fn step_interval(&self) -> Duration {
        self.duration / FADE_STEPS as u32
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for FadeOperation<'_> {
    fn drop(&mut self) {
        self.tracker.retire(self.layer, self.id);
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Drives fades against the lifecycle's registry
pub struct FadeController {
    lifecycle: Arc<PlaybackLifecycle>,
}

impl FadeController {
    pub fn new(lifecycle: Arc<PlaybackLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Start the layer from silence and ramp up to `target`.
    ///
    /// On cancellation the volume is left wherever the ramp reached.
    pub async fn fade_in(&self, layer: Layer, duration: Duration, target: f32) -> FadeOutcome {
        if !self.lifecycle.registry().contains(layer) {
            warn!(layer = %layer, "No track loaded, skipping fade in");
            return FadeOutcome::Skipped;
        }
        let target = clamp_volume(target);
        let op = self
            .lifecycle
            .fades()
            .begin(layer, FadeDirection::In, duration);
        let _lane = self.lifecycle.fades().lane(layer).await;
        if op.is_cancelled() {
            return FadeOutcome::Cancelled;
        }
        let Some(handle) = self.lifecycle.registry().get(layer) else {
            return FadeOutcome::Skipped;
        };

        info!(layer = %layer, ?duration, target, "Fade in");
        let started = match handle.set_volume(0.0).await {
            Ok(()) => handle.play().await,
            Err(e) => Err(e),
        };
        if let Err(source) = started {
            AudioError::FadeStepFailure {
                layer,
                step: 0,
                source,
            }
            .report();
            return FadeOutcome::Aborted;
        }

        self.ramp(&op, &handle, 0.0, target).await
    }

    /// Ramp from the current volume down to silence, then stop the layer.
    ///
    /// The start volume is read once the previous fade has retired, so a
    /// fade-out after a cancelled fade-in starts from where that ramp stopped.
    pub async fn fade_out(&self, layer: Layer, duration: Duration) -> FadeOutcome {
        if !self.lifecycle.registry().contains(layer) {
            warn!(layer = %layer, "No track loaded, skipping fade out");
            return FadeOutcome::Skipped;
        }
        let op = self
            .lifecycle
            .fades()
            .begin(layer, FadeDirection::Out, duration);
        let _lane = self.lifecycle.fades().lane(layer).await;
        if op.is_cancelled() {
            return FadeOutcome::Cancelled;
        }
        let Some(handle) = self.lifecycle.registry().get(layer) else {
            return FadeOutcome::Skipped;
        };

        let start = handle.volume();
        info!(layer = %layer, ?duration, from = start, "Fade out");

        let outcome = self.ramp(&op, &handle, start, 0.0).await;
        if outcome == FadeOutcome::Completed {
            self.lifecycle.stop(layer).await;
        }
        outcome
    }

    /// Cancel the layer's fade without waiting for it to wind down
    pub fn cancel(&self, layer: Layer) -> bool {
        self.lifecycle.fades().cancel(layer)
    }

    pub fn cancel_all(&self) -> usize {
        self.lifecycle.fades().cancel_all()
    }

    pub fn is_fading(&self, layer: Layer) -> bool {
        self.lifecycle.fades().direction(layer).is_some()
    }

    pub fn direction(&self, layer: Layer) -> Option<FadeDirection> {
        self.lifecycle.fades().direction(layer)
    }

    async fn ramp(
        &self,
        op: &FadeOperation<'_>,
        handle: &Arc<TrackHandle>,
        from: f32,
        to: f32,
    ) -> FadeOutcome {
        let layer = op.layer();
        let interval = op.step_interval();

        for step in 1..=op.steps() {
            tokio::time::sleep(interval).await;

            if op.is_cancelled() {
                debug!(layer = %layer, step, "Fade stopped at step boundary");
                return FadeOutcome::Cancelled;
            }
            let still_loaded = self
                .lifecycle
                .registry()
                .get(layer)
                .is_some_and(|current| current.id() == handle.id());
            if !still_loaded {
                warn!(layer = %layer, step, "Track went away mid-fade");
                return FadeOutcome::Aborted;
            }

            let volume = from + (to - from) * (step as f32 / FADE_STEPS as f32);
            if let Err(source) = handle.set_volume(volume).await {
                AudioError::FadeStepFailure {
                    layer,
                    step,
                    source,
                }
                .report();
                return FadeOutcome::Aborted;
            }
        }

        debug!(layer = %layer, direction = ?op.direction(), "Fade completed");
        FadeOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::simulated::{SimCall, SimulatedBackend};
    use crate::engine::AudioSource;
    use approx::assert_relative_eq;

    async fn setup(layer: Layer, volume: f32) -> (SimulatedBackend, Arc<FadeController>, AudioSource) {
        let backend = SimulatedBackend::new();
        let lifecycle = Arc::new(PlaybackLifecycle::new(Arc::new(backend.clone())));
        let source = AudioSource::bundled(layer.as_str());
        lifecycle.load(layer, &source, volume).await.unwrap();
        (backend, Arc::new(FadeController::new(lifecycle)), source)
    }

    #[test]
    fn test_tracker_single_fade_per_layer() {
        let tracker = FadeTracker::default();
        let first = tracker.begin(Layer::Voice, FadeDirection::In, Duration::from_secs(1));
        let second = tracker.begin(Layer::Voice, FadeDirection::Out, Duration::from_secs(1));

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(tracker.direction(Layer::Voice), Some(FadeDirection::Out));

        // Retiring the superseded fade must not clear the newer one
        drop(first);
        assert_eq!(tracker.direction(Layer::Voice), Some(FadeDirection::Out));

        drop(second);
        assert_eq!(tracker.direction(Layer::Voice), None);
    }

    #[test]
    fn test_tracker_cancel_all() {
        let tracker = FadeTracker::default();
        let voice = tracker.begin(Layer::Voice, FadeDirection::Out, Duration::from_secs(2));
        let ambient = tracker.begin(Layer::Ambient, FadeDirection::In, Duration::from_secs(3));

        assert_eq!(tracker.cancel_all(), 2);
        assert!(voice.is_cancelled());
        assert!(ambient.is_cancelled());
        assert!(!tracker.cancel(Layer::Voice));
        assert_eq!(voice.step_interval(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_in_reaches_target() {
        let (backend, fades, source) = setup(Layer::Ambient, 0.4).await;

        let outcome = fades
            .fade_in(Layer::Ambient, Duration::from_millis(2000), 0.4)
            .await;

        assert_eq!(outcome, FadeOutcome::Completed);
        let probe = backend.probe(&source).unwrap();
        let history = probe.volume_history();
        assert_eq!(history.len(), 1 + FADE_STEPS);
        assert_eq!(history[0], 0.0);
        assert_relative_eq!(history[1], 0.02, epsilon = 1e-6);
        assert_relative_eq!(*history.last().unwrap(), 0.4, epsilon = 1e-6);
        assert!(probe.is_playing());
        assert!(!fades.is_fading(Layer::Ambient));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_out_stops_layer() {
        let (backend, fades, source) = setup(Layer::Voice, 0.8).await;

        let outcome = fades.fade_out(Layer::Voice, Duration::from_millis(1000)).await;

        assert_eq!(outcome, FadeOutcome::Completed);
        let probe = backend.probe(&source).unwrap();
        let history = probe.volume_history();
        assert_eq!(history.len(), FADE_STEPS);
        assert!(history.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(*history.last().unwrap(), 0.0);
        assert!(!probe.is_playing());
        assert_eq!(probe.seek_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_on_empty_layer_is_skipped() {
        let (_backend, fades, _source) = setup(Layer::Voice, 0.8).await;
        let outcome = fades.fade_in(Layer::Chime, Duration::from_millis(500), 1.0).await;
        assert_eq!(outcome, FadeOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_failure_aborts_fade() {
        let (backend, fades, source) = setup(Layer::Ambient, 0.4).await;
        fades
            .fade_in(Layer::Ambient, Duration::from_millis(200), 0.4)
            .await;

        backend.probe(&source).unwrap().fail(SimCall::SetVolume);
        let outcome = fades.fade_out(Layer::Ambient, Duration::from_millis(200)).await;

        assert_eq!(outcome, FadeOutcome::Aborted);
        // No terminal stop after an aborted ramp
        assert!(backend.probe(&source).unwrap().is_playing());
        assert!(!fades.is_fading(Layer::Ambient));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_failure_aborts_only_that_fade() {
        let backend = SimulatedBackend::new();
        backend.fail_call("asset:ocean", SimCall::Play);
        let lifecycle = Arc::new(PlaybackLifecycle::new(Arc::new(backend.clone())));
        let ocean = AudioSource::bundled("ocean");
        let intro = AudioSource::bundled("intro");
        lifecycle.load(Layer::Ambient, &ocean, 0.4).await.unwrap();
        lifecycle.load(Layer::Voice, &intro, 0.8).await.unwrap();
        let fades = FadeController::new(lifecycle);

        let (ambient, voice) = tokio::join!(
            fades.fade_in(Layer::Ambient, Duration::from_millis(1000), 0.4),
            fades.fade_in(Layer::Voice, Duration::from_millis(1000), 0.8),
        );

        assert_eq!(ambient, FadeOutcome::Aborted);
        assert!(!fades.is_fading(Layer::Ambient));
        // Only the initial silence was written before playback failed
        assert_eq!(backend.probe(&ocean).unwrap().volume_history(), vec![0.0]);

        assert_eq!(voice, FadeOutcome::Completed);
        let probe = backend.probe(&intro).unwrap();
        assert!(probe.is_playing());
        assert_relative_eq!(probe.volume(), 0.8, epsilon = 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_fade_supersedes_older() {
        let (backend, fades, source) = setup(Layer::Ambient, 0.4).await;

        let first = {
            let fades = fades.clone();
            tokio::spawn(async move {
                fades
                    .fade_in(Layer::Ambient, Duration::from_millis(2000), 1.0)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(550)).await;
        let second = fades.fade_out(Layer::Ambient, Duration::from_millis(400)).await;

        assert_eq!(first.await.unwrap(), FadeOutcome::Cancelled);
        assert_eq!(second, FadeOutcome::Completed);

        // 0 + five fade-in steps, then twenty fade-out steps
        let history = backend.probe(&source).unwrap().volume_history();
        assert_eq!(history.len(), 1 + 5 + FADE_STEPS);
        assert_relative_eq!(history[5], 0.25, epsilon = 1e-6);
        assert!(history[6..].windows(2).all(|w| w[1] < w[0]));
        assert_eq!(*history.last().unwrap(), 0.0);
    }
}
