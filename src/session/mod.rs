//! Meditation session choreography
//!
//! A `MeditationSession` owns the engine for the lifetime of one sitting and
//! sequences the layers: opening chime, ambient bed fading in, narration after
//! a pause, and the closing chime with fades. Any layer may be absent or fail
//! to load; the session simply runs without it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SessionTimings;
use crate::engine::{AudioEngine, AudioSource, FadeOutcome, LoadOutcome};
use crate::layers::{Layer, TrackStatus};

/// Sources for one session; any of them may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub voice: Option<AudioSource>,
    pub ambient: Option<AudioSource>,
    pub chime: Option<AudioSource>,
}

impl SessionPlan {
    pub fn source(&self, layer: Layer) -> Option<&AudioSource> {
        match layer {
            Layer::Voice => self.voice.as_ref(),
            Layer::Ambient => self.ambient.as_ref(),
            Layer::Chime => self.chime.as_ref(),
        }
    }
}

/// Where the session is in its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Per-layer load results from `start()`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartReport {
    pub voice: Option<LoadOutcome>,
    pub ambient: Option<LoadOutcome>,
    pub chime: Option<LoadOutcome>,
    pub ambient_fade: Option<FadeOutcome>,
}

pub struct MeditationSession {
    engine: Arc<AudioEngine>,
    plan: SessionPlan,
    timings: SessionTimings,
    phase: SessionPhase,
    /// Cancels the delayed narration start
    pending: CancellationToken,
    voice_task: Option<JoinHandle<()>>,
}

impl MeditationSession {
    pub fn new(engine: AudioEngine, plan: SessionPlan) -> Self {
        let timings = engine.config().timings;
        Self {
            engine: Arc::new(engine),
            plan,
            timings,
            phase: SessionPhase::Idle,
            pending: CancellationToken::new(),
            voice_task: None,
        }
    }

    pub fn with_timings(mut self, timings: SessionTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Load every planned layer, ring the chime, and bring in the ambient bed.
    ///
    /// Narration is scheduled to start after `voice_delay`; ending the session
    /// first cancels it.
    pub async fn start(&mut self) -> StartReport {
        let mut report = StartReport::default();
        self.pending = CancellationToken::new();
        self.phase = SessionPhase::Running;

        for layer in Layer::ALL {
            let Some(source) = self.plan.source(layer).cloned() else {
                continue;
            };
            let outcome = self.engine.load_with_preferences(layer, source).await;
            match layer {
                Layer::Voice => report.voice = Some(outcome),
                Layer::Ambient => report.ambient = Some(outcome),
                Layer::Chime => report.chime = Some(outcome),
            }
        }

        if self.engine.is_loaded(Layer::Chime) {
            self.engine.play(Layer::Chime).await;
        }
        if self.engine.is_loaded(Layer::Ambient) {
            let target = self.engine.config().preferences.ambient_volume;
            report.ambient_fade = Some(
                self.engine
                    .fade_in(Layer::Ambient, self.timings.ambient_fade_in(), target)
                    .await,
            );
        }
        if self.engine.is_loaded(Layer::Voice) {
            self.schedule_voice();
        }

        info!(?report, "Session started");
        report
    }

    fn schedule_voice(&mut self) {
        let engine = self.engine.clone();
        let token = self.pending.clone();
        let delay = self.timings.voice_delay();
        self.voice_task = Some(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!("Narration start cancelled"),
                _ = tokio::time::sleep(delay) => engine.play(Layer::Voice).await,
            }
        }));
    }

    /// Closing sequence: chime, fade out narration then ambient, and unload
    /// everything after a grace period.
    pub async fn complete(&mut self) {
        self.pending.cancel();
        self.join_voice_task().await;

        if self.engine.is_loaded(Layer::Chime) {
            self.engine.play(Layer::Chime).await;
        }
        self.engine
            .fade_out(Layer::Voice, self.timings.voice_fade_out())
            .await;
        self.engine
            .fade_out(Layer::Ambient, self.timings.ambient_fade_out())
            .await;

        tokio::time::sleep(self.timings.cleanup_grace()).await;
        self.engine.cleanup().await;
        self.phase = SessionPhase::Completed;
        info!("Session completed");
    }

    /// Abort immediately: stop everything and unload
    pub async fn cancel(&mut self) {
        self.pending.cancel();
        self.join_voice_task().await;
        self.engine.stop_all().await;
        self.engine.cleanup().await;
        self.phase = SessionPhase::Cancelled;
        info!("Session cancelled");
    }

    /// Status of every loaded layer
    pub fn status(&self) -> Vec<TrackStatus> {
        Layer::ALL
            .into_iter()
            .filter_map(|layer| self.engine.get_status(layer))
            .collect()
    }

    async fn join_voice_task(&mut self) {
        if let Some(task) = self.voice_task.take() {
            if let Err(e) = task.await {
                debug!(error = %e, "Narration task ended abnormally");
            }
        }
    }
}

impl Drop for MeditationSession {
    fn drop(&mut self) {
        // A pending narration start must not outlive its session.
        self.pending.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::SimulatedBackend;
    use std::time::Duration;

    fn plan() -> SessionPlan {
        SessionPlan {
            voice: Some(AudioSource::parse("https://cdn.example.com/body-scan.mp3").unwrap()),
            ambient: Some(AudioSource::bundled("ocean_432hz")),
            chime: Some(AudioSource::bundled("bell_528hz")),
        }
    }

    fn session(backend: &SimulatedBackend, plan: SessionPlan) -> MeditationSession {
        let engine = AudioEngine::new(Arc::new(backend.clone()), EngineConfig::default());
        MeditationSession::new(engine, plan)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_sequence() {
        let backend = SimulatedBackend::new();
        let mut session = session(&backend, plan());

        let report = session.start().await;
        assert_eq!(report.voice, Some(LoadOutcome::Loaded));
        assert_eq!(report.ambient_fade, Some(FadeOutcome::Completed));
        assert_eq!(session.phase(), SessionPhase::Running);

        let voice = backend.probe(plan().voice.as_ref().unwrap()).unwrap();
        assert!(!voice.is_playing());
        assert!(backend.probe(plan().chime.as_ref().unwrap()).unwrap().is_playing());

        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert!(voice.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_narration() {
        let backend = SimulatedBackend::new();
        let mut session = session(&backend, plan());
        session.start().await;

        session.cancel().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let voice = backend.probe(plan().voice.as_ref().unwrap()).unwrap();
        assert_eq!(voice.play_calls(), 0);
        assert!(voice.is_released());
        assert_eq!(session.phase(), SessionPhase::Cancelled);
        assert!(session.status().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_fades_and_cleans_up() {
        let backend = SimulatedBackend::new();
        let mut session = session(&backend, plan());
        session.start().await;
        tokio::time::sleep(Duration::from_secs(6)).await;

        session.complete().await;

        let ambient = backend.probe(plan().ambient.as_ref().unwrap()).unwrap();
        assert_eq!(*ambient.volume_history().last().unwrap(), 0.0);
        assert!(ambient.is_released());
        assert!(!session.engine().is_initialized().await);
        assert_eq!(session.phase(), SessionPhase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_session_never_starts_narration() {
        let backend = SimulatedBackend::new();
        let mut session = session(&backend, plan());
        session.start().await;
        drop(session);

        tokio::time::sleep(Duration::from_secs(10)).await;

        let voice = backend.probe(plan().voice.as_ref().unwrap()).unwrap();
        assert_eq!(voice.play_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_without_ambient() {
        let backend = SimulatedBackend::new();
        let mut plan = plan();
        plan.ambient = None;
        let mut session = session(&backend, plan);

        let report = session.start().await;
        assert_eq!(report.ambient, None);
        assert_eq!(report.ambient_fade, None);
        assert_eq!(session.status().len(), 2);
    }
}
