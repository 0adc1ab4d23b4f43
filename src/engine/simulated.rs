//! In-memory platform backend
//!
//! These players don't produce sound. They keep the transport state a real
//! platform player would report, record every call made on them, and can be
//! told to fail, so engine behavior can be verified without audio hardware.
//! The CLI also runs sessions against this backend.
//!
//! Positions advance on `tokio::time`, so paused-clock tests stay deterministic.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::engine::platform::{
    AudioBackend, AudioModeConfig, PlatformPlayer, PlaybackState, PlayerOptions,
};
use crate::engine::AudioSource;
use crate::error::PlatformError;

/// Default reported length of a simulated track
const DEFAULT_TRACK_LENGTH: Duration = Duration::from_secs(600);

/// Player calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimCall {
    Play,
    Pause,
    Seek,
    SetVolume,
    Release,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Player
// ============================================================================

#[derive(Debug)]
struct PlayerInner {
    looping: bool,
    length: Duration,
    volume: f32,
    playing: bool,
    /// Position when playback last paused or seeked
    anchor: Duration,
    started_at: Option<Instant>,
    released: bool,
    failing: HashSet<SimCall>,
    volume_log: Vec<(Instant, f32)>,
    play_calls: usize,
    pause_calls: usize,
    seek_calls: usize,
}

impl PlayerInner {
    fn position(&self) -> Duration {
        let raw = match self.started_at {
            Some(started) if self.playing => self.anchor + started.elapsed(),
            _ => self.anchor,
        };
        if self.length.is_zero() {
            Duration::ZERO
        } else if self.looping {
            Duration::from_nanos((raw.as_nanos() % self.length.as_nanos()) as u64)
        } else {
            raw.min(self.length)
        }
    }

    fn check(&self, call: SimCall) -> Result<(), PlatformError> {
        if self.released {
            return Err(PlatformError::Released);
        }
        if self.failing.contains(&call) {
            return Err(PlatformError::Other(format!("injected {:?} failure", call)));
        }
        Ok(())
    }
}

/// Player handed out by [`SimulatedBackend`]
#[derive(Debug, Clone)]
pub struct SimulatedPlayer {
    inner: Arc<Mutex<PlayerInner>>,
}

#[async_trait]
impl PlatformPlayer for SimulatedPlayer {
    async fn play(&self) -> Result<(), PlatformError> {
        let mut inner = lock(&self.inner);
        inner.check(SimCall::Play)?;
        inner.play_calls += 1;
        if !inner.looping && inner.position() >= inner.length {
            inner.anchor = Duration::ZERO;
            inner.playing = false;
        }
        if !inner.playing {
            inner.playing = true;
            inner.started_at = Some(Instant::now());
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlatformError> {
        let mut inner = lock(&self.inner);
        inner.check(SimCall::Pause)?;
        inner.pause_calls += 1;
        inner.anchor = inner.position();
        inner.playing = false;
        inner.started_at = None;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<(), PlatformError> {
        let mut inner = lock(&self.inner);
        inner.check(SimCall::Seek)?;
        inner.seek_calls += 1;
        inner.anchor = position.min(inner.length);
        if inner.playing {
            inner.started_at = Some(Instant::now());
        }
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), PlatformError> {
        let mut inner = lock(&self.inner);
        inner.check(SimCall::SetVolume)?;
        inner.volume = volume;
        inner.volume_log.push((Instant::now(), volume));
        Ok(())
    }

    async fn release(&self) -> Result<(), PlatformError> {
        let mut inner = lock(&self.inner);
        inner.check(SimCall::Release)?;
        inner.playing = false;
        inner.started_at = None;
        inner.released = true;
        Ok(())
    }

    fn state(&self) -> Result<PlaybackState, PlatformError> {
        let inner = lock(&self.inner);
        if inner.released {
            return Err(PlatformError::Released);
        }
        let position = inner.position();
        let finished = !inner.looping && position >= inner.length;
        Ok(PlaybackState {
            playing: inner.playing && !finished,
            position,
            duration: Some(inner.length),
        })
    }
}

/// Read-only view of a simulated player for assertions
#[derive(Debug, Clone)]
pub struct PlayerProbe {
    inner: Arc<Mutex<PlayerInner>>,
}

impl PlayerProbe {
    pub fn volume(&self) -> f32 {
        lock(&self.inner).volume
    }

    /// Every volume the engine applied, in order
    pub fn volume_history(&self) -> Vec<f32> {
        lock(&self.inner).volume_log.iter().map(|(_, v)| *v).collect()
    }

    /// Volume writes made at or after `since`
    pub fn volume_writes_since(&self, since: Instant) -> Vec<f32> {
        lock(&self.inner)
            .volume_log
            .iter()
            .filter(|(at, _)| *at >= since)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn is_playing(&self) -> bool {
        let inner = lock(&self.inner);
        inner.playing && !inner.released
    }

    pub fn is_released(&self) -> bool {
        lock(&self.inner).released
    }

    pub fn is_looping(&self) -> bool {
        lock(&self.inner).looping
    }

    pub fn position(&self) -> Duration {
        lock(&self.inner).position()
    }

    pub fn play_calls(&self) -> usize {
        lock(&self.inner).play_calls
    }

    pub fn pause_calls(&self) -> usize {
        lock(&self.inner).pause_calls
    }

    pub fn seek_calls(&self) -> usize {
        lock(&self.inner).seek_calls
    }

    /// Make a call fail on this player from now on
    pub fn fail(&self, call: SimCall) {
        lock(&self.inner).failing.insert(call);
    }

    pub fn recover(&self, call: SimCall) {
        lock(&self.inner).failing.remove(&call);
    }
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Debug, Default)]
struct BackendState {
    failing_sources: HashSet<String>,
    failing_calls: HashMap<String, HashSet<SimCall>>,
    session_failures: usize,
    session_configs: Vec<AudioModeConfig>,
    players: Vec<(AudioSource, Arc<Mutex<PlayerInner>>)>,
    open_attempts: Vec<AudioSource>,
    track_length: Option<Duration>,
}

/// Platform backend whose players live entirely in memory
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    state: Arc<Mutex<BackendState>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this length for tracks opened from now on
    pub fn with_track_length(self, length: Duration) -> Self {
        lock(&self.state).track_length = Some(length);
        self
    }

    /// Make opening `source` fail
    pub fn fail_source(&self, source: &str) {
        lock(&self.state).failing_sources.insert(source.to_string());
    }

    /// Players opened from `source` will fail `call`
    pub fn fail_call(&self, source: &str, call: SimCall) {
        lock(&self.state)
            .failing_calls
            .entry(source.to_string())
            .or_default()
            .insert(call);
    }

    /// Make the next `count` session configurations fail
    pub fn fail_session(&self, count: usize) {
        lock(&self.state).session_failures = count;
    }

    /// Session configurations that succeeded
    pub fn session_configs(&self) -> Vec<AudioModeConfig> {
        lock(&self.state).session_configs.clone()
    }

    /// Every source `open` was called with, including failures
    pub fn open_attempts(&self) -> Vec<AudioSource> {
        lock(&self.state).open_attempts.clone()
    }

    /// Most recently opened player for `source`
    pub fn probe(&self, source: &AudioSource) -> Option<PlayerProbe> {
        lock(&self.state)
            .players
            .iter()
            .rev()
            .find(|(s, _)| s == source)
            .map(|(_, inner)| PlayerProbe {
                inner: inner.clone(),
            })
    }

    /// All players ever opened, oldest first
    pub fn probes(&self) -> Vec<(AudioSource, PlayerProbe)> {
        lock(&self.state)
            .players
            .iter()
            .map(|(s, inner)| {
                (
                    s.clone(),
                    PlayerProbe {
                        inner: inner.clone(),
                    },
                )
            })
            .collect()
    }
}

#[async_trait]
impl AudioBackend for SimulatedBackend {
    async fn configure_session(&self, mode: &AudioModeConfig) -> Result<(), PlatformError> {
        let mut state = lock(&self.state);
        if state.session_failures > 0 {
            state.session_failures -= 1;
            return Err(PlatformError::Session("injected session failure".to_string()));
        }
        state.session_configs.push(*mode);
        Ok(())
    }

    async fn open(
        &self,
        source: &AudioSource,
        options: PlayerOptions,
    ) -> Result<Box<dyn PlatformPlayer>, PlatformError> {
        let key = source.to_string();
        let mut state = lock(&self.state);
        state.open_attempts.push(source.clone());

        if state.failing_sources.contains(&key) {
            return Err(PlatformError::Open(key));
        }

        let inner = Arc::new(Mutex::new(PlayerInner {
            looping: options.looping,
            length: state.track_length.unwrap_or(DEFAULT_TRACK_LENGTH),
            volume: options.volume,
            playing: false,
            anchor: Duration::ZERO,
            started_at: None,
            released: false,
            failing: state.failing_calls.get(&key).cloned().unwrap_or_default(),
            volume_log: Vec::new(),
            play_calls: 0,
            pause_calls: 0,
            seek_calls: 0,
        }));
        state.players.push((source.clone(), inner.clone()));

        Ok(Box::new(SimulatedPlayer { inner }))
    }
}
