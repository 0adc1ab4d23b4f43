//! Audio Engine Module
//!
//! Layered playback on top of the platform media layer:
//! - Source descriptors and the platform seam
//! - Load/transport lifecycle per layer
//! - Cancellable fades
//! - The `AudioEngine` facade

mod audio_engine;
pub mod fade;
mod lifecycle;
pub mod platform;
pub mod simulated;
mod source;

pub use audio_engine::{AudioEngine, EngineSession, LoadOutcome};
pub use fade::{FadeController, FadeDirection, FadeOutcome, FADE_STEPS};
pub use lifecycle::PlaybackLifecycle;
pub use platform::{AudioBackend, AudioModeConfig, PlatformPlayer, PlaybackState, PlayerOptions};
pub use simulated::SimulatedBackend;
pub use source::AudioSource;
