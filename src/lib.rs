//! Stillpoint - Layered Audio Engine for Guided Meditation
//!
//! Stillpoint plays three independently controlled layers on top of the
//! platform media layer:
//! - Voice: guided narration
//! - Ambient: a looping background bed
//! - Chime: start and end bells
//!
//! # Architecture
//!
//! - `layers`: layer identities, track handles, and the layer registry
//! - `engine`: load/transport lifecycle, cancellable fades, and the
//!   `AudioEngine` facade
//! - `session`: the start/complete/cancel choreography of one sitting
//!
//! A failure on one layer never stops a session; it just goes quiet.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod layers;
pub mod session;

pub use config::EngineConfig;
pub use engine::{AudioEngine, AudioSource, FadeOutcome, LoadOutcome};
pub use error::{AudioError, PlatformError, Result};
pub use layers::Layer;
pub use session::{MeditationSession, SessionPlan};
