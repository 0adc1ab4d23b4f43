//! CLI Command Implementations

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::{AudioEngine, AudioSource, SimulatedBackend};
use crate::session::{MeditationSession, SessionPlan};

/// Options for `play`, gathered from the command line
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    pub voice: Option<String>,
    pub ambient: Option<String>,
    pub chime: Option<String>,
    pub sit: Duration,
    pub time_scale: f64,
    pub fail_sources: Vec<String>,
    pub cancel: bool,
}

fn parse_optional(layer: &str, source: Option<&str>) -> Option<AudioSource> {
    let source = source?;
    match AudioSource::parse(source) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(layer, "{}", e);
            None
        }
    }
}

/// Run a simulated session and print each layer's status as JSON.
pub async fn play(config_path: Option<&Path>, options: PlayOptions) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    anyhow::ensure!(
        options.time_scale.is_finite() && options.time_scale >= 0.0,
        "time scale must be a non-negative number, got {}",
        options.time_scale
    );
    let timings = config.timings.scaled(options.time_scale);

    let backend = SimulatedBackend::new();
    for source in &options.fail_sources {
        backend.fail_source(source);
    }

    let plan = SessionPlan {
        voice: parse_optional("voice", options.voice.as_deref()),
        ambient: parse_optional("ambient", options.ambient.as_deref()),
        chime: parse_optional("chime", options.chime.as_deref()),
    };
    let engine = AudioEngine::new(Arc::new(backend), config);
    let mut session = MeditationSession::new(engine, plan).with_timings(timings);

    let report = session.start().await;
    println!("Started: {:?}", report);

    let sit = options.sit.mul_f64(options.time_scale);
    info!(?sit, "Sitting");
    tokio::time::sleep(sit).await;

    for status in session.status() {
        println!("{}", serde_json::to_string(&status)?);
    }

    if options.cancel {
        session.cancel().await;
    } else {
        session.complete().await;
    }
    println!("Session {:?}", session.phase());
    Ok(())
}

/// Print how a source string is classified.
pub fn check_source(source: &str) -> anyhow::Result<()> {
    match AudioSource::parse(source) {
        Ok(parsed) => println!("{} source: {}", parsed.kind(), parsed),
        Err(e) => println!("{} ({})", e, e.error_code()),
    }
    Ok(())
}
