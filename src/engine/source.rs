//! Audio source descriptors
//!
//! Callers hand the engine a typed source. The only place a raw string is
//! inspected is [`AudioSource::parse`], which is also what serde goes through
//! when sources are read from configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, Result};

/// Prefix for bundled asset tokens in their textual form
const ASSET_PREFIX: &str = "asset:";

/// Where a track's audio comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AudioSource {
    /// Asset shipped with the application, identified by an opaque token
    Bundled(String),
    /// `http://` or `https://` URL
    Remote(String),
    /// `file://` or `content://` URI
    LocalFile(String),
}

impl AudioSource {
    /// Classify a source string.
    ///
    /// # Example
    /// ```
    /// use stillpoint::engine::AudioSource;
    /// let source = AudioSource::parse("https://cdn.example.com/ocean.mp3").unwrap();
    /// assert!(matches!(source, AudioSource::Remote(_)));
    /// assert!(AudioSource::parse("not-a-valid-source").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        if s.starts_with("http") {
            Ok(AudioSource::Remote(s.to_string()))
        } else if s.starts_with("file://") || s.starts_with("content://") {
            Ok(AudioSource::LocalFile(s.to_string()))
        } else if let Some(token) = s.strip_prefix(ASSET_PREFIX).filter(|t| !t.is_empty()) {
            Ok(AudioSource::Bundled(token.to_string()))
        } else {
            Err(AudioError::UnsupportedSource {
                source_str: s.to_string(),
            })
        }
    }

    /// Reference a bundled asset by token
    pub fn bundled(token: impl Into<String>) -> Self {
        AudioSource::Bundled(token.into())
    }

    /// Whether the source came from outside the app bundle.
    ///
    /// Only these are eligible for the bundled-default fallback.
    pub fn is_external(&self) -> bool {
        !matches!(self, AudioSource::Bundled(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AudioSource::Bundled(_) => "bundled",
            AudioSource::Remote(_) => "remote",
            AudioSource::LocalFile(_) => "local",
        }
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::Bundled(token) => write!(f, "{}{}", ASSET_PREFIX, token),
            AudioSource::Remote(url) => f.write_str(url),
            AudioSource::LocalFile(uri) => f.write_str(uri),
        }
    }
}

impl FromStr for AudioSource {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self> {
        AudioSource::parse(s)
    }
}

impl TryFrom<String> for AudioSource {
    type Error = AudioError;

    fn try_from(value: String) -> Result<Self> {
        AudioSource::parse(&value)
    }
}

impl From<AudioSource> for String {
    fn from(source: AudioSource) -> Self {
        source.to_string()
    }
}
