//! Layer identities
//!
//! The engine mixes exactly three independently controlled channels. The set
//! is fixed at compile time and each layer carries its own loop policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three fixed audio channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Guided narration (foreground)
    Voice,
    /// Background bed, loops for the whole session
    Ambient,
    /// Start/end bells
    Chime,
}

impl Layer {
    /// All layers, in a stable order
    pub const ALL: [Layer; 3] = [Layer::Voice, Layer::Ambient, Layer::Chime];

    /// Whether tracks on this layer loop.
    ///
    /// Only the ambient bed loops; callers cannot override this.
    pub fn loops(self) -> bool {
        matches!(self, Layer::Ambient)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Voice => "voice",
            Layer::Ambient => "ambient",
            Layer::Chime => "chime",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Layer::Voice => 0,
            Layer::Ambient => 1,
            Layer::Chime => 2,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "voice" => Ok(Layer::Voice),
            "ambient" => Ok(Layer::Ambient),
            "chime" => Ok(Layer::Chime),
            other => Err(format!("unknown layer '{}'", other)),
        }
    }
}
