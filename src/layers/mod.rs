//! Layer Model Module
//!
//! Three fixed audio layers, each occupied by at most one track:
//! - Voice: guided narration
//! - Ambient: looping background bed
//! - Chime: start/end bells

mod layer;
mod registry;
mod track;

pub use layer::Layer;
pub use registry::LayerRegistry;
pub use track::{clamp_volume, TrackHandle, TrackStatus};
