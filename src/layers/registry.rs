//! Layer registry
//!
//! Single source of truth for which handle occupies each layer. The registry
//! never touches the platform; acquiring and releasing players is the
//! lifecycle's job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::layers::{Layer, TrackHandle};

#[derive(Debug, Default)]
pub struct LayerRegistry {
    tracks: Mutex<HashMap<Layer, Arc<TrackHandle>>>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn tracks(&self) -> MutexGuard<'_, HashMap<Layer, Arc<TrackHandle>>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.tracks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `handle` for `layer`, returning whatever was there before.
    ///
    /// The previous handle is expected to have been released already.
    pub fn set(&self, layer: Layer, handle: Arc<TrackHandle>) -> Option<Arc<TrackHandle>> {
        self.tracks().insert(layer, handle)
    }

    pub fn get(&self, layer: Layer) -> Option<Arc<TrackHandle>> {
        self.tracks().get(&layer).cloned()
    }

    /// Clear the entry without releasing the player
    pub fn remove(&self, layer: Layer) -> Option<Arc<TrackHandle>> {
        self.tracks().remove(&layer)
    }

    pub fn contains(&self, layer: Layer) -> bool {
        self.tracks().contains_key(&layer)
    }

    /// Registered layers in `Layer::ALL` order
    pub fn layers(&self) -> Vec<Layer> {
        let tracks = self.tracks();
        Layer::ALL
            .into_iter()
            .filter(|layer| tracks.contains_key(layer))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tracks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks().is_empty()
    }
}
