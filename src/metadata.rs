//! Geometry discovered while loading, cached per view so later consumers do
//! not have to reopen the source file.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use crate::registry::ViewId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeGeometry {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub voxel_size_x: f32,
    pub voxel_size_y: f32,
    pub z_spacing: f32,
}

impl VolumeGeometry {
    /// Number of samples in a volume of this geometry.
    pub fn voxel_count(&self) -> usize {
        self.width * self.height * self.depth
    }
}

/// Shared per-view geometry store. Writes are last-write-wins.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<ViewId, VolumeGeometry>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_metadata(&self, view: ViewId, geometry: VolumeGeometry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(view, geometry);
    }

    pub fn get(&self, view: &ViewId) -> Option<VolumeGeometry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(view)
            .copied()
    }

    pub fn contains(&self, view: &ViewId) -> bool {
        self.get(view).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
