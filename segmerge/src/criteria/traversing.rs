//! Reference criterion: regions should traverse the volume along one axis
//! and be as compact as possible.
//!
//! A region is complete once it touches both the first and the last plane
//! along the configured axis. Compactness is the fill ratio of the region's
//! bounding box; the full quality subtracts `size_penalty / voxels` so that
//! small fragments rank worst and get merged first.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::criterion::Criterion;
use crate::volume::LabelVolume;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraversingConfig {
    pub axis: Axis,
    pub size_penalty: f64,
}

impl Default for TraversingConfig {
    fn default() -> Self {
        TraversingConfig {
            axis: Axis::Z,
            size_penalty: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraversingCache {
    pub voxels: u64,
    /// Inclusive bounding box.
    pub min: [usize; 3],
    pub max: [usize; 3],
    /// Volume size along the traversal axis.
    pub extent: usize,
}

impl TraversingCache {
    fn from_voxel(position: [usize; 3], extent: usize) -> Self {
        TraversingCache {
            voxels: 1,
            min: position,
            max: position,
            extent,
        }
    }

    fn add_voxel(&mut self, position: [usize; 3]) {
        self.voxels += 1;
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(position[axis]);
            self.max[axis] = self.max[axis].max(position[axis]);
        }
    }

    pub fn bbox_volume(&self) -> u64 {
        (0..3)
            .map(|axis| (self.max[axis] - self.min[axis] + 1) as u64)
            .product()
    }

    pub fn fill_ratio(&self) -> f64 {
        self.voxels as f64 / self.bbox_volume() as f64
    }
}

#[derive(Clone, Debug, Default)]
pub struct TraversingCriterion {
    config: TraversingConfig,
}

impl TraversingCriterion {
    pub fn new(config: TraversingConfig) -> Self {
        TraversingCriterion { config }
    }

    pub fn config(&self) -> &TraversingConfig {
        &self.config
    }
}

impl<V: LabelVolume + ?Sized> Criterion<V> for TraversingCriterion {
    type Cache = TraversingCache;

    fn cache(&self, volume: &V, label: V::Label) -> anyhow::Result<TraversingCache> {
        let dims = volume.dimensions();
        let extent = dims[self.config.axis.index()];
        let mut cache: Option<TraversingCache> = None;

        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    if volume.voxel(x, y, z) != label {
                        continue;
                    }
                    match cache.as_mut() {
                        Some(cache) => cache.add_voxel([x, y, z]),
                        None => cache = Some(TraversingCache::from_voxel([x, y, z], extent)),
                    }
                }
            }
        }

        cache.ok_or_else(|| anyhow::anyhow!("Label {:?} has no voxels", label))
    }

    fn caches(&self, volume: &V, labels: &[V::Label]) -> anyhow::Result<Vec<TraversingCache>> {
        let dims = volume.dimensions();
        let extent = dims[self.config.axis.index()];
        let slot_by_label: HashMap<V::Label, usize> = labels
            .iter()
            .enumerate()
            .map(|(slot, &label)| (label, slot))
            .collect();
        let mut caches: Vec<Option<TraversingCache>> = vec![None; labels.len()];

        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    let Some(&slot) = slot_by_label.get(&volume.voxel(x, y, z)) else {
                        continue;
                    };
                    match caches[slot].as_mut() {
                        Some(cache) => cache.add_voxel([x, y, z]),
                        None => caches[slot] = Some(TraversingCache::from_voxel([x, y, z], extent)),
                    }
                }
            }
        }

        caches
            .into_iter()
            .zip(labels)
            .map(|(cache, label)| {
                cache.ok_or_else(|| anyhow::anyhow!("Label {:?} has no voxels", label))
            })
            .collect()
    }

    fn evaluate(&self, cache: &TraversingCache) -> f64 {
        cache.fill_ratio() - self.config.size_penalty / cache.voxels as f64
    }

    fn evaluate_without_size_penalty(&self, cache: &TraversingCache) -> f64 {
        cache.fill_ratio()
    }

    fn combine(&self, a: &TraversingCache, b: &TraversingCache) -> TraversingCache {
        debug_assert_eq!(a.extent, b.extent);

        let mut combined = a.clone();
        combined.voxels += b.voxels;
        for axis in 0..3 {
            combined.min[axis] = a.min[axis].min(b.min[axis]);
            combined.max[axis] = a.max[axis].max(b.max[axis]);
        }
        combined
    }

    fn is_complete(&self, cache: &TraversingCache) -> bool {
        let axis = self.config.axis.index();
        cache.min[axis] == 0 && cache.max[axis] + 1 == cache.extent
    }
}
