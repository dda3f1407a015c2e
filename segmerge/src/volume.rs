//! Labeled 3-D volumes.
//!
//! [`LabelVolume`] is everything the merger needs from a segmentation: the
//! distinct labels, voxel lookup for adjacency seeding and the relabeling
//! operation that commits a merge. [`VoxelVolume`] is a dense in-memory
//! implementation stored x-fastest.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Voxel label. Any small copyable ordered value works.
pub trait Label: Copy + Eq + Ord + Hash + Debug {}

impl<T> Label for T where T: Copy + Eq + Ord + Hash + Debug {}

pub trait LabelVolume {
    type Label: Label;

    /// Every label present in the volume except the background, each once.
    fn distinct_region_labels(&self) -> Vec<Self::Label>;
    fn background_label(&self) -> Self::Label;
    /// Size along x, y and z.
    fn dimensions(&self) -> [usize; 3];
    fn voxel(&self, x: usize, y: usize, z: usize) -> Self::Label;
    /// Reassigns every voxel of `loser` to `winner` and decrements the
    /// region count.
    fn merge_regions(&mut self, winner: Self::Label, loser: Self::Label) -> anyhow::Result<()>;
    fn region_count(&self) -> usize;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VolumeError {
    #[error("Dimensions {0:?} exceed the addressable voxel count")]
    DimensionsOverflow([usize; 3]),
    #[error("Voxel count {actual} does not match dimensions {dims:?} ({expected} voxels)")]
    SizeMismatch {
        dims: [usize; 3],
        expected: usize,
        actual: usize,
    },
    #[error("Cannot merge label {0} into itself")]
    SelfMerge(String),
    #[error("Cannot merge the background label {0}")]
    BackgroundMerge(String),
    #[error("Label {0} has no voxels")]
    UnknownLabel(String),
}

pub type VolumeResult<T> = Result<T, VolumeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelVolume<L> {
    labels: Vec<L>,
    dims: [usize; 3],
    background: L,
    region_count: usize,
}

fn voxel_total(dims: [usize; 3]) -> Option<usize> {
    dims[0].checked_mul(dims[1])?.checked_mul(dims[2])
}

impl<L: Label> VoxelVolume<L> {
    pub fn new(dims: [usize; 3], labels: Vec<L>, background: L) -> VolumeResult<Self> {
        let expected = voxel_total(dims).ok_or(VolumeError::DimensionsOverflow(dims))?;
        if labels.len() != expected {
            return Err(VolumeError::SizeMismatch {
                dims,
                expected,
                actual: labels.len(),
            });
        }

        let mut volume = Self {
            labels,
            dims,
            background,
            region_count: 0,
        };
        volume.region_count = volume.distinct_region_labels().len();

        Ok(volume)
    }

    pub fn new_filled(dims: [usize; 3], label: L, background: L) -> Self {
        let total = voxel_total(dims)
            .unwrap_or_else(|| panic!("Dimensions {:?} exceed the addressable voxel count", dims));
        let labels = vec![label; total];
        let region_count = usize::from(label != background);
        Self {
            labels,
            dims,
            background,
            region_count,
        }
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.dims[0] && y < self.dims[1] && z < self.dims[2]);
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    #[inline]
    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of voxels carrying `label`.
    pub fn voxel_count(&self, label: L) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }
}

impl<L: Label> LabelVolume for VoxelVolume<L> {
    type Label = L;

    fn distinct_region_labels(&self) -> Vec<L> {
        let distinct: BTreeSet<L> = self
            .labels
            .iter()
            .copied()
            .filter(|&label| label != self.background)
            .collect();

        distinct.into_iter().collect()
    }

    fn background_label(&self) -> L {
        self.background
    }

    fn dimensions(&self) -> [usize; 3] {
        self.dims
    }

    #[inline]
    fn voxel(&self, x: usize, y: usize, z: usize) -> L {
        self.labels[self.index(x, y, z)]
    }

    fn merge_regions(&mut self, winner: L, loser: L) -> anyhow::Result<()> {
        if winner == loser {
            return Err(VolumeError::SelfMerge(format!("{:?}", winner)).into());
        }
        for label in [winner, loser] {
            if label == self.background {
                return Err(VolumeError::BackgroundMerge(format!("{:?}", label)).into());
            }
        }

        let mut relabeled = 0usize;
        for voxel in self.labels.iter_mut().filter(|voxel| **voxel == loser) {
            *voxel = winner;
            relabeled += 1;
        }
        if relabeled == 0 {
            return Err(VolumeError::UnknownLabel(format!("{:?}", loser)).into());
        }

        assert!(self.region_count > 0);
        self.region_count -= 1;

        Ok(())
    }

    fn region_count(&self) -> usize {
        self.region_count
    }
}

/// On-disk form of a [`VoxelVolume`]. Labels are listed x-fastest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeFile<L> {
    pub dims: [usize; 3],
    pub background: L,
    pub labels: Vec<L>,
}

impl<L: Label> From<&VoxelVolume<L>> for VolumeFile<L> {
    fn from(volume: &VoxelVolume<L>) -> Self {
        VolumeFile {
            dims: volume.dims,
            background: volume.background,
            labels: volume.labels.clone(),
        }
    }
}

impl<L: Label> TryFrom<VolumeFile<L>> for VoxelVolume<L> {
    type Error = VolumeError;

    fn try_from(file: VolumeFile<L>) -> VolumeResult<Self> {
        VoxelVolume::new(file.dims, file.labels, file.background)
    }
}

impl<L> VoxelVolume<L>
where
    L: Label + Serialize + DeserializeOwned,
{
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let file: VolumeFile<L> = common::read_file(path)?;

        Ok(file.try_into()?)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        common::write_file(path, &VolumeFile::from(self))
    }
}
