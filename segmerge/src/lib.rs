pub mod config;
pub mod criteria;
pub mod criterion;
pub mod merger;
pub mod region_graph;
pub mod volume;
pub mod worklist;

#[cfg(test)]
mod tests;

pub use config::MergeConfig;
pub use criterion::Criterion;
pub use merger::{merge_regions, MergeOptions, MergeReport, Merger, Phase};
pub use volume::{LabelVolume, VoxelVolume};
