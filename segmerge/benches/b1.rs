use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use segmerge::criteria::TraversingCriterion;
use segmerge::{merge_regions, MergeOptions, VoxelVolume};

fn noisy_volume(side: usize, labels: u32) -> VoxelVolume<u32> {
    let mut rng = StdRng::seed_from_u64(42);
    let voxels: Vec<u32> = (0..side * side * side)
        .map(|_| rng.random_range(0..=labels))
        .collect();

    VoxelVolume::new([side, side, side], voxels, 0)
        .unwrap_or_else(|e| panic!("Failed to build benchmark volume: {}", e))
}

fn bench_merge(c: &mut Criterion) {
    c.bench_function("merge_32_cubed", |b| {
        let volume = noisy_volume(32, 2000);
        let criterion = TraversingCriterion::default();
        let options = MergeOptions {
            progress_interval: 0,
        };

        b.iter(|| {
            let mut volume = volume.clone();
            let report = merge_regions(&mut volume, &criterion, options.clone())
                .unwrap_or_else(|e| panic!("Merge failed: {}", e));
            black_box(report);
        })
    });
}

criterion_group!(benches, bench_merge);
criterion_main!(benches);
