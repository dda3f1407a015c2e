use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::criteria::{Axis, TraversingConfig, TraversingCriterion};
use crate::criterion::Criterion;
use crate::merger::{FinalizeReason, MergeOptions, Merger, Phase, StepOutcome};
use crate::tests::test_utils::ScriptedCriterion;
use crate::volume::{LabelVolume, VoxelVolume};

fn random_volume(rng: &mut StdRng, max_labels: u32) -> VoxelVolume<u32> {
    let dims = [
        rng.random_range(1..7),
        rng.random_range(1..7),
        rng.random_range(1..7),
    ];
    let labels: Vec<u32> = (0..dims[0] * dims[1] * dims[2])
        .map(|_| {
            if rng.random_bool(0.15) {
                0
            } else {
                rng.random_range(1..=max_labels)
            }
        })
        .collect();

    VoxelVolume::new(dims, labels, 0).unwrap()
}

fn random_scripted_criterion(rng: &mut StdRng, max_labels: u32) -> ScriptedCriterion {
    let weights: Vec<(u32, f64)> = (1..=max_labels)
        .map(|label| (label, rng.random_range(0.0..1.0)))
        .collect();
    let complete: Vec<u32> = (1..=max_labels)
        .filter(|_| rng.random_bool(0.3))
        .collect();

    let mut criterion = ScriptedCriterion::new(&weights, &complete);
    criterion.size_penalty = rng.random_range(0.0..0.5);
    criterion.merge_penalty = rng.random_range(0.0..0.1);
    criterion
}

/// Steps the merger to the end, checking the invariants after every step.
fn check_invariants<C>(volume: &mut VoxelVolume<u32>, criterion: &C)
where
    C: Criterion<VoxelVolume<u32>>,
{
    let original = volume.clone();
    let initial_labels = volume.distinct_region_labels();

    let mut merger = Merger::new(&mut *volume, criterion, MergeOptions::default()).unwrap();
    assert!(merger.graph().is_reciprocal());
    assert_eq!(merger.graph().len(), initial_labels.len());

    let mut previous_count = merger.volume().region_count();
    let mut iterations = 0;
    while let Some(step) = merger.step().unwrap() {
        iterations += 1;
        assert!(iterations <= initial_labels.len(), "Merge did not terminate");

        let graph = merger.graph();
        assert!(graph.is_reciprocal());
        assert_eq!(graph.len(), merger.worklist().len());

        let count = merger.volume().region_count();
        match step.outcome {
            StepOutcome::Merged { winner, .. } => {
                assert_eq!(count + 1, previous_count);
                assert_ne!(winner, step.label);
            }
            StepOutcome::Finalized(reason) => {
                assert_eq!(count, previous_count);
                if reason == FinalizeReason::NoImprovingMerge {
                    assert_eq!(step.phase, Phase::Complete);
                }
            }
        }
        previous_count = count;

        if merger.phase() == Phase::Complete {
            assert!(graph
                .iter()
                .all(|(_, region)| criterion.is_complete(&region.cache)));
        }
    }

    assert_eq!(iterations, initial_labels.len());
    assert!(merger.graph().is_empty());
    assert!(merger.worklist().is_empty());

    let report = merger.report().clone();
    assert_eq!(report.iterations, iterations);
    assert_eq!(report.merges + report.finalized, iterations);
    assert_eq!(
        report.initial_regions - report.merges,
        volume.distinct_region_labels().len()
    );
    assert_eq!(report.final_region_count, volume.region_count());

    for (before, after) in original.labels().iter().zip(volume.labels()) {
        assert_eq!(*before == 0, *after == 0, "Background must never change");
        assert!(initial_labels.contains(after) || *after == 0);
    }
}

#[test]
fn traversing_merges_keep_invariants() {
    for seed in 0..25 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut volume = random_volume(&mut rng, 12);
        let axis = [Axis::X, Axis::Y, Axis::Z][rng.random_range(0..3)];
        let criterion = TraversingCriterion::new(TraversingConfig {
            axis,
            size_penalty: rng.random_range(0.0..2.0),
        });

        check_invariants(&mut volume, &criterion);
    }
}

#[test]
fn scripted_merges_keep_invariants() {
    for seed in 100..125 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut volume = random_volume(&mut rng, 9);
        let criterion = random_scripted_criterion(&mut rng, 9);

        check_invariants(&mut volume, &criterion);
    }
}

#[test]
fn merging_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(7);
    let volume = random_volume(&mut rng, 16);
    let criterion = TraversingCriterion::default();

    let mut first = volume.clone();
    let mut second = volume;
    let first_report =
        crate::merger::merge_regions(&mut first, &criterion, MergeOptions::default()).unwrap();
    let second_report =
        crate::merger::merge_regions(&mut second, &criterion, MergeOptions::default()).unwrap();

    assert_eq!(first_report, second_report);
    assert_eq!(first, second);
}

#[test]
fn fragments_fixture_keeps_invariants() -> anyhow::Result<()> {
    let mut volume = VoxelVolume::<u32>::from_file("../test_resources/fragments.yaml")?;
    let criterion = TraversingCriterion::default();

    check_invariants(&mut volume, &criterion);

    Ok(())
}
