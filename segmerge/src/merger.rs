//! Greedy two-phase region merging.
//!
//! Every iteration takes the worst region off the worklist and either merges
//! it into the neighbour whose combination scores best, or finalizes it.
//! Incomplete regions (phase 1) always merge when they have a neighbour;
//! once the worst region is complete (phase 2) a merge only happens when it
//! strictly improves on the region's current quality. Each iteration removes
//! exactly one worklist entry and none are ever added, so a volume with N
//! regions takes exactly N iterations.

use std::cmp::Ordering;

use hashbrown::HashMap;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::criterion::Criterion;
use crate::region_graph::{RegionGraph, RegionId};
use crate::volume::LabelVolume;
use crate::worklist::{Priority, Worklist};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// The worst region is still incomplete and merges unconditionally.
    Incomplete,
    /// Every remaining region is complete.
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizeReason {
    Isolated,
    NoImprovingMerge,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome<L> {
    Merged { winner: L, quality: f64 },
    Finalized(FinalizeReason),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step<L> {
    pub iteration: usize,
    /// Label of the region taken off the worklist.
    pub label: L,
    pub phase: Phase,
    pub outcome: StepOutcome<L>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    /// Iterations between progress lines; 0 disables them.
    pub progress_interval: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            progress_interval: 1000,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub initial_regions: usize,
    pub iterations: usize,
    pub merges: usize,
    pub finalized: usize,
    /// Finalized because they had no neighbour at all.
    pub isolated: usize,
    pub complete_phase_started_at: Option<usize>,
    pub final_region_count: usize,
    pub stopped_early: bool,
}

struct Candidate<L, K> {
    id: RegionId,
    label: L,
    cache: K,
    quality: f64,
}

pub struct Merger<'a, V, C>
where
    V: LabelVolume,
    C: Criterion<V>,
{
    volume: &'a mut V,
    criterion: &'a C,
    options: MergeOptions,
    graph: RegionGraph<V::Label, C::Cache>,
    worklist: Worklist,
    phase: Phase,
    report: MergeReport,
}

/// Runs the whole merge on `volume`.
pub fn merge_regions<V, C>(
    volume: &mut V,
    criterion: &C,
    options: MergeOptions,
) -> anyhow::Result<MergeReport>
where
    V: LabelVolume,
    C: Criterion<V>,
{
    let mut merger = Merger::new(volume, criterion, options)?;
    merger.run()
}

impl<'a, V, C> Merger<'a, V, C>
where
    V: LabelVolume,
    C: Criterion<V>,
{
    /// Builds one region per distinct label and wires their adjacency.
    pub fn new(volume: &'a mut V, criterion: &'a C, options: MergeOptions) -> anyhow::Result<Self> {
        let labels = volume.distinct_region_labels();
        let caches = criterion.caches(volume, &labels)?;
        assert_eq!(
            caches.len(),
            labels.len(),
            "Criterion returned {} caches for {} labels",
            caches.len(),
            labels.len()
        );

        let mut graph = RegionGraph::with_capacity(labels.len());
        let mut worklist = Worklist::with_capacity(labels.len());
        let mut id_by_label: HashMap<V::Label, RegionId> = HashMap::with_capacity(labels.len());

        for (&label, cache) in labels.iter().zip(caches) {
            let quality = criterion.evaluate(&cache);
            let complete = criterion.is_complete(&cache);

            let id = graph.create(label, quality, cache);
            let prev = id_by_label.insert(label, id);
            assert!(prev.is_none(), "Duplicate region label {:?}", label);

            let handle = worklist.insert(id, Priority::new(complete, quality));
            graph.set_handle(id, handle);
        }

        seed_adjacency(&*volume, &id_by_label, &mut graph);

        let edges: usize = graph
            .iter()
            .map(|(_, region)| region.neighbours().len())
            .sum::<usize>()
            / 2;
        info!(
            "Initialized {} regions with {} adjacencies, volume {:?}",
            labels.len(),
            edges,
            volume.dimensions()
        );

        let report = MergeReport {
            initial_regions: labels.len(),
            final_region_count: volume.region_count(),
            ..MergeReport::default()
        };

        Ok(Merger {
            volume,
            criterion,
            options,
            graph,
            worklist,
            phase: Phase::Incomplete,
            report,
        })
    }

    pub fn run(&mut self) -> anyhow::Result<MergeReport> {
        self.run_until(|_| false)
    }

    /// Runs until the worklist is empty or `should_stop` returns true.
    /// `should_stop` is consulted before every iteration.
    pub fn run_until(
        &mut self,
        mut should_stop: impl FnMut(&MergeReport) -> bool,
    ) -> anyhow::Result<MergeReport> {
        self.report.stopped_early = false;
        while !self.worklist.is_empty() {
            if should_stop(&self.report) {
                self.report.stopped_early = true;
                warn!(
                    "Merge stopped after {} iterations with {} regions still queued",
                    self.report.iterations,
                    self.worklist.len()
                );
                break;
            }
            self.step()?;
        }

        info!(
            "Merge finished: {} merges, {} finalized ({} isolated), {} -> {} regions",
            self.report.merges,
            self.report.finalized,
            self.report.isolated,
            self.report.initial_regions,
            self.report.final_region_count
        );

        Ok(self.report.clone())
    }

    /// Processes the worst queued region. Returns `None` once nothing is left.
    ///
    /// The region leaves the worklist only once its iteration succeeded, so
    /// after an error the merger can be stepped again.
    pub fn step(&mut self) -> anyhow::Result<Option<Step<V::Label>>> {
        let Some((worst_id, _)) = self.worklist.peek_front() else {
            return Ok(None);
        };
        let iteration = self.report.iterations + 1;

        let (label, quality, is_done) = {
            let worst = self.graph.expect(worst_id);
            (worst.label, worst.quality, self.criterion.is_complete(&worst.cache))
        };
        self.observe_phase(is_done, iteration, label);

        let outcome = match self.best_candidate(worst_id) {
            None => {
                self.finalize(worst_id);
                self.report.isolated += 1;
                debug!("Region {:?} has no neighbours, finalized", label);
                StepOutcome::Finalized(FinalizeReason::Isolated)
            }
            Some(candidate) if !is_done || candidate.quality > quality => {
                self.commit(worst_id, label, candidate)?
            }
            Some(candidate) => {
                self.finalize(worst_id);
                debug!(
                    "Region {:?} finalized, best merge with {:?} scores {:.6} <= {:.6}",
                    label, candidate.label, candidate.quality, quality
                );
                StepOutcome::Finalized(FinalizeReason::NoImprovingMerge)
            }
        };
        self.report.iterations = iteration;

        let interval = self.options.progress_interval;
        if interval > 0 && iteration % interval == 0 {
            info!(
                "Iteration {}: {} regions queued, {} merges, {} regions in volume",
                iteration,
                self.worklist.len(),
                self.report.merges,
                self.report.final_region_count
            );
        }

        Ok(Some(Step {
            iteration,
            label,
            phase: self.phase,
            outcome,
        }))
    }

    pub fn graph(&self) -> &RegionGraph<V::Label, C::Cache> {
        &self.graph
    }

    pub fn worklist(&self) -> &Worklist {
        &self.worklist
    }

    pub fn volume(&self) -> &V {
        &*self.volume
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn report(&self) -> &MergeReport {
        &self.report
    }

    fn pop_front(&mut self, id: RegionId) {
        let front = self.worklist.extract_front();
        assert_eq!(front, id, "Worklist front changed during an iteration");
    }

    fn finalize(&mut self, id: RegionId) {
        self.pop_front(id);
        self.graph.finalize(id);
        self.report.finalized += 1;
    }

    fn observe_phase(&mut self, is_done: bool, iteration: usize, label: V::Label) {
        match (self.phase, is_done) {
            (Phase::Incomplete, true) => {
                self.phase = Phase::Complete;
                self.report.complete_phase_started_at = Some(iteration);
                info!(
                    "All {} remaining regions are complete at iteration {}, merging only on improvement",
                    self.worklist.len(),
                    iteration
                );
            }
            (Phase::Complete, false) => {
                warn!(
                    "Region {:?} is incomplete after every region was complete; completeness is not monotonic",
                    label
                );
            }
            _ => {}
        }
    }

    // Ties on quality go to the neighbour with the lowest label.
    fn best_candidate(&self, worst_id: RegionId) -> Option<Candidate<V::Label, C::Cache>> {
        let worst = self.graph.region(worst_id)?;
        let mut best: Option<Candidate<V::Label, C::Cache>> = None;

        for &neighbour_id in worst.neighbours().iter() {
            let neighbour = self.graph.expect(neighbour_id);
            let cache = self.criterion.combine(&worst.cache, &neighbour.cache);
            let quality = self.criterion.evaluate_without_size_penalty(&cache);
            trace!(
                "Candidate {:?} + {:?}: {:.6}",
                worst.label,
                neighbour.label,
                quality
            );

            let better = match &best {
                None => true,
                Some(best) => match quality.total_cmp(&best.quality) {
                    Ordering::Greater => true,
                    Ordering::Equal => neighbour.label < best.label,
                    Ordering::Less => false,
                },
            };
            if better {
                best = Some(Candidate {
                    id: neighbour_id,
                    label: neighbour.label,
                    cache,
                    quality,
                });
            }
        }

        best
    }

    fn commit(
        &mut self,
        loser_id: RegionId,
        loser_label: V::Label,
        candidate: Candidate<V::Label, C::Cache>,
    ) -> anyhow::Result<StepOutcome<V::Label>> {
        self.volume.merge_regions(candidate.label, loser_label)?;
        self.pop_front(loser_id);
        self.graph.absorb(candidate.id, loser_id);

        let winner = self.graph.expect_mut(candidate.id);
        winner.cache = candidate.cache;
        winner.quality = self.criterion.evaluate(&winner.cache);
        let quality = winner.quality;
        let key = Priority::new(self.criterion.is_complete(&winner.cache), quality);
        let handle = winner
            .handle()
            .unwrap_or_else(|| panic!("Region {} has no worklist entry", candidate.id));
        self.worklist.update(handle, key);

        self.report.merges += 1;
        self.report.final_region_count = self.volume.region_count();

        if common::is_debug() {
            assert!(self.graph.is_reciprocal(), "Adjacency lost reciprocity");
        }
        debug!(
            "Merged region {:?} into {:?}, quality {:.6}, complete {}",
            loser_label, candidate.label, quality, key.complete
        );

        Ok(StepOutcome::Merged {
            winner: candidate.label,
            quality,
        })
    }
}

/// Connects regions whose voxels touch along an axis. Each voxel is compared
/// with its forward neighbour on every axis where it is not on the last plane.
/// Background voxels and labels without a region are skipped.
fn seed_adjacency<V, K>(
    volume: &V,
    id_by_label: &HashMap<V::Label, RegionId>,
    graph: &mut RegionGraph<V::Label, K>,
) where
    V: LabelVolume + ?Sized,
{
    let [sx, sy, sz] = volume.dimensions();
    let background = volume.background_label();

    for z in 0..sz {
        for y in 0..sy {
            for x in 0..sx {
                let label = volume.voxel(x, y, z);
                if label == background {
                    continue;
                }
                let Some(&id) = id_by_label.get(&label) else {
                    continue;
                };

                let forward = [
                    (x + 1 < sx).then(|| (x + 1, y, z)),
                    (y + 1 < sy).then(|| (x, y + 1, z)),
                    (z + 1 < sz).then(|| (x, y, z + 1)),
                ];
                for (nx, ny, nz) in forward.into_iter().flatten() {
                    let other = volume.voxel(nx, ny, nz);
                    if other == label || other == background {
                        continue;
                    }
                    if let Some(&other_id) = id_by_label.get(&other) {
                        graph.connect(id, other_id);
                    }
                }
            }
        }
    }
}
