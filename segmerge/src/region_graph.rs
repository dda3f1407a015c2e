//! Region adjacency graph.
//!
//! Regions live in an arena and refer to each other by [`RegionId`], so a
//! removed region never leaves a dangling reference behind: every removal
//! goes through [`RegionGraph::absorb`] or [`RegionGraph::finalize`], which
//! drop the removed id from all of its neighbours.

use hashbrown::HashSet;

use common::index_id_type;

use crate::worklist::WorklistHandle;

index_id_type!(RegionId);

#[derive(Clone, Debug)]
pub struct Region<L, C> {
    pub label: L,
    pub quality: f64,
    pub cache: C,
    neighbours: HashSet<RegionId>,
    handle: Option<WorklistHandle>,
}

impl<L, C> Region<L, C> {
    pub fn neighbours(&self) -> &HashSet<RegionId> {
        &self.neighbours
    }

    pub fn handle(&self) -> Option<WorklistHandle> {
        self.handle
    }
}

#[derive(Clone, Debug)]
pub struct RegionGraph<L, C> {
    regions: Vec<Option<Region<L, C>>>,
    live: usize,
}

impl<L, C> Default for RegionGraph<L, C> {
    fn default() -> Self {
        RegionGraph {
            regions: Vec::new(),
            live: 0,
        }
    }
}

impl<L, C> RegionGraph<L, C> {
    pub fn with_capacity(capacity: usize) -> Self {
        RegionGraph {
            regions: Vec::with_capacity(capacity),
            live: 0,
        }
    }

    pub fn create(&mut self, label: L, quality: f64, cache: C) -> RegionId {
        let id = RegionId::from_index(self.regions.len());
        self.regions.push(Some(Region {
            label,
            quality,
            cache,
            neighbours: HashSet::new(),
            handle: None,
        }));
        self.live += 1;

        id
    }

    /// Adds the edge `a - b` on both sides. Connecting twice is a no-op.
    pub fn connect(&mut self, a: RegionId, b: RegionId) {
        assert_ne!(a, b, "Region {} cannot neighbour itself", a);

        self.expect_mut(a).neighbours.insert(b);
        self.expect_mut(b).neighbours.insert(a);
    }

    pub fn neighbours(&self, id: RegionId) -> &HashSet<RegionId> {
        &self.expect(id).neighbours
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.regions
            .get(id.index())
            .is_some_and(|region| region.is_some())
    }

    pub fn region(&self, id: RegionId) -> Option<&Region<L, C>> {
        self.regions.get(id.index()).and_then(|region| region.as_ref())
    }

    pub fn region_mut(&mut self, id: RegionId) -> Option<&mut Region<L, C>> {
        self.regions
            .get_mut(id.index())
            .and_then(|region| region.as_mut())
    }

    pub fn set_handle(&mut self, id: RegionId, handle: WorklistHandle) {
        self.expect_mut(id).handle = Some(handle);
    }

    /// Moves the adjacency of `loser` onto `winner` and removes `loser`.
    /// Cache and quality of the winner are left to the caller.
    pub fn absorb(&mut self, winner: RegionId, loser: RegionId) -> Region<L, C> {
        assert_ne!(winner, loser, "Region {} cannot absorb itself", winner);
        assert!(self.contains(winner), "Region {} is not in the graph", winner);

        let removed = self.remove(loser);

        let mut inherited: Vec<RegionId> = Vec::with_capacity(removed.neighbours.len());
        for &neighbour in removed.neighbours.iter() {
            if neighbour == winner {
                continue;
            }
            if self.expect_mut(neighbour).neighbours.insert(winner) {
                inherited.push(neighbour);
            }
        }

        self.expect_mut(winner).neighbours.extend(inherited);

        removed
    }

    /// Removes a region whose label is final, dropping all its edges.
    pub fn finalize(&mut self, id: RegionId) -> Region<L, C> {
        self.remove(id)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, region)| region.is_some())
            .map(|(index, _)| RegionId::from_index(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &Region<L, C>)> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter_map(|(index, region)| {
                region
                    .as_ref()
                    .map(|region| (RegionId::from_index(index), region))
            })
    }

    /// True when every edge is present on both sides, points at a live
    /// region and no region neighbours itself.
    pub fn is_reciprocal(&self) -> bool {
        self.iter().all(|(id, region)| {
            region.neighbours.iter().all(|&neighbour| {
                neighbour != id
                    && self
                        .region(neighbour)
                        .is_some_and(|other| other.neighbours.contains(&id))
            })
        })
    }

    fn remove(&mut self, id: RegionId) -> Region<L, C> {
        let removed = self
            .regions
            .get_mut(id.index())
            .and_then(|region| region.take())
            .unwrap_or_else(|| panic!("Region {} is not in the graph", id));
        self.live -= 1;

        for &neighbour in removed.neighbours.iter() {
            let was_linked = self.expect_mut(neighbour).neighbours.remove(&id);
            assert!(was_linked, "Edge {} - {} was one-sided", id, neighbour);
        }

        removed
    }

    /// Like [`RegionGraph::region`], for ids the caller knows are live.
    pub(crate) fn expect(&self, id: RegionId) -> &Region<L, C> {
        self.region(id)
            .unwrap_or_else(|| panic!("Region {} is not in the graph", id))
    }

    pub(crate) fn expect_mut(&mut self, id: RegionId) -> &mut Region<L, C> {
        self.region_mut(id)
            .unwrap_or_else(|| panic!("Region {} is not in the graph", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbour_labels(graph: &RegionGraph<u32, ()>, id: RegionId) -> Vec<u32> {
        let mut labels: Vec<u32> = graph
            .neighbours(id)
            .iter()
            .map(|&n| graph.region(n).unwrap().label)
            .collect();
        labels.sort();
        labels
    }

    // 1 - 2 - 3
    //  \  |
    //     4      5
    fn sample_graph() -> (RegionGraph<u32, ()>, Vec<RegionId>) {
        let mut graph = RegionGraph::default();
        let ids: Vec<RegionId> = (1..=5).map(|label| graph.create(label, 0.0, ())).collect();

        graph.connect(ids[0], ids[1]);
        graph.connect(ids[1], ids[2]);
        graph.connect(ids[0], ids[3]);
        graph.connect(ids[1], ids[3]);

        (graph, ids)
    }

    #[test]
    fn connect_is_symmetric_and_idempotent() {
        let (mut graph, ids) = sample_graph();

        graph.connect(ids[1], ids[0]);

        assert_eq!(graph.len(), 5);
        assert_eq!(neighbour_labels(&graph, ids[0]), vec![2, 4]);
        assert_eq!(neighbour_labels(&graph, ids[1]), vec![1, 3, 4]);
        assert!(graph.neighbours(ids[4]).is_empty());
        assert!(graph.is_reciprocal());
    }

    #[test]
    #[should_panic(expected = "cannot neighbour itself")]
    fn connect_to_self_panics() {
        let (mut graph, ids) = sample_graph();
        graph.connect(ids[2], ids[2]);
    }

    #[test]
    fn absorb_moves_edges_to_winner() {
        let (mut graph, ids) = sample_graph();

        let removed = graph.absorb(ids[3], ids[1]);

        assert_eq!(removed.label, 2);
        assert!(!graph.contains(ids[1]));
        assert_eq!(graph.len(), 4);
        assert_eq!(neighbour_labels(&graph, ids[3]), vec![1, 3]);
        assert_eq!(neighbour_labels(&graph, ids[2]), vec![4]);
        assert_eq!(neighbour_labels(&graph, ids[0]), vec![4]);
        assert!(graph.is_reciprocal());
    }

    #[test]
    fn absorb_of_isolated_pair_leaves_winner_alone() {
        let mut graph: RegionGraph<u32, ()> = RegionGraph::default();
        let a = graph.create(1, 0.0, ());
        let b = graph.create(2, 0.0, ());
        graph.connect(a, b);

        graph.absorb(a, b);

        assert!(graph.neighbours(a).is_empty());
        assert_eq!(graph.ids().collect::<Vec<_>>(), vec![a]);
        assert!(graph.is_reciprocal());
    }

    #[test]
    fn finalize_removes_all_edges() {
        let (mut graph, ids) = sample_graph();

        let removed = graph.finalize(ids[1]);

        assert_eq!(removed.neighbours().len(), 3);
        assert_eq!(neighbour_labels(&graph, ids[0]), vec![4]);
        assert!(graph.neighbours(ids[2]).is_empty());
        assert_eq!(neighbour_labels(&graph, ids[3]), vec![1]);
        assert!(graph.is_reciprocal());

        for id in [ids[0], ids[2], ids[3], ids[4]] {
            graph.finalize(id);
        }
        assert!(graph.is_empty());
        assert_eq!(graph.iter().count(), 0);
    }

    #[test]
    #[should_panic(expected = "is not in the graph")]
    fn finalize_twice_panics() {
        let (mut graph, ids) = sample_graph();
        graph.finalize(ids[4]);
        graph.finalize(ids[4]);
    }

    #[test]
    #[should_panic(expected = "is not in the graph")]
    fn expect_of_absorbed_region_panics() {
        let (mut graph, ids) = sample_graph();
        graph.absorb(ids[0], ids[3]);
        graph.expect(ids[3]);
    }

    #[test]
    fn is_reciprocal_detects_one_sided_edge() {
        let (mut graph, ids) = sample_graph();
        graph.region_mut(ids[4]).unwrap().neighbours.insert(ids[2]);

        assert!(!graph.is_reciprocal());
    }
}
