//! Ordered worklist of regions.
//!
//! A binary min-heap over `(region, priority)` entries plus a position map
//! from [`WorklistHandle`] to heap slot, so a region's priority can be
//! changed in place after it absorbs a neighbour. Handles are never reused.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use common::index_id_type;

use crate::region_graph::RegionId;

index_id_type!(WorklistHandle);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Priority {
    pub complete: bool,
    pub quality: f64,
}

impl Priority {
    pub fn new(complete: bool, quality: f64) -> Self {
        Priority { complete, quality }
    }

    /// Incomplete regions come before complete ones whatever their quality;
    /// within a category lower quality comes first.
    pub fn processing_cmp(&self, other: &Priority) -> Ordering {
        self.complete
            .cmp(&other.complete)
            .then_with(|| self.quality.total_cmp(&other.quality))
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    handle: WorklistHandle,
    id: RegionId,
    key: Priority,
}

impl Entry {
    // Equal keys: the later region id goes first.
    fn goes_before(&self, other: &Entry) -> bool {
        self.key
            .processing_cmp(&other.key)
            .then_with(|| other.id.cmp(&self.id))
            == Ordering::Less
    }
}

#[derive(Clone, Debug, Default)]
pub struct Worklist {
    heap: Vec<Entry>,
    positions: Vec<Option<usize>>,
}

impl Worklist {
    pub fn with_capacity(capacity: usize) -> Self {
        Worklist {
            heap: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, id: RegionId, key: Priority) -> WorklistHandle {
        let handle = WorklistHandle::from_index(self.positions.len());
        let pos = self.heap.len();

        self.heap.push(Entry { handle, id, key });
        self.positions.push(Some(pos));
        self.sift_up(pos);

        handle
    }

    /// Removes and returns the region to process next.
    pub fn extract_front(&mut self) -> RegionId {
        assert!(!self.heap.is_empty(), "Cannot extract from an empty worklist");

        let last = self.heap.len() - 1;
        self.swap(0, last);
        let front = self
            .heap
            .pop()
            .unwrap_or_else(|| panic!("Worklist heap emptied unexpectedly"));
        self.positions[front.handle.index()] = None;

        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        front.id
    }

    pub fn peek_front(&self) -> Option<(RegionId, Priority)> {
        self.heap.first().map(|entry| (entry.id, entry.key))
    }

    /// Re-keys a live entry, keeping its handle and region.
    pub fn update(&mut self, handle: WorklistHandle, key: Priority) {
        let pos = self.position(handle);
        self.heap[pos].key = key;

        let pos = self.sift_up(pos);
        self.sift_down(pos);
    }

    pub fn key(&self, handle: WorklistHandle) -> Option<Priority> {
        self.positions
            .get(handle.index())
            .copied()
            .flatten()
            .map(|pos| self.heap[pos].key)
    }

    pub fn contains(&self, handle: WorklistHandle) -> bool {
        self.key(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn position(&self, handle: WorklistHandle) -> usize {
        self.positions
            .get(handle.index())
            .copied()
            .flatten()
            .unwrap_or_else(|| panic!("Worklist handle {} is stale", handle))
    }

    fn sift_up(&mut self, mut pos: usize) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.heap[pos].goes_before(&self.heap[parent]) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
        pos
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut first = pos;

            if left < len && self.heap[left].goes_before(&self.heap[first]) {
                first = left;
            }
            if right < len && self.heap[right].goes_before(&self.heap[first]) {
                first = right;
            }
            if first == pos {
                break;
            }
            self.swap(pos, first);
            pos = first;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions[self.heap[a].handle.index()] = Some(a);
        self.positions[self.heap[b].handle.index()] = Some(b);
    }
}
