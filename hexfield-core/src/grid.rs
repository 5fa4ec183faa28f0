//! Grid storage, adjacency and connectivity search

use crate::cell::{HexCell, Side};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Neighbor threshold: cells closer than `2r + margin` are adjacent
const NEIGHBOR_MARGIN: f32 = 10.0;

/// The map: a dense cell array plus a precomputed adjacency table.
///
/// Adjacency is index-based and built once per map load; it never changes
/// during play, so value copies of the cell array (snapshots) restore
/// without rebuilding it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HexGrid {
    pub cells: Vec<HexCell>,
    neighbors: Vec<Vec<usize>>,
}

impl HexGrid {
    pub fn new(cells: Vec<HexCell>) -> Self {
        let mut grid = Self {
            cells,
            neighbors: Vec::new(),
        };
        grid.generate_neighbors();
        grid
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn neighbors(&self, index: usize) -> &[usize] {
        &self.neighbors[index]
    }

    /// Build the adjacency table from geometric proximity. O(N²), run once
    /// after all cells exist; aliveness is deliberately ignored so the
    /// table stays valid as cells die.
    pub fn generate_neighbors(&mut self) {
        self.neighbors = self
            .cells
            .iter()
            .map(|base| {
                self.cells
                    .iter()
                    .filter(|other| {
                        other.index != base.index
                            && base.distance_to(other) < 2.0 * base.r + NEIGHBOR_MARGIN
                    })
                    .map(|other| other.index)
                    .collect()
            })
            .collect();
    }

    /// Breadth-first reachability from `origin`, at most `max_range` steps.
    ///
    /// The frontier only advances through living cells of the origin's side
    /// (or any living cell when `ignore_side`). With `origin_neighbors_exempt`
    /// the origin's direct living neighbors are included at distance 1
    /// regardless of side but never expanded: an adjacent enemy hex is a
    /// legal target, not a corridor.
    pub fn bfs_reachable(
        &self,
        origin: usize,
        max_range: u32,
        ignore_side: bool,
        origin_neighbors_exempt: bool,
    ) -> Vec<usize> {
        if !self.cells[origin].alive() {
            return Vec::new();
        }
        let side = self.cells[origin].side;

        let mut visited = FxHashSet::default();
        visited.insert(origin);
        let mut result = vec![origin];
        let mut queue = VecDeque::new();
        queue.push_back((origin, 0u32));

        while let Some((index, dist)) = queue.pop_front() {
            if dist >= max_range {
                continue;
            }
            for &n in &self.neighbors[index] {
                if visited.contains(&n) || !self.cells[n].alive() {
                    continue;
                }
                if ignore_side || self.cells[n].side == side {
                    visited.insert(n);
                    result.push(n);
                    queue.push_back((n, dist + 1));
                } else if origin_neighbors_exempt && index == origin {
                    visited.insert(n);
                    result.push(n);
                }
            }
        }

        result
    }

    /// Partition all living cells into maximal connected components,
    /// ignoring side.
    pub fn find_islands(&self) -> Vec<Vec<usize>> {
        let mut seen = FxHashSet::default();
        let mut islands = Vec::new();

        for cell in &self.cells {
            if !cell.alive() || seen.contains(&cell.index) {
                continue;
            }
            let island = self.bfs_reachable(cell.index, u32::MAX, true, false);
            seen.extend(island.iter().copied());
            islands.push(island);
        }

        islands
    }

    /// Partition one island into maximal same-side components (blobs).
    pub fn find_clusters(&self, island: &[usize]) -> Vec<(Side, Vec<usize>)> {
        let mut seen = FxHashSet::default();
        let mut clusters = Vec::new();

        for &index in island {
            if seen.contains(&index) {
                continue;
            }
            let cluster = self.bfs_reachable(index, u32::MAX, false, false);
            seen.extend(cluster.iter().copied());
            clusters.push((self.cells[index].side, cluster));
        }

        clusters
    }

    /// Unweighted shortest path over living cells, side ignored.
    /// Returns the cell sequence from `from` (exclusive) to `to`
    /// (inclusive); empty if unreachable.
    pub fn shortest_path(&self, from: usize, to: usize) -> Vec<usize> {
        if from == to || !self.cells[from].alive() || !self.cells[to].alive() {
            return Vec::new();
        }

        let mut parent = vec![usize::MAX; self.cells.len()];
        let mut visited = FxHashSet::default();
        visited.insert(from);
        let mut queue = VecDeque::new();
        queue.push_back(from);

        while let Some(index) = queue.pop_front() {
            if index == to {
                break;
            }
            for &n in &self.neighbors[index] {
                if visited.contains(&n) || !self.cells[n].alive() {
                    continue;
                }
                visited.insert(n);
                parent[n] = index;
                queue.push_back(n);
            }
        }

        if parent[to] == usize::MAX {
            return Vec::new();
        }

        let mut path = vec![to];
        let mut current = to;
        while parent[current] != from {
            current = parent[current];
            path.push(current);
        }
        path.reverse();
        path
    }

    /// First candidate with minimal straight-line distance to `from`.
    pub fn nearest(&self, from: usize, candidates: &[usize]) -> Option<usize> {
        let base = &self.cells[from];
        let mut best: Option<(usize, f32)> = None;
        for &c in candidates {
            let dist = base.distance_to(&self.cells[c]);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((c, dist));
            }
        }
        best.map(|(c, _)| c)
    }
}
