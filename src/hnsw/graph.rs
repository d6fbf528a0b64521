//! HNSW graph — core data structures and algorithms.
//!
//! Implements the Hierarchical Navigable Small World graph from:
//! "Efficient and robust approximate nearest neighbor search using
//!  Hierarchical Navigable Small World graphs" (Malkov & Yashunin, 2016/2018).

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{Result, StoreError};

use super::neighbor_queue::{MaxHeap, MinHeap, Neighbor};

/// Configuration parameters for the HNSW graph.
#[derive(Debug, Clone)]
pub struct HnswParams {
    /// Max number of connections per node (layers > 0).
    pub m: usize,
    /// Max connections at layer 0 (typically 2 * m).
    pub m_max0: usize,
    /// Number of candidates during construction.
    pub ef_construction: usize,
    /// Number of candidates during search.
    pub ef_search: usize,
    /// Level generation factor: 1 / ln(m).
    pub ml: f64,
    /// Maximum number of layers.
    pub max_layers: usize,
}

impl HnswParams {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize) -> Self {
        Self {
            m,
            m_max0: 2 * m,
            ef_construction,
            ef_search,
            ml: 1.0 / (m as f64).ln(),
            max_layers: 16,
        }
    }
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::new(16, 200, 50)
    }
}

/// A node in the HNSW graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HnswNode {
    vector: Vec<f32>,
    /// Neighbors per layer. neighbors[l] is the list of neighbor ids at layer l.
    neighbors: Vec<Vec<usize>>,
    /// The maximum layer this node was inserted into.
    level: usize,
}

/// Serializable graph state, minus the RNG and the parameters (which the
/// owner reconstructs from its configuration).
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct GraphSnapshot {
    nodes: Vec<Option<HnswNode>>,
    entry_point: Option<usize>,
    max_level: usize,
    count: usize,
}

/// The HNSW graph structure.
///
/// Nodes are addressed by dense labels assigned by the caller; the node
/// table is indexed directly by label. There is no deletion path.
#[derive(Debug)]
pub struct HnswGraph {
    /// Nodes indexed by label. Slots between occupied labels stay None.
    nodes: Vec<Option<HnswNode>>,
    /// Entry point node id (highest-level node).
    entry_point: Option<usize>,
    /// Current maximum level in the graph.
    max_level: usize,
    /// HNSW parameters.
    params: HnswParams,
    /// Distance metric.
    metric: DistanceMetric,
    /// RNG for level generation.
    rng: StdRng,
    /// Count of stored nodes.
    count: usize,
    /// Maximum number of nodes before a resize is required.
    max_elements: usize,
}

impl HnswGraph {
    pub fn new(metric: DistanceMetric, params: HnswParams, max_elements: usize) -> Self {
        Self {
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
            params,
            metric,
            rng: StdRng::from_entropy(),
            count: 0,
            max_elements,
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_elements
    }

    /// Grow the node table to hold `max_elements` nodes. The caller treats
    /// this as an expensive operation and issues it only on exhaustion.
    pub fn resize(&mut self, max_elements: usize) {
        if max_elements > self.max_elements {
            self.max_elements = max_elements;
            self.nodes.reserve(max_elements.saturating_sub(self.nodes.len()));
        }
    }

    pub fn set_ef(&mut self, ef: usize) {
        self.params.ef_search = ef;
    }

    /// Generate a random level for a new node.
    fn random_level(&mut self) -> usize {
        let r: f64 = self.rng.gen();
        let level = (-r.ln() * self.params.ml).floor() as usize;
        level.min(self.params.max_layers - 1)
    }

    /// Compute distance between a query vector and a node.
    fn distance(&self, query: &[f32], node_id: usize) -> Result<f32> {
        let node = self.nodes[node_id]
            .as_ref()
            .ok_or_else(|| StoreError::IndexError(format!("node {} not found", node_id)))?;
        Ok(self.metric.distance(query, &node.vector))
    }

    /// Get the vector stored under a label.
    pub fn get_vector(&self, id: usize) -> Option<&[f32]> {
        self.nodes
            .get(id)
            .and_then(|n| n.as_ref())
            .map(|n| n.vector.as_slice())
    }

    /// SEARCH-LAYER: Algorithm 2 from the HNSW paper.
    ///
    /// Search a single layer of the graph for the ef closest neighbors to
    /// query, starting from the entry points `ep`.
    fn search_layer(
        &self,
        query: &[f32],
        ep: &[usize],
        ef: usize,
        layer: usize,
    ) -> Result<Vec<Neighbor>> {
        let mut visited = HashSet::new();
        let mut candidates = MinHeap::new(); // closest candidate on top
        let mut results = MaxHeap::new(); // furthest result on top

        for &ep_id in ep {
            let dist = self.distance(query, ep_id)?;
            visited.insert(ep_id);
            candidates.push(Neighbor::new(ep_id, dist));
            results.push(Neighbor::new(ep_id, dist));
        }

        while let Some(c) = candidates.pop() {
            // If the closest candidate is further than the furthest result, stop
            let furthest_dist = results.peek().map(|n| n.distance).unwrap_or(f32::MAX);
            if c.distance > furthest_dist {
                break;
            }

            // Explore neighbors of c at this layer
            if let Some(node) = &self.nodes[c.id] {
                if layer < node.neighbors.len() {
                    for &neighbor_id in &node.neighbors[layer] {
                        if visited.contains(&neighbor_id) {
                            continue;
                        }
                        visited.insert(neighbor_id);

                        if self.nodes.get(neighbor_id).and_then(|n| n.as_ref()).is_none() {
                            continue;
                        }

                        let dist = self.distance(query, neighbor_id)?;
                        let furthest_dist =
                            results.peek().map(|n| n.distance).unwrap_or(f32::MAX);

                        if dist < furthest_dist || results.len() < ef {
                            candidates.push(Neighbor::new(neighbor_id, dist));
                            results.push(Neighbor::new(neighbor_id, dist));
                            if results.len() > ef {
                                results.pop(); // remove furthest
                            }
                        }
                    }
                }
            }
        }

        Ok(results.into_sorted_vec())
    }

    /// Select the M closest neighbors from candidates (simple selection, Algorithm 3).
    fn select_neighbors_simple(candidates: &[Neighbor], m: usize) -> Vec<usize> {
        candidates.iter().take(m).map(|n| n.id).collect()
    }

    /// Prune a node's neighbor list at a given layer to at most `m` neighbors.
    fn prune_neighbors(&mut self, node_id: usize, layer: usize, m: usize) {
        let (neighbor_ids, node_vec) = {
            let node = match &self.nodes[node_id] {
                Some(n) => n,
                None => return,
            };
            if layer >= node.neighbors.len() {
                return;
            }
            (node.neighbors[layer].clone(), node.vector.clone())
        };

        let mut scored: Vec<(usize, f32)> = neighbor_ids
            .into_iter()
            .filter_map(|nid| {
                self.nodes
                    .get(nid)
                    .and_then(|n| n.as_ref())
                    .map(|n| (nid, self.metric.distance(&node_vec, &n.vector)))
            })
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(m);

        if let Some(node) = &mut self.nodes[node_id] {
            if layer < node.neighbors.len() {
                node.neighbors[layer] = scored.into_iter().map(|(nid, _)| nid).collect();
            }
        }
    }

    /// INSERT: Algorithm 1 from the HNSW paper.
    ///
    /// Fails with `CapacityExceeded` when the graph is full; the graph is
    /// unchanged in that case.
    pub fn insert(&mut self, id: usize, vector: Vec<f32>) -> Result<()> {
        if self.count >= self.max_elements {
            return Err(StoreError::CapacityExceeded {
                capacity: self.max_elements,
            });
        }

        let level = self.random_level();

        if id >= self.nodes.len() {
            self.nodes.resize_with(id + 1, || None);
        }

        let node = HnswNode {
            vector: vector.clone(),
            neighbors: vec![Vec::new(); level + 1],
            level,
        };
        self.nodes[id] = Some(node);
        self.count += 1;

        // If this is the first node, set it as entry point
        let entry_point = match self.entry_point {
            None => {
                self.entry_point = Some(id);
                self.max_level = level;
                return Ok(());
            }
            Some(ep) => ep,
        };

        let mut ep_id = entry_point;
        let current_max_level = self.max_level;

        // Phase 1: Greedy descent from top layer down to level+1 (ef=1)
        if current_max_level > level {
            for l in (level + 1..=current_max_level).rev() {
                let nearest = self.search_layer(&vector, &[ep_id], 1, l)?;
                if let Some(n) = nearest.first() {
                    ep_id = n.id;
                }
            }
        }

        // Phase 2: Insert at layers min(level, current_max_level) down to 0
        let insert_from = level.min(current_max_level);
        for l in (0..=insert_from).rev() {
            let m = if l == 0 {
                self.params.m_max0
            } else {
                self.params.m
            };

            let nearest =
                self.search_layer(&vector, &[ep_id], self.params.ef_construction, l)?;

            let neighbors = Self::select_neighbors_simple(&nearest, m);

            if let Some(node) = &mut self.nodes[id] {
                if l < node.neighbors.len() {
                    node.neighbors[l] = neighbors.clone();
                }
            }

            // Add bidirectional connections
            for &neighbor_id in &neighbors {
                let needs_pruning = if let Some(neighbor_node) = &mut self.nodes[neighbor_id]
                {
                    if l < neighbor_node.neighbors.len() {
                        neighbor_node.neighbors[l].push(id);
                        neighbor_node.neighbors[l].len() > m
                    } else {
                        false
                    }
                } else {
                    false
                };

                // Prune in a separate step to avoid borrow conflicts
                if needs_pruning {
                    self.prune_neighbors(neighbor_id, l, m);
                }
            }

            if let Some(n) = nearest.first() {
                ep_id = n.id;
            }
        }

        // Update entry point if new node has a higher level
        if level > self.max_level {
            self.entry_point = Some(id);
            self.max_level = level;
        }

        Ok(())
    }

    /// SEARCH: Algorithm 5 from the HNSW paper.
    ///
    /// Returns the k nearest neighbors using `max(ef_search, k)` candidates,
    /// sorted ascending by distance.
    pub fn search_knn(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let entry_point = match self.entry_point {
            Some(ep) => ep,
            None => return Ok(vec![]),
        };

        let mut ep_id = entry_point;

        // Phase 1: Greedy descent from top layer to layer 1 (ef=1)
        for l in (1..=self.max_level).rev() {
            let nearest = self.search_layer(query, &[ep_id], 1, l)?;
            if let Some(n) = nearest.first() {
                ep_id = n.id;
            }
        }

        // Phase 2: Search layer 0 with max(ef, k) candidates
        let ef_actual = self.params.ef_search.max(k);
        let mut results = self.search_layer(query, &[ep_id], ef_actual, 0)?;

        results.truncate(k);
        Ok(results)
    }

    /// Clone the persistable graph state.
    pub(crate) fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            entry_point: self.entry_point,
            max_level: self.max_level,
            count: self.count,
        }
    }

    /// Rebuild a graph from a snapshot plus the owner's configuration.
    pub(crate) fn restore(
        snapshot: GraphSnapshot,
        metric: DistanceMetric,
        params: HnswParams,
        max_elements: usize,
    ) -> Self {
        Self {
            nodes: snapshot.nodes,
            entry_point: snapshot.entry_point,
            max_level: snapshot.max_level,
            params,
            metric,
            rng: StdRng::from_entropy(),
            count: snapshot.count,
            max_elements: max_elements.max(snapshot.count),
        }
    }
}
