// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory [`GraphStore`] backend.
//!
//! Implements the full store contract over plain collections so the
//! engine can be exercised end to end without a database. Semantics
//! mirror the Cypher implementation, including the determinism contract:
//! vertices are kept in a `BTreeMap`, so every enumeration is in `uid`
//! order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::engine::positioning::{LAYER_SPACING, PATH_Y_DELTA};
use crate::engine::types::{
    Block, GraphStatistics, PinnedVertex, Placement, RemainingVertex, VertexStatus,
};
use crate::errors::StoreError;
use crate::traits::GraphStore;

#[derive(Debug, Clone)]
struct VertexRecord {
    status: VertexStatus,
    layer: Option<i64>,
    level: Option<i64>,
    x: Option<f64>,
    y: Option<f64>,
    topo_order: Option<i64>,
    in_deg: Option<i64>,
    visited: Option<bool>,
    is_pinned: bool,
    level_target: Option<i64>,
}

impl Default for VertexRecord {
    fn default() -> Self {
        VertexRecord {
            status: VertexStatus::Unprocessed,
            layer: None,
            level: None,
            x: None,
            y: None,
            topo_order: None,
            in_deg: None,
            visited: None,
            is_pinned: false,
            level_target: None,
        }
    }
}

/// Observable state of one vertex, for assertions.
#[derive(Debug, Clone)]
pub struct VertexSnapshot {
    pub uid: String,
    pub status: VertexStatus,
    pub layer: Option<i64>,
    pub level: Option<i64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub topo_order: Option<i64>,
    pub is_pinned: bool,
}

#[derive(Debug, Default)]
struct Inner {
    vertices: BTreeMap<String, VertexRecord>,
    edges: Vec<(String, String)>,
    sync_markers: BTreeMap<u32, (u32, bool)>,
}

impl Inner {
    fn incident(&self, uid: &str) -> bool {
        self.edges.iter().any(|(a, b)| a == uid || b == uid)
    }

    fn incoming_count(&self, uid: &str) -> i64 {
        self.edges.iter().filter(|(_, b)| b == uid).count() as i64
    }

    fn successors(&self, uid: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .edges
            .iter()
            .filter(|(a, _)| a == uid)
            .map(|(_, b)| b.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    fn predecessors(&self, uid: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .edges
            .iter()
            .filter(|(_, b)| b == uid)
            .map(|(a, _)| a.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    fn undirected_neighbours(&self, uid: &str) -> Vec<String> {
        let mut out = self.successors(uid);
        out.extend(self.predecessors(uid));
        out.sort();
        out.dedup();
        out
    }

    fn occupied(&self, layer: i64, level: i64) -> bool {
        self.vertices.values().any(|v| {
            matches!(
                v.status,
                VertexStatus::Placed | VertexStatus::InLongestPath
            ) && v.layer == Some(layer)
                && v.level == Some(level)
        })
    }

    fn place_path(&mut self, path: &[String]) -> u64 {
        let mut placed = 0;
        for (i, uid) in path.iter().enumerate() {
            if let Some(v) = self.vertices.get_mut(uid) {
                let layer = i as i64;
                v.status = VertexStatus::InLongestPath;
                v.layer = Some(layer);
                v.level = Some(0);
                v.x = Some(layer as f64 * LAYER_SPACING);
                v.y = Some(i as f64 * PATH_Y_DELTA);
                placed += 1;
            }
        }
        placed
    }

    /// Longest simple path by exhaustive DFS. Fine for the graph sizes
    /// this backend is meant for.
    fn longest_path(&self, depth_cap: Option<usize>) -> Vec<String> {
        let mut best = Vec::new();
        for start in self.vertices.keys() {
            let mut current = vec![start.clone()];
            let mut on_path: BTreeSet<String> = current.iter().cloned().collect();
            self.extend_path(&mut current, &mut on_path, &mut best, depth_cap);
        }
        if best.len() < 2 {
            Vec::new()
        } else {
            best
        }
    }

    fn extend_path(
        &self,
        current: &mut Vec<String>,
        on_path: &mut BTreeSet<String>,
        best: &mut Vec<String>,
        depth_cap: Option<usize>,
    ) {
        if current.len() > best.len() {
            *best = current.clone();
        }
        if let Some(cap) = depth_cap {
            if current.len() > cap {
                return;
            }
        }
        let tail = current.last().expect("path never empty").clone();
        for next in self.successors(&tail) {
            if on_path.contains(&next) {
                continue;
            }
            current.push(next.clone());
            on_path.insert(next.clone());
            self.extend_path(current, on_path, best, depth_cap);
            on_path.remove(&next);
            current.pop();
        }
    }

    /// Undirected reachability among unprocessed vertices, optionally
    /// bounded by hop count.
    fn unprocessed_reachable(&self, seed: &str, max_hops: Option<u32>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        seen.insert(seed.to_string());
        let mut queue = VecDeque::new();
        queue.push_back((seed.to_string(), 0u32));
        while let Some((uid, hops)) = queue.pop_front() {
            if let Some(cap) = max_hops {
                if hops >= cap {
                    continue;
                }
            }
            for next in self.undirected_neighbours(&uid) {
                let unprocessed = self
                    .vertices
                    .get(&next)
                    .map(|v| v.status == VertexStatus::Unprocessed)
                    .unwrap_or(false);
                if unprocessed && seen.insert(next.clone()) {
                    queue.push_back((next, hops + 1));
                }
            }
        }
        seen.into_iter().collect()
    }
}

pub struct MemoryGraphStore {
    inner: Mutex<Inner>,
    operations: AtomicU64,
    exclude_isolated: bool,
    wcc_available: bool,
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        MemoryGraphStore::new()
    }
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        MemoryGraphStore {
            inner: Mutex::new(Inner::default()),
            operations: AtomicU64::new(0),
            exclude_isolated: true,
            wcc_available: true,
        }
    }

    pub fn with_exclude_isolated(mut self, exclude: bool) -> Self {
        self.exclude_isolated = exclude;
        self
    }

    /// Simulate a deployment without the graph-data-science plugin.
    pub fn without_wcc(mut self) -> Self {
        self.wcc_available = false;
        self
    }

    pub fn add_vertex(&self, uid: &str) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.vertices.entry(uid.to_string()).or_default();
    }

    pub fn add_edge(&self, from: &str, to: &str) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.vertices.entry(from.to_string()).or_default();
        inner.vertices.entry(to.to_string()).or_default();
        inner.edges.push((from.to_string(), to.to_string()));
    }

    pub fn pin(&self, uid: &str, target_level: i64) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let record = inner.vertices.entry(uid.to_string()).or_default();
        record.is_pinned = true;
        record.level_target = Some(target_level);
    }

    pub fn edge_count(&self) -> usize {
        self.inner
            .lock()
            .expect("memory store lock poisoned")
            .edges
            .len()
    }

    pub fn snapshot(&self, uid: &str) -> Option<VertexSnapshot> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        inner.vertices.get(uid).map(|v| VertexSnapshot {
            uid: uid.to_string(),
            status: v.status,
            layer: v.layer,
            level: v.level,
            x: v.x,
            y: v.y,
            topo_order: v.topo_order,
            is_pinned: v.is_pinned,
        })
    }

    pub fn snapshots(&self) -> Vec<VertexSnapshot> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        inner
            .vertices
            .iter()
            .map(|(uid, v)| VertexSnapshot {
                uid: uid.clone(),
                status: v.status,
                layer: v.layer,
                level: v.level,
                x: v.x,
                y: v.y,
                topo_order: v.topo_order,
                is_pinned: v.is_pinned,
            })
            .collect()
    }

    fn op(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn statistics(&self) -> Result<GraphStatistics, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let node_count = inner.vertices.len() as u64;
        let edge_count = inner.edges.len() as u64;
        let pinned_count = inner.vertices.values().filter(|v| v.is_pinned).count() as u64;
        let density = if node_count > 1 {
            edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
        } else {
            0.0
        };
        let avg_degree = if node_count > 0 {
            2.0 * edge_count as f64 / node_count as f64
        } else {
            0.0
        };
        Ok(GraphStatistics {
            node_count,
            edge_count,
            pinned_count,
            density,
            avg_degree,
        })
    }

    async fn prepare_schema(&self) -> Result<(), StoreError> {
        self.op();
        Ok(())
    }

    async fn clear_layout(&self) -> Result<u64, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let count = inner.vertices.len() as u64;
        for v in inner.vertices.values_mut() {
            v.status = VertexStatus::Unprocessed;
            v.layer = None;
            v.level = None;
            v.x = None;
            v.y = None;
            v.topo_order = None;
            v.in_deg = None;
            v.visited = None;
        }
        Ok(count)
    }

    async fn clear_positions(&self) -> Result<u64, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let mut cleared = 0;
        for v in inner.vertices.values_mut() {
            if v.layer.is_some()
                || v.level.is_some()
                || v.x.is_some()
                || v.y.is_some()
                || v.status != VertexStatus::Unprocessed
            {
                cleared += 1;
            }
            v.status = VertexStatus::Unprocessed;
            v.layer = None;
            v.level = None;
            v.x = None;
            v.y = None;
        }
        Ok(cleared)
    }

    async fn remove_self_loops(&self) -> Result<u64, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let before = inner.edges.len();
        inner.edges.retain(|(a, b)| a != b);
        Ok((before - inner.edges.len()) as u64)
    }

    async fn dedupe_parallel_edges(&self) -> Result<u64, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let before = inner.edges.len();
        let mut grouped: BTreeMap<(String, String), Vec<(String, String)>> = BTreeMap::new();
        for edge in &inner.edges {
            let key = if edge.0 <= edge.1 {
                (edge.0.clone(), edge.1.clone())
            } else {
                (edge.1.clone(), edge.0.clone())
            };
            grouped.entry(key).or_default().push(edge.clone());
        }
        let mut kept = Vec::new();
        for (key, edges) in grouped {
            // keep the uid-ascending orientation when present
            let preferred = edges
                .iter()
                .find(|(a, _)| *a == key.0)
                .cloned()
                .unwrap_or_else(|| edges[0].clone());
            kept.push(preferred);
        }
        inner.edges = kept;
        Ok((before - inner.edges.len()) as u64)
    }

    async fn source_count(&self) -> Result<u64, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let count = inner
            .vertices
            .keys()
            .filter(|uid| inner.incoming_count(uid) == 0)
            .count() as u64;
        Ok(count)
    }

    async fn init_topo_batch(&self, batch_size: usize) -> Result<u64, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let pending: Vec<String> = inner
            .vertices
            .iter()
            .filter(|(uid, v)| v.topo_order.is_none() && inner.incident(uid))
            .map(|(uid, _)| uid.clone())
            .take(batch_size)
            .collect();
        for uid in &pending {
            let in_deg = inner.incoming_count(uid);
            let v = inner.vertices.get_mut(uid).expect("vertex exists");
            v.in_deg = Some(in_deg);
            v.topo_order = Some(-1);
            v.visited = Some(false);
        }
        Ok(pending.len() as u64)
    }

    async fn visit_next_wave(
        &self,
        batch_size: usize,
        first_order: i64,
    ) -> Result<u64, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let wave: Vec<String> = inner
            .vertices
            .iter()
            .filter(|(_, v)| v.in_deg == Some(0) && v.visited == Some(false))
            .map(|(uid, _)| uid.clone())
            .take(batch_size)
            .collect();
        for (i, uid) in wave.iter().enumerate() {
            let v = inner.vertices.get_mut(uid).expect("vertex exists");
            v.topo_order = Some(first_order + i as i64);
            v.visited = Some(true);
        }
        for uid in &wave {
            for succ in inner.successors(uid) {
                if let Some(v) = inner.vertices.get_mut(&succ) {
                    if v.visited == Some(false) {
                        v.in_deg = Some(v.in_deg.unwrap_or(0) - 1);
                    }
                }
            }
        }
        Ok(wave.len() as u64)
    }

    async fn unvisited_uids(&self) -> Result<Vec<String>, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .vertices
            .iter()
            .filter(|(_, v)| v.visited == Some(false))
            .map(|(uid, _)| uid.clone())
            .collect())
    }

    async fn assign_fallback_orders(
        &self,
        uids: &[String],
        first_order: i64,
    ) -> Result<(), StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        for (i, uid) in uids.iter().enumerate() {
            if let Some(v) = inner.vertices.get_mut(uid) {
                v.topo_order = Some(first_order + i as i64);
                v.visited = Some(true);
            }
        }
        Ok(())
    }

    async fn topo_violation_count(&self, fallback_start: i64) -> Result<u64, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let mut violations = 0;
        for (a, b) in &inner.edges {
            let (Some(u), Some(v)) = (
                inner.vertices.get(a).and_then(|v| v.topo_order),
                inner.vertices.get(b).and_then(|v| v.topo_order),
            ) else {
                continue;
            };
            if u < fallback_start && v < fallback_start && u >= v {
                violations += 1;
            }
        }
        Ok(violations)
    }

    async fn find_and_place_longest_path(&self) -> Result<Vec<String>, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let path = inner.longest_path(None);
        inner.place_path(&path);
        Ok(path)
    }

    async fn find_and_place_longest_path_bounded(
        &self,
        max_depth: u32,
        _root_cap: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let path = inner.longest_path(Some(max_depth as usize + 1));
        inner.place_path(&path);
        Ok(path)
    }

    async fn place_path(&self, path: &[String]) -> Result<u64, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.place_path(path))
    }

    async fn place_path_neighbours(&self) -> Result<u64, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let lp: Vec<String> = inner
            .vertices
            .iter()
            .filter(|(_, v)| v.status == VertexStatus::InLongestPath)
            .map(|(uid, _)| uid.clone())
            .collect();
        let lp_count = lp.len() as i64;
        let mut neighbours = BTreeSet::new();
        for uid in &lp {
            for n in inner.undirected_neighbours(uid) {
                let on_path = inner
                    .vertices
                    .get(&n)
                    .map(|v| v.status == VertexStatus::InLongestPath)
                    .unwrap_or(false);
                if !on_path {
                    neighbours.insert(n);
                }
            }
        }
        for (i, uid) in neighbours.iter().enumerate() {
            let layer = lp_count + i as i64;
            let v = inner.vertices.get_mut(uid).expect("vertex exists");
            v.status = VertexStatus::LpNeighbor;
            v.layer = Some(layer);
            v.level = Some(0);
            v.x = Some(layer as f64 * LAYER_SPACING);
            v.y = Some(i as f64 * PATH_Y_DELTA);
        }
        Ok(neighbours.len() as u64)
    }

    async fn path_neighbour_uids(&self) -> Result<Vec<String>, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let lp: Vec<String> = inner
            .vertices
            .iter()
            .filter(|(_, v)| v.status == VertexStatus::InLongestPath)
            .map(|(uid, _)| uid.clone())
            .collect();
        let mut neighbours = BTreeSet::new();
        for uid in &lp {
            for n in inner.undirected_neighbours(uid) {
                let on_path = inner
                    .vertices
                    .get(&n)
                    .map(|v| v.status == VertexStatus::InLongestPath)
                    .unwrap_or(false);
                if !on_path {
                    neighbours.insert(n);
                }
            }
        }
        Ok(neighbours.into_iter().collect())
    }

    async fn wcc_component_pairs(&self) -> Result<Vec<(String, i64)>, StoreError> {
        self.op();
        if !self.wcc_available {
            return Err(StoreError::Fatal("gds wcc routine unavailable".into()));
        }
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let mut assigned: BTreeMap<String, i64> = BTreeMap::new();
        let mut next_component = 0i64;
        let unprocessed: Vec<String> = inner
            .vertices
            .iter()
            .filter(|(uid, v)| {
                v.status == VertexStatus::Unprocessed
                    && (!self.exclude_isolated || inner.incident(uid))
            })
            .map(|(uid, _)| uid.clone())
            .collect();
        for seed in &unprocessed {
            if assigned.contains_key(seed) {
                continue;
            }
            let component = inner.unprocessed_reachable(seed, None);
            for uid in component {
                assigned.insert(uid, next_component);
            }
            next_component += 1;
        }
        let mut pairs: Vec<(String, i64)> = assigned
            .into_iter()
            .map(|(uid, comp)| (uid, comp))
            .collect();
        pairs.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
        Ok(pairs)
    }

    async fn expansion_components(&self, max_hops: u32) -> Result<Vec<Vec<String>>, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let unprocessed: Vec<String> = inner
            .vertices
            .iter()
            .filter(|(uid, v)| {
                v.status == VertexStatus::Unprocessed
                    && (!self.exclude_isolated || inner.incident(uid))
            })
            .map(|(uid, _)| uid.clone())
            .collect();
        Ok(unprocessed
            .iter()
            .map(|seed| inner.unprocessed_reachable(seed, Some(max_hops)))
            .collect())
    }

    async fn placed_neighbour_positions(
        &self,
        uids: &[String],
    ) -> Result<Vec<(i64, i64)>, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let mut positions = Vec::new();
        for uid in uids {
            for n in inner.undirected_neighbours(uid) {
                if let Some(v) = inner.vertices.get(&n) {
                    if matches!(
                        v.status,
                        VertexStatus::Placed | VertexStatus::InLongestPath
                    ) {
                        if let (Some(layer), Some(level)) = (v.layer, v.level) {
                            positions.push((layer, level));
                        }
                    }
                }
            }
        }
        Ok(positions)
    }

    async fn max_level_in_layer(&self, layer: i64) -> Result<Option<i64>, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .vertices
            .values()
            .filter(|v| {
                matches!(
                    v.status,
                    VertexStatus::Placed | VertexStatus::InLongestPath
                ) && v.layer == Some(layer)
            })
            .filter_map(|v| v.level)
            .max())
    }

    async fn position_occupied(&self, layer: i64, level: i64) -> Result<bool, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.occupied(layer, level))
    }

    async fn write_placements(
        &self,
        rows: &[Placement],
        status: VertexStatus,
    ) -> Result<u64, StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        let mut written = 0;
        for row in rows {
            if let Some(v) = inner.vertices.get_mut(&row.uid) {
                v.status = status;
                v.layer = Some(row.layer);
                v.level = Some(row.level);
                v.x = Some(row.x);
                v.y = Some(row.y);
                written += 1;
            }
        }
        Ok(written)
    }

    async fn remaining_unplaced(
        &self,
        _chunk_size: usize,
    ) -> Result<Vec<RemainingVertex>, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let mut remaining: Vec<RemainingVertex> = inner
            .vertices
            .iter()
            .filter(|(uid, v)| {
                v.status == VertexStatus::Unprocessed
                    && (!self.exclude_isolated || inner.incident(uid))
            })
            .map(|(uid, v)| RemainingVertex {
                uid: uid.clone(),
                topo_order: v.topo_order.unwrap_or(0),
            })
            .collect();
        remaining.sort_by(|a, b| (a.topo_order, &a.uid).cmp(&(b.topo_order, &b.uid)));
        Ok(remaining)
    }

    async fn pinned_vertices(&self) -> Result<Vec<PinnedVertex>, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .vertices
            .iter()
            .filter(|(_, v)| v.is_pinned)
            .map(|(uid, v)| PinnedVertex {
                uid: uid.clone(),
                target_level: v.level_target.or(v.level).unwrap_or(0),
            })
            .collect())
    }

    async fn apply_pinned_level(&self, uid: &str, level: i64, y: f64) -> Result<(), StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        if let Some(v) = inner.vertices.get_mut(uid) {
            v.status = VertexStatus::Pinned;
            v.level = Some(level);
            v.y = Some(y);
        }
        Ok(())
    }

    async fn layout_blocks(&self, _chunk_size: usize) -> Result<Vec<Block>, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        let mut rows: Vec<(i64, Block)> = inner
            .vertices
            .iter()
            .filter(|(uid, v)| {
                v.status.is_terminal() && (!self.exclude_isolated || inner.incident(uid))
            })
            .map(|(uid, v)| {
                (
                    v.topo_order.unwrap_or(0),
                    Block {
                        id: uid.clone(),
                        layer: v.layer.unwrap_or(0),
                        level: v.level.unwrap_or(0),
                        x: v.x.unwrap_or(0.0),
                        y: v.y.unwrap_or(0.0),
                        is_pinned: v.is_pinned,
                    },
                )
            })
            .collect();
        rows.sort_by(|a, b| (a.0, &a.1.id).cmp(&(b.0, &b.1.id)));
        Ok(rows.into_iter().map(|(_, block)| block).collect())
    }

    async fn mark_worker_complete(
        &self,
        worker_id: u32,
        total_workers: u32,
    ) -> Result<(), StoreError> {
        self.op();
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        inner.sync_markers.insert(worker_id, (total_workers, true));
        Ok(())
    }

    async fn completed_worker_count(&self, total_workers: u32) -> Result<u32, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .sync_markers
            .values()
            .filter(|(total, completed)| *total == total_workers && *completed)
            .count() as u32)
    }

    async fn master_completed(&self) -> Result<bool, StoreError> {
        self.op();
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .sync_markers
            .get(&0)
            .map(|(_, completed)| *completed)
            .unwrap_or(false))
    }

    fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sanitiser_semantics_match_the_contract() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "a");
        store.add_edge("a", "b");
        store.add_edge("a", "b");
        store.add_edge("a", "b");

        assert_eq!(store.remove_self_loops().await.unwrap(), 1);
        assert_eq!(store.dedupe_parallel_edges().await.unwrap(), 2);
        assert_eq!(store.edge_count(), 1);

        // a second pass changes nothing
        assert_eq!(store.remove_self_loops().await.unwrap(), 0);
        assert_eq!(store.dedupe_parallel_edges().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wave_visits_are_uid_ordered_and_decrement_successors() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "c");
        store.add_edge("b", "c");

        while store.init_topo_batch(10).await.unwrap() > 0 {}
        let visited = store.visit_next_wave(10, 0).await.unwrap();
        assert_eq!(visited, 2);
        assert_eq!(store.snapshot("a").unwrap().topo_order, Some(0));
        assert_eq!(store.snapshot("b").unwrap().topo_order, Some(1));

        let visited = store.visit_next_wave(10, 2).await.unwrap();
        assert_eq!(visited, 1);
        assert_eq!(store.snapshot("c").unwrap().topo_order, Some(2));
        assert_eq!(store.visit_next_wave(10, 3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn longest_path_is_found_and_placed() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        store.add_edge("b", "c");
        store.add_edge("a", "c");

        let path = store.find_and_place_longest_path().await.unwrap();
        assert_eq!(path, vec!["a", "b", "c"]);
        let b = store.snapshot("b").unwrap();
        assert_eq!(b.status, VertexStatus::InLongestPath);
        assert_eq!(b.layer, Some(1));
        assert_eq!(b.x, Some(240.0));
    }

    #[tokio::test]
    async fn wcc_groups_unprocessed_vertices_only() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        store.add_edge("c", "d");
        store.add_vertex("e");

        let pairs = store.wcc_component_pairs().await.unwrap();
        let components: BTreeSet<i64> = pairs.iter().map(|(_, c)| *c).collect();
        assert_eq!(components.len(), 2);
        // the isolated vertex is not part of the component universe
        assert!(pairs.iter().all(|(uid, _)| uid != "e"));

        // placing one pair removes it from the component universe
        store
            .write_placements(
                &[Placement {
                    uid: "a".into(),
                    layer: 0,
                    level: 0,
                    x: 0.0,
                    y: 0.0,
                }],
                VertexStatus::Placed,
            )
            .await
            .unwrap();
        let pairs = store.wcc_component_pairs().await.unwrap();
        assert!(pairs.iter().all(|(uid, _)| uid != "a"));
    }
}
