// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Longest-path spine and neighbour placement.
//!
//! The spine is the one semantically meaningful path computation in the
//! system: a maximum-length simple path laid onto consecutive layers at
//! level 0. Finding and placing happen in a single store operation to
//! avoid shipping the path across the wire twice; the path is cached so
//! a re-run can re-apply the placement without recomputing it.

use std::sync::Mutex;

use tracing::{info, warn};

use crate::engine::positioning::{PositionCalculator, PATH_Y_DELTA};
use crate::engine::types::{Placement, VertexStatus};
use crate::errors::StoreError;
use crate::traits::GraphStore;

/// Depth cap for the bounded fallback search.
pub const FALLBACK_MAX_DEPTH: u32 = 15;
/// Root cap for the bounded fallback search.
pub const FALLBACK_ROOT_CAP: usize = 100;

pub struct LongestPathProcessor {
    calculator: PositionCalculator,
    cache: Mutex<Vec<String>>,
}

impl Default for LongestPathProcessor {
    fn default() -> Self {
        LongestPathProcessor::new()
    }
}

impl LongestPathProcessor {
    pub fn new() -> Self {
        LongestPathProcessor {
            calculator: PositionCalculator::default(),
            cache: Mutex::new(Vec::new()),
        }
    }

    pub fn cached_path(&self) -> Vec<String> {
        self.cache.lock().expect("path cache lock poisoned").clone()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().expect("path cache lock poisoned").clear();
    }

    /// Find and place the longest path. Clears stale positions first so
    /// repeated runs never collide with leftover placements. When a path
    /// is already cached the placement is re-applied without a search.
    pub async fn find_and_place(&self, store: &dyn GraphStore) -> Result<Vec<String>, StoreError> {
        let cached = self.cached_path();
        if !cached.is_empty() {
            info!(length = cached.len(), "re-applying cached longest path");
            store.clear_positions().await?;
            store.place_path(&cached).await?;
            return Ok(cached);
        }

        store.clear_positions().await?;

        let mut path = store.find_and_place_longest_path().await?;
        if path.is_empty() {
            warn!(
                "full longest-path search found nothing, trying bounded search \
                 (depth <= {FALLBACK_MAX_DEPTH}, {FALLBACK_ROOT_CAP} roots)"
            );
            path = store
                .find_and_place_longest_path_bounded(FALLBACK_MAX_DEPTH, FALLBACK_ROOT_CAP)
                .await?;
        }

        if path.is_empty() {
            warn!("no longest path found, spine phase leaves the graph untouched");
        } else {
            info!(length = path.len(), "longest path found and placed");
        }

        *self.cache.lock().expect("path cache lock poisoned") = path.clone();
        Ok(path)
    }

    /// Place every direct neighbour of the spine on consecutive layers
    /// after it, level 0. The combined store operation is preferred; when
    /// it is unavailable the discovery and placement halves run here.
    pub async fn place_neighbours(&self, store: &dyn GraphStore) -> Result<u64, StoreError> {
        match store.place_path_neighbours().await {
            Ok(placed) => {
                info!(placed, "longest-path neighbours placed store-side");
                Ok(placed)
            }
            Err(e) => {
                warn!(error = %e, "store-side neighbour placement failed, using local fallback");
                self.place_neighbours_fallback(store).await
            }
        }
    }

    async fn place_neighbours_fallback(
        &self,
        store: &dyn GraphStore,
    ) -> Result<u64, StoreError> {
        let neighbours = store.path_neighbour_uids().await?;
        if neighbours.is_empty() {
            return Ok(0);
        }
        let start_layer = self.cached_path().len() as i64;
        let placements: Vec<Placement> = neighbours
            .iter()
            .enumerate()
            .map(|(i, uid)| {
                let layer = start_layer + i as i64;
                let (x, _) = self.calculator.coordinates(layer, 0);
                Placement {
                    uid: uid.clone(),
                    layer,
                    level: 0,
                    x,
                    y: i as f64 * PATH_Y_DELTA,
                }
            })
            .collect();
        let placed = store
            .write_placements(&placements, VertexStatus::LpNeighbor)
            .await?;
        info!(placed, "longest-path neighbours placed via fallback");
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraphStore;

    fn chain(store: &MemoryGraphStore, uids: &[&str]) {
        for pair in uids.windows(2) {
            store.add_edge(pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn spine_layers_ascend_from_source_to_sink() {
        let store = MemoryGraphStore::new();
        chain(&store, &["a", "b", "c", "d"]);
        store.add_edge("a", "d"); // shortcut loses to the chain

        let processor = LongestPathProcessor::new();
        let path = processor.find_and_place(&store).await.unwrap();
        assert_eq!(path, vec!["a", "b", "c", "d"]);

        for (i, uid) in path.iter().enumerate() {
            let v = store.snapshot(uid).unwrap();
            assert_eq!(v.status, VertexStatus::InLongestPath);
            assert_eq!(v.layer, Some(i as i64));
            assert_eq!(v.level, Some(0));
            assert_eq!(v.x, Some(i as f64 * 240.0));
        }
    }

    #[tokio::test]
    async fn second_call_reuses_the_cache() {
        let store = MemoryGraphStore::new();
        chain(&store, &["a", "b", "c"]);

        let processor = LongestPathProcessor::new();
        let first = processor.find_and_place(&store).await.unwrap();
        let ops_after_first = store.operation_count();
        let second = processor.find_and_place(&store).await.unwrap();
        assert_eq!(first, second);
        // cached pass issues clear + place, never a search
        assert_eq!(store.operation_count() - ops_after_first, 2);
    }

    #[tokio::test]
    async fn neighbours_line_up_after_the_spine() {
        let store = MemoryGraphStore::new();
        chain(&store, &["a", "b", "c"]);
        store.add_edge("x", "b"); // predecessor of the spine
        store.add_edge("b", "y"); // successor of the spine

        let processor = LongestPathProcessor::new();
        let path = processor.find_and_place(&store).await.unwrap();
        assert_eq!(path.len(), 3);
        let placed = processor.place_neighbours(&store).await.unwrap();
        assert_eq!(placed, 2);

        let x = store.snapshot("x").unwrap();
        let y = store.snapshot("y").unwrap();
        assert_eq!(x.status, VertexStatus::LpNeighbor);
        assert_eq!(y.status, VertexStatus::LpNeighbor);
        // uid order: x before y, layers 3 and 4
        assert_eq!(x.layer, Some(3));
        assert_eq!(y.layer, Some(4));
        assert_eq!(x.level, Some(0));
        assert_eq!(y.level, Some(0));
    }

    #[tokio::test]
    async fn empty_graph_places_nothing() {
        let store = MemoryGraphStore::new();
        let processor = LongestPathProcessor::new();
        let path = processor.find_and_place(&store).await.unwrap();
        assert!(path.is_empty());
        assert_eq!(processor.place_neighbours(&store).await.unwrap(), 0);
    }
}
