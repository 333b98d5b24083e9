// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Grid fill for everything the earlier phases left behind.
//!
//! Deliberately non-semantic: remaining vertices are taken in
//! `topo_order` and dropped onto a simple grid far above the spine and
//! component bands, so a run always terminates no matter how pathological
//! the graph is. Also assembles the final result object from the store.

use std::collections::BTreeMap;
use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::positioning::PositionCalculator;
use crate::engine::types::{Block, Placement, VertexStatus};
use crate::errors::{LayoutError, StoreError};
use crate::observability::progress::ProgressReporter;
use crate::traits::GraphStore;

const PHASE: &str = "fast_placement";

/// First layer of the residual grid.
pub const GRID_START_LAYER: i64 = 50;
/// First level of the residual grid.
pub const GRID_START_LEVEL: i64 = 20;
/// Vertices per layer before wrapping to the next level.
pub const GRID_NODES_PER_LAYER: i64 = 15;
/// Rows written per store batch.
pub const GRID_WRITE_BATCH: usize = 5000;

/// Grid slot of the `i`-th remaining vertex.
pub fn grid_slot(index: u64) -> (i64, i64) {
    let i = index as i64;
    (
        GRID_START_LAYER + i % GRID_NODES_PER_LAYER,
        GRID_START_LEVEL + i / GRID_NODES_PER_LAYER,
    )
}

/// Place all remaining unprocessed vertices. Returns the number placed.
pub async fn run(
    store: &dyn GraphStore,
    chunk_size: usize,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<u64, LayoutError> {
    let phase_err = |source: StoreError| LayoutError::phase(PHASE, source);
    let calculator = PositionCalculator::default();

    let remaining = store
        .remaining_unplaced(chunk_size)
        .await
        .map_err(phase_err)?;
    if remaining.is_empty() {
        info!("no remaining vertices to fast-place");
        return Ok(0);
    }
    let total = remaining.len() as u64;
    info!(remaining = total, "fast-placing remaining vertices on the grid");

    let placements: Vec<Placement> = remaining
        .iter()
        .enumerate()
        .map(|(i, vertex)| {
            let (layer, level) = grid_slot(i as u64);
            let (x, y) = calculator.coordinates(layer, level);
            Placement {
                uid: vertex.uid.clone(),
                layer,
                level,
                x,
                y,
            }
        })
        .collect();

    let mut placed = 0u64;
    for batch in placements.chunks(GRID_WRITE_BATCH) {
        if cancel.is_cancelled() {
            return Err(LayoutError::Cancelled { phase: PHASE });
        }
        placed += store
            .write_placements(batch, VertexStatus::Placed)
            .await
            .map_err(phase_err)?;
        progress.emit(
            PHASE,
            "grid",
            placed,
            total,
            None,
            0,
            store.operation_count(),
        );
    }
    info!(placed, "fast placement completed");
    Ok(placed)
}

/// Collect the laid-out graph into result collections: blocks in
/// `topo_order`, a uid-to-layer map, and a level-to-uids map.
pub async fn collect_result(
    store: &dyn GraphStore,
    chunk_size: usize,
) -> Result<
    (
        Vec<Block>,
        HashMap<String, i64>,
        BTreeMap<i64, Vec<String>>,
    ),
    StoreError,
> {
    let blocks = store.layout_blocks(chunk_size).await?;
    let mut layers = HashMap::with_capacity(blocks.len());
    let mut levels: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for block in &blocks {
        layers.insert(block.id.clone(), block.layer);
        levels.entry(block.level).or_default().push(block.id.clone());
    }
    Ok((blocks, layers, levels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraphStore;
    use crate::observability::progress::{NullSink, ProgressReporter};
    use std::time::Duration;

    fn reporter() -> ProgressReporter {
        ProgressReporter::with_throttle(NullSink, Duration::ZERO)
    }

    #[test]
    fn grid_wraps_every_fifteen_vertices() {
        assert_eq!(grid_slot(0), (50, 20));
        assert_eq!(grid_slot(14), (64, 20));
        assert_eq!(grid_slot(15), (50, 21));
        assert_eq!(grid_slot(31), (51, 22));
    }

    #[tokio::test]
    async fn remaining_vertices_fill_the_grid_in_topo_order() {
        let store = MemoryGraphStore::new();
        store.add_edge("b", "c");
        store.add_edge("a", "b");
        // give them explicit topological orders out of uid order
        store
            .assign_fallback_orders(
                &["c".to_string(), "a".to_string(), "b".to_string()],
                0,
            )
            .await
            .unwrap();

        let placed = run(&store, 100, &reporter(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(placed, 3);

        // topo order c(0) < a(1) < b(2) drives grid order
        let c = store.snapshot("c").unwrap();
        let a = store.snapshot("a").unwrap();
        let b = store.snapshot("b").unwrap();
        assert_eq!((c.layer, c.level), (Some(50), Some(20)));
        assert_eq!((a.layer, a.level), (Some(51), Some(20)));
        assert_eq!((b.layer, b.level), (Some(52), Some(20)));
        assert_eq!(c.status, VertexStatus::Placed);
        assert_eq!(c.x, Some(50.0 * 240.0));
        assert_eq!(c.y, Some(20.0 * 130.0));
    }

    #[tokio::test]
    async fn isolated_vertices_are_skipped_when_excluded() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        store.add_vertex("island");

        let placed = run(&store, 100, &reporter(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(placed, 2);
        assert_eq!(
            store.snapshot("island").unwrap().status,
            VertexStatus::Unprocessed
        );
    }

    #[tokio::test]
    async fn result_collections_group_by_layer_and_level() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        run(&store, 100, &reporter(), &CancellationToken::new())
            .await
            .unwrap();

        let (blocks, layers, levels) = collect_result(&store, 100).await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(layers["a"], 50);
        assert_eq!(layers["b"], 51);
        assert_eq!(levels[&20], vec!["a".to_string(), "b".to_string()]);
    }
}
