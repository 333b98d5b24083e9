// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-to-end scenarios: the full pipeline against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{Capabilities, Settings};
use crate::engine::positioning::{LAYER_SPACING, LEVEL_SPACING};
use crate::engine::types::{LayoutResult, VertexStatus};
use crate::engine::IncrementalLayoutEngine;
use crate::graph::MemoryGraphStore;
use crate::observability::progress::{NullSink, ProgressReporter};
use crate::traits::GraphStore;

fn engine_for(store: Arc<MemoryGraphStore>, settings: Settings) -> IncrementalLayoutEngine {
    IncrementalLayoutEngine::new(
        store,
        settings,
        Capabilities::native(),
        ProgressReporter::with_throttle(NullSink, Duration::ZERO),
    )
}

async fn run_layout(store: Arc<MemoryGraphStore>) -> LayoutResult {
    engine_for(store, Settings::default())
        .run(CancellationToken::new())
        .await
}

#[tokio::test]
async fn empty_graph_succeeds_with_no_blocks() {
    let store = Arc::new(MemoryGraphStore::new());
    let result = run_layout(store).await;
    assert!(result.success);
    assert!(result.blocks.is_empty());
    assert!(result.layers.is_empty());
    assert!(result.levels.is_empty());
    assert!(result.error.is_none());
}

#[tokio::test]
async fn single_edge_spans_two_layers() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    let result = run_layout(store.clone()).await;
    assert!(result.success);

    let a = store.snapshot("a").unwrap();
    let b = store.snapshot("b").unwrap();
    assert_eq!(a.layer, Some(0));
    assert_eq!(b.layer, Some(1));
    assert_eq!(a.level, Some(0));
    assert_eq!(b.level, Some(0));
    assert_eq!(a.x, Some(0.0));
    assert_eq!(b.x, Some(LAYER_SPACING));
    assert_eq!(result.blocks.len(), 2);
}

#[tokio::test]
async fn diamond_spine_takes_three_layers() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    store.add_edge("a", "c");
    store.add_edge("b", "d");
    store.add_edge("c", "d");
    let result = run_layout(store.clone()).await;
    assert!(result.success);
    assert_eq!(result.statistics.longest_path_length, 3);

    let a = store.snapshot("a").unwrap();
    let d = store.snapshot("d").unwrap();
    assert_eq!(a.layer, Some(0));
    assert!(d.layer.unwrap() >= 2);
    // every vertex is covered
    for uid in ["a", "b", "c", "d"] {
        assert!(store.snapshot(uid).unwrap().status.is_terminal());
    }
}

#[tokio::test]
async fn self_loop_is_removed_and_isolated_vertex_skipped() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "a");
    let result = run_layout(store.clone()).await;
    assert!(result.success);
    assert_eq!(store.edge_count(), 0);

    let a = store.snapshot("a").unwrap();
    assert_eq!(a.status, VertexStatus::Unprocessed);
    assert!(result.blocks.is_empty());
    assert_eq!(result.statistics.removed_edges, 1);
}

#[tokio::test]
async fn parallel_edges_collapse_to_single_edge_layout() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    store.add_edge("a", "b");
    store.add_edge("a", "b");
    let result = run_layout(store.clone()).await;
    assert!(result.success);
    assert_eq!(store.edge_count(), 1);
    assert_eq!(result.statistics.removed_edges, 2);

    // identical to the single-edge scenario
    let a = store.snapshot("a").unwrap();
    let b = store.snapshot("b").unwrap();
    assert_eq!(a.layer, Some(0));
    assert_eq!(b.layer, Some(1));
    assert_eq!(b.x, Some(LAYER_SPACING));
}

#[tokio::test]
async fn residual_cycle_gets_fallback_orders_and_full_coverage() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    store.add_edge("b", "c");
    store.add_edge("c", "a");
    let result = run_layout(store.clone()).await;
    assert!(result.success);
    // the cycle itself is neither a self-loop nor a parallel edge
    assert_eq!(store.edge_count(), 3);

    // every cycle vertex was ordered by the fallback and placed
    for uid in ["a", "b", "c"] {
        let v = store.snapshot(uid).unwrap();
        assert!(v.topo_order.is_some());
        assert!(v.status.is_terminal());
    }
    assert_eq!(result.blocks.len(), 3);
}

#[tokio::test]
async fn pinned_vertex_keeps_its_requested_level() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    store.add_edge("a", "c");
    store.add_edge("b", "d");
    store.add_edge("c", "d");
    store.pin("b", 4);
    let result = run_layout(store.clone()).await;
    assert!(result.success);
    assert_eq!(result.statistics.pinned_applied, 1);

    let b = store.snapshot("b").unwrap();
    assert_eq!(b.status, VertexStatus::Pinned);
    assert_eq!(b.level, Some(4));
    assert_eq!(b.y, Some(4.0 * LEVEL_SPACING));

    let block = result.blocks.iter().find(|block| block.id == "b").unwrap();
    assert!(block.is_pinned);
    assert_eq!(block.level, 4);
    assert_eq!(block.y, 520.0);
}

#[tokio::test]
async fn every_edge_having_vertex_ends_terminal() {
    let store = Arc::new(MemoryGraphStore::new());
    // a spine, a separate component, a cycle, and an isolated vertex
    store.add_edge("s1", "s2");
    store.add_edge("s2", "s3");
    store.add_edge("k1", "k2");
    store.add_edge("y1", "y2");
    store.add_edge("y2", "y1");
    store.add_vertex("island");

    let result = run_layout(store.clone()).await;
    assert!(result.success);

    for snapshot in store.snapshots() {
        if snapshot.uid == "island" {
            assert_eq!(snapshot.status, VertexStatus::Unprocessed);
        } else {
            assert!(
                snapshot.status.is_terminal(),
                "vertex {} left unprocessed",
                snapshot.uid
            );
        }
    }
}

#[tokio::test]
async fn coordinates_follow_the_grid_law() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    store.add_edge("c", "d");
    store.add_edge("e", "f");
    let result = run_layout(store.clone()).await;
    assert!(result.success);

    for block in &result.blocks {
        assert_eq!(block.x, block.layer as f64 * LAYER_SPACING);
        let snapshot = store.snapshot(&block.id).unwrap();
        // spine and neighbour vertices carry the deliberate y
        // perturbation; everything else sits exactly on the grid
        match snapshot.status {
            VertexStatus::InLongestPath | VertexStatus::LpNeighbor => {}
            _ => assert_eq!(block.y, block.level as f64 * LEVEL_SPACING),
        }
    }
}

#[tokio::test]
async fn topological_order_respects_edges_on_dags() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    store.add_edge("a", "c");
    store.add_edge("b", "d");
    store.add_edge("c", "d");
    store.add_edge("d", "e");
    let mut settings = Settings::default();
    settings.validate_topo_order = true;
    let result = engine_for(store.clone(), settings)
        .run(CancellationToken::new())
        .await;
    assert!(result.success);

    let order = |uid: &str| store.snapshot(uid).unwrap().topo_order.unwrap();
    for (u, v) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("d", "e")] {
        assert!(order(u) < order(v), "edge {u}->{v} out of order");
    }
}

#[tokio::test]
async fn repeated_runs_are_deterministic() {
    fn build() -> Arc<MemoryGraphStore> {
        let store = Arc::new(MemoryGraphStore::new());
        store.add_edge("a", "b");
        store.add_edge("b", "c");
        store.add_edge("x", "b");
        store.add_edge("p", "q");
        store.add_edge("q", "r");
        store.add_vertex("island");
        store
    }

    let first = run_layout(build()).await;
    let second = run_layout(build()).await;
    assert!(first.success && second.success);
    assert_eq!(first.blocks, second.blocks);
    assert_eq!(first.layers, second.layers);
    assert_eq!(first.levels, second.levels);
}

#[tokio::test]
async fn rerun_on_same_store_converges_to_the_same_layout() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    store.add_edge("b", "c");
    store.add_edge("x", "y");

    let first = run_layout(store.clone()).await;
    let second = run_layout(store.clone()).await;
    assert!(first.success && second.success);
    assert_eq!(first.blocks, second.blocks);
}

#[tokio::test]
async fn cancellation_yields_partial_failed_result() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = engine_for(store, Settings::default()).run(cancel).await;
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("cancelled"));
}

#[tokio::test]
async fn fast_placement_can_be_disabled() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    // a component the spine phases will not reach, far enough that the
    // 6-hop expansion still finds it as its own component
    store.add_edge("m", "n");

    let mut settings = Settings::default();
    settings.fast_placement = false;
    let result = engine_for(store.clone(), settings)
        .run(CancellationToken::new())
        .await;
    assert!(result.success);
    assert_eq!(result.statistics.fast_placed, 0);
    assert!(!result
        .statistics
        .phases
        .iter()
        .any(|phase| phase.name == "fast_placement"));
}

#[tokio::test(start_paused = true)]
async fn distributed_workers_cover_components_exactly_once() {
    let store = Arc::new(MemoryGraphStore::new());
    // several independent components so both workers own something
    for i in 0..6 {
        store.add_edge(&format!("c{i}x"), &format!("c{i}y"));
    }

    let mut settings0 = Settings::default();
    settings0.total_workers = 2;
    settings0.worker_id = 0;
    let mut settings1 = settings0.clone();
    settings1.worker_id = 1;

    let engine0 = engine_for(store.clone(), settings0);
    let engine1 = engine_for(store.clone(), settings1);

    let (r0, r1) = tokio::join!(
        engine0.run(CancellationToken::new()),
        engine1.run(CancellationToken::new()),
    );
    assert!(r0.success, "worker 0 failed: {:?}", r0.error);
    assert!(r1.success, "worker 1 failed: {:?}", r1.error);

    // union of both workers' writes covers every vertex exactly once
    for snapshot in store.snapshots() {
        assert!(snapshot.status.is_terminal(), "{} unplaced", snapshot.uid);
    }
    assert_eq!(store.completed_worker_count(2).await.unwrap(), 2);
}

#[tokio::test]
async fn wcc_free_deployments_fall_back_to_expansion() {
    let store = Arc::new(MemoryGraphStore::new().without_wcc());
    store.add_edge("a", "b");
    store.add_edge("m", "n");
    let result = run_layout(store.clone()).await;
    assert!(result.success);
    for snapshot in store.snapshots() {
        assert!(snapshot.status.is_terminal());
    }
}

#[tokio::test]
async fn statistics_report_phase_outcomes() {
    let store = Arc::new(MemoryGraphStore::new());
    store.add_edge("a", "b");
    let result = run_layout(store).await;
    assert!(result.success);

    let stats = &result.statistics;
    assert_eq!(stats.total_articles, 2);
    assert!(stats.db_operations > 0);
    assert!(stats.processing_time_secs >= 0.0);
    let names: Vec<&str> = stats.phases.iter().map(|p| p.name).collect();
    assert_eq!(
        names,
        vec![
            "initialize",
            "sanitize",
            "toposort",
            "longest_path",
            "lp_neighbors",
            "components",
            "fast_placement",
            "pinned",
        ]
    );
    assert!(stats.phases.iter().all(|p| p.success));
}
