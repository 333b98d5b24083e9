// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Database-resident topological sorting.
//!
//! Kahn's algorithm expressed as batched store operations so memory use
//! stays bounded regardless of graph size: an initialisation loop seeds
//! `in_deg` per vertex, a wave loop visits zero-degree vertices in `uid`
//! order while decrementing their successors, and whatever remains
//! unvisited afterwards sits on a residual cycle and receives fallback
//! orders strictly above every proper order.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::{LayoutError, StoreError};
use crate::observability::progress::ProgressReporter;
use crate::traits::GraphStore;

const PHASE: &str = "toposort";

#[derive(Debug, Clone, Copy, Default)]
pub struct TopoOutcome {
    /// Vertices ordered through the proper wave loop.
    pub ordered: u64,
    /// Vertices ordered through the cycle fallback.
    pub fallback: u64,
    /// Wave-loop iterations (batches) executed.
    pub iterations: u64,
}

impl TopoOutcome {
    /// First order value handed to the fallback; every proper order is
    /// strictly below this.
    pub fn fallback_start(&self) -> i64 {
        self.ordered as i64
    }
}

pub async fn run(
    store: &dyn GraphStore,
    batch_size: usize,
    total_vertices: u64,
    progress: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<TopoOutcome, LayoutError> {
    let phase_err = |source: StoreError| LayoutError::phase(PHASE, source);

    // Seed in_deg / topo_order / visited in bounded batches.
    let mut initialised = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(LayoutError::Cancelled { phase: PHASE });
        }
        let batch = store.init_topo_batch(batch_size).await.map_err(phase_err)?;
        if batch == 0 {
            break;
        }
        initialised += batch;
        progress.emit(
            PHASE,
            "init",
            initialised,
            total_vertices,
            None,
            0,
            store.operation_count(),
        );
    }
    info!(initialised, "topological sort state initialised");

    // Wave loop: visit zero-degree batches until the frontier is empty.
    let mut outcome = TopoOutcome::default();
    let mut next_order = 0i64;
    loop {
        if cancel.is_cancelled() {
            return Err(LayoutError::Cancelled { phase: PHASE });
        }
        let visited = store
            .visit_next_wave(batch_size, next_order)
            .await
            .map_err(phase_err)?;
        if visited == 0 {
            break;
        }
        outcome.iterations += 1;
        outcome.ordered += visited;
        next_order += visited as i64;
        progress.emit(
            PHASE,
            "wave",
            outcome.ordered,
            initialised,
            Some(true),
            outcome.iterations,
            store.operation_count(),
        );
    }

    // Residual cycles: deterministic fallback numbering above every
    // proper order.
    let unvisited = store.unvisited_uids().await.map_err(phase_err)?;
    if !unvisited.is_empty() {
        warn!(
            cycle_vertices = unvisited.len(),
            "residual cycles detected, assigning fallback orders"
        );
        for chunk in unvisited.chunks(batch_size) {
            if cancel.is_cancelled() {
                return Err(LayoutError::Cancelled { phase: PHASE });
            }
            store
                .assign_fallback_orders(chunk, next_order)
                .await
                .map_err(phase_err)?;
            next_order += chunk.len() as i64;
            outcome.fallback += chunk.len() as u64;
        }
    }

    info!(
        ordered = outcome.ordered,
        fallback = outcome.fallback,
        iterations = outcome.iterations,
        "topological sort completed"
    );
    Ok(outcome)
}

/// Optional assertion pass: every proper-ordered edge must ascend.
pub async fn validate(
    store: &dyn GraphStore,
    outcome: &TopoOutcome,
) -> Result<(), LayoutError> {
    let fallback_start = if outcome.fallback > 0 {
        outcome.fallback_start()
    } else {
        i64::MAX
    };
    let violations = store
        .topo_violation_count(fallback_start)
        .await
        .map_err(|e| LayoutError::phase(PHASE, e))?;
    if violations > 0 {
        return Err(LayoutError::phase(
            PHASE,
            StoreError::Fatal(format!(
                "{violations} edges violate the topological order"
            )),
        ));
    }
    Ok(())
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

    async fn sort(store: &MemoryGraphStore, batch: usize) -> TopoOutcome {
        run(store, batch, 0, &reporter(), &CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn dag_orders_respect_every_edge() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        store.add_edge("a", "c");
        store.add_edge("b", "d");
        store.add_edge("c", "d");

        let outcome = sort(&store, 2).await;
        assert_eq!(outcome.ordered, 4);
        assert_eq!(outcome.fallback, 0);

        let order = |uid: &str| store.snapshot(uid).unwrap().topo_order.unwrap();
        assert!(order("a") < order("b"));
        assert!(order("a") < order("c"));
        assert!(order("b") < order("d"));
        assert!(order("c") < order("d"));

        validate(&store, &outcome).await.unwrap();
    }

    #[tokio::test]
    async fn tiny_batches_still_cover_everything() {
        let store = MemoryGraphStore::new();
        for i in 0..9 {
            store.add_edge(&format!("v{i}"), &format!("v{}", i + 1));
        }
        let outcome = sort(&store, 1).await;
        assert_eq!(outcome.ordered, 10);
        assert!(outcome.iterations >= 10);
        validate(&store, &outcome).await.unwrap();
    }

    #[tokio::test]
    async fn cycle_vertices_get_orders_above_all_proper_orders() {
        let store = MemoryGraphStore::new();
        // a -> b feeds a 3-cycle c -> d -> e -> c
        store.add_edge("a", "b");
        store.add_edge("c", "d");
        store.add_edge("d", "e");
        store.add_edge("e", "c");

        let outcome = sort(&store, 10).await;
        assert_eq!(outcome.ordered, 2);
        assert_eq!(outcome.fallback, 3);

        let order = |uid: &str| store.snapshot(uid).unwrap().topo_order.unwrap();
        let proper_max = order("a").max(order("b"));
        for uid in ["c", "d", "e"] {
            assert!(order(uid) > proper_max);
        }
        // fallback orders are uid-ordered and consecutive
        assert_eq!(order("c") + 1, order("d"));
        assert_eq!(order("d") + 1, order("e"));

        validate(&store, &outcome).await.unwrap();
    }

    #[tokio::test]
    async fn isolated_vertices_are_not_ordered() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        store.add_vertex("lonely");

        sort(&store, 10).await;
        assert_eq!(store.snapshot("lonely").unwrap().topo_order, None);
        assert!(store.snapshot("a").unwrap().topo_order.is_some());
    }

    #[tokio::test]
    async fn cancellation_surfaces_as_cancelled_error() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run(&store, 10, 0, &reporter(), &cancel).await;
        assert!(matches!(result, Err(LayoutError::Cancelled { .. })));
    }
}
