// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph sanitising: self-loop and parallel-edge removal plus the
//! acyclicity check.
//!
//! Two store operations do the cleanup; the check afterwards only counts
//! source vertices. A graph with no sources is fully cyclic, which is
//! logged once and tolerated — the topological sorter numbers residual
//! cycles through its fallback.

use tracing::info;

use crate::errors::StoreError;
use crate::observability::messages::engine::CycleWarning;
use crate::observability::messages::StructuredLog;
use crate::traits::GraphStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct SanitizeOutcome {
    pub removed_self_loops: u64,
    pub removed_parallel_edges: u64,
    pub source_count: u64,
}

impl SanitizeOutcome {
    pub fn removed_edges(&self) -> u64 {
        self.removed_self_loops + self.removed_parallel_edges
    }
}

pub async fn run(store: &dyn GraphStore) -> Result<SanitizeOutcome, StoreError> {
    let removed_self_loops = store.remove_self_loops().await?;
    let removed_parallel_edges = store.dedupe_parallel_edges().await?;
    info!(
        self_loops = removed_self_loops,
        parallel_edges = removed_parallel_edges,
        "sanitiser removed loops and duplicates"
    );

    let source_count = store.source_count().await?;
    if source_count == 0 {
        let node_count = store.statistics().await?.node_count;
        if node_count > 0 {
            CycleWarning { node_count }.log();
        }
    } else {
        info!(source_count, "graph has source vertices, acyclicity plausible");
    }

    Ok(SanitizeOutcome {
        removed_self_loops,
        removed_parallel_edges,
        source_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraphStore;

    #[tokio::test]
    async fn removes_loops_and_duplicates_then_counts_sources() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "a");
        store.add_edge("a", "b");
        store.add_edge("a", "b");
        store.add_edge("b", "c");

        let outcome = run(&store).await.unwrap();
        assert_eq!(outcome.removed_self_loops, 1);
        assert_eq!(outcome.removed_parallel_edges, 1);
        assert_eq!(outcome.removed_edges(), 2);
        // 'a' is the only vertex without incoming edges
        assert_eq!(outcome.source_count, 1);
    }

    #[tokio::test]
    async fn sanitising_twice_changes_nothing() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        store.add_edge("a", "b");
        store.add_edge("b", "b");

        let first = run(&store).await.unwrap();
        assert_eq!(first.removed_edges(), 2);
        let second = run(&store).await.unwrap();
        assert_eq!(second.removed_edges(), 0);
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn pure_cycle_keeps_its_edges() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        store.add_edge("b", "c");
        store.add_edge("c", "a");

        let outcome = run(&store).await.unwrap();
        assert_eq!(outcome.removed_edges(), 0);
        assert_eq!(outcome.source_count, 0);
        assert_eq!(store.edge_count(), 3);
    }
}
