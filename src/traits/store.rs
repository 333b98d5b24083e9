// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::engine::types::{
    Block, GraphStatistics, PinnedVertex, Placement, RemainingVertex, VertexStatus,
};
use crate::errors::StoreError;

/// Typed operation surface of the graph store.
///
/// Every layout phase talks to the store exclusively through this trait,
/// which keeps the phases free of query text and lets the test suite run
/// the whole engine against an in-memory backend. The production
/// implementation issues parameterised Cypher through the Bolt driver,
/// with every call wrapped by the circuit breaker and retry envelope.
///
/// Determinism contract: any operation that enumerates vertices does so in
/// `uid` order, and any operation that assigns indices assigns them in the
/// order of the list it was given.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ----- lifecycle ---------------------------------------------------

    /// Whole-graph counts used for planning and reporting.
    async fn statistics(&self) -> Result<GraphStatistics, StoreError>;

    /// Create the indexes the layout queries lean on. Safe to repeat.
    async fn prepare_schema(&self) -> Result<(), StoreError>;

    /// Reset every vertex to `unprocessed` and drop all layout and
    /// topological-sort state from previous runs. Returns affected rows.
    async fn clear_layout(&self) -> Result<u64, StoreError>;

    /// Drop positions and statuses only, leaving `topo_order` intact.
    /// Used by the longest-path phase to stay idempotent against stale
    /// placements without discarding the sort.
    async fn clear_positions(&self) -> Result<u64, StoreError>;

    // ----- sanitising --------------------------------------------------

    /// Delete every edge whose endpoints are the same vertex.
    async fn remove_self_loops(&self) -> Result<u64, StoreError>;

    /// For every unordered vertex pair carrying more than one edge, keep
    /// exactly one and delete the rest.
    async fn dedupe_parallel_edges(&self) -> Result<u64, StoreError>;

    /// Number of vertices with in-degree zero. Zero sources on a
    /// non-empty graph means every vertex sits on a cycle.
    async fn source_count(&self) -> Result<u64, StoreError>;

    // ----- topological sorting ----------------------------------------

    /// Initialise sort state (`in_deg`, `topo_order = -1`, `visited =
    /// false`) for up to `batch_size` not-yet-initialised vertices with at
    /// least one incident edge. Returns how many were initialised; zero
    /// means initialisation is complete.
    async fn init_topo_batch(&self, batch_size: usize) -> Result<u64, StoreError>;

    /// Visit one wavefront batch: up to `batch_size` vertices with
    /// `in_deg = 0` and not yet visited, in `uid` order, receive
    /// consecutive orders starting at `first_order`, are marked visited,
    /// and have their unvisited successors' `in_deg` decremented. Returns
    /// the number visited; zero means the wavefront is exhausted.
    async fn visit_next_wave(
        &self,
        batch_size: usize,
        first_order: i64,
    ) -> Result<u64, StoreError>;

    /// Vertices still unvisited after the wave loop (residual cycles),
    /// in `uid` order.
    async fn unvisited_uids(&self) -> Result<Vec<String>, StoreError>;

    /// Assign consecutive orders starting at `first_order` to the given
    /// vertices, in the order given, and mark them visited.
    async fn assign_fallback_orders(
        &self,
        uids: &[String],
        first_order: i64,
    ) -> Result<(), StoreError>;

    /// Count edges `u -> v` with `u.topo_order >= v.topo_order` where both
    /// orders are proper (below `fallback_start`).
    async fn topo_violation_count(&self, fallback_start: i64) -> Result<u64, StoreError>;

    // ----- longest path ------------------------------------------------

    /// Find one maximum-length simple path and place it in the same
    /// operation: vertex `i` gets layer `i`, level 0, status
    /// `in_longest_path`, coordinates per the spacing constants. Returns
    /// the path uids in source-to-sink order.
    async fn find_and_place_longest_path(&self) -> Result<Vec<String>, StoreError>;

    /// Bounded variant used when the full search exceeds resource
    /// limits: search paths of at most `max_depth` edges ending at one of
    /// at most `root_cap` sink vertices (out-degree zero).
    async fn find_and_place_longest_path_bounded(
        &self,
        max_depth: u32,
        root_cap: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Re-apply the longest-path placement for an already-known path.
    async fn place_path(&self, path: &[String]) -> Result<u64, StoreError>;

    /// Discover and place every direct neighbour of the placed path in a
    /// single operation: consecutive layers after the path end, level 0,
    /// status `lp_neighbor`. Returns the number placed.
    async fn place_path_neighbours(&self) -> Result<u64, StoreError>;

    /// Discovery half of the neighbour placement, for stores where the
    /// combined statement is unavailable. Returns neighbour uids in `uid`
    /// order.
    async fn path_neighbour_uids(&self) -> Result<Vec<String>, StoreError>;

    // ----- components --------------------------------------------------

    /// Weakly connected components over the still-unprocessed subgraph
    /// via the store's graph-data-science routine. Isolated vertices are
    /// left out when the store excludes them from layout. Returns
    /// `(uid, component id)` pairs ordered by component then uid.
    async fn wcc_component_pairs(&self) -> Result<Vec<(String, i64)>, StoreError>;

    /// Fallback discovery: for each eligible unprocessed seed (in `uid`
    /// order), the unprocessed vertices reachable within `max_hops`
    /// undirected hops, seed included. Overlapping groups are
    /// deduplicated by the caller.
    async fn expansion_components(&self, max_hops: u32) -> Result<Vec<Vec<String>>, StoreError>;

    /// Grid slots of already-placed direct neighbours of the given
    /// vertices.
    async fn placed_neighbour_positions(
        &self,
        uids: &[String],
    ) -> Result<Vec<(i64, i64)>, StoreError>;

    /// Highest occupied level in a layer, if any.
    async fn max_level_in_layer(&self, layer: i64) -> Result<Option<i64>, StoreError>;

    /// Whether a grid slot is already taken by a placed vertex.
    async fn position_occupied(&self, layer: i64, level: i64) -> Result<bool, StoreError>;

    /// Write a batch of placements with the given status. The store
    /// splits oversized inputs into its configured write batches.
    async fn write_placements(
        &self,
        rows: &[Placement],
        status: VertexStatus,
    ) -> Result<u64, StoreError>;

    // ----- fast placement & result ------------------------------------

    /// All still-unprocessed vertices eligible for layout, ordered by
    /// `topo_order` then uid. Paged internally by `chunk_size`.
    async fn remaining_unplaced(
        &self,
        chunk_size: usize,
    ) -> Result<Vec<RemainingVertex>, StoreError>;

    /// All pinned vertices and their requested levels.
    async fn pinned_vertices(&self) -> Result<Vec<PinnedVertex>, StoreError>;

    /// Force a pinned vertex onto its requested level.
    async fn apply_pinned_level(&self, uid: &str, level: i64, y: f64) -> Result<(), StoreError>;

    /// Every laid-out vertex as a result block, ordered by `topo_order`
    /// then uid. Paged internally by `chunk_size`.
    async fn layout_blocks(&self, chunk_size: usize) -> Result<Vec<Block>, StoreError>;

    // ----- worker rendezvous ------------------------------------------

    /// Persist this worker's completion marker.
    async fn mark_worker_complete(
        &self,
        worker_id: u32,
        total_workers: u32,
    ) -> Result<(), StoreError>;

    /// Number of completion markers for a run of `total_workers`.
    async fn completed_worker_count(&self, total_workers: u32) -> Result<u32, StoreError>;

    /// Whether the master worker has marked completion.
    async fn master_completed(&self) -> Result<bool, StoreError>;

    // ----- accounting --------------------------------------------------

    /// Monotonic count of store operations issued so far.
    fn operation_count(&self) -> u64;
}
