// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! [`GraphStore`] implemented over the Bolt client.
//!
//! Each trait operation is a parameterised Cypher statement (or a short
//! sequence of them) issued through the retry envelope, with the circuit
//! breaker wrapping every call. Query text is produced by the builder
//! functions at the bottom of this file so the relationship type chosen
//! by the capability probe is interpolated in exactly one place.

use std::sync::Arc;

use async_trait::async_trait;
use neo4rs::query;

use crate::config::{Capabilities, Settings};
use crate::engine::positioning::{LAYER_SPACING, PATH_Y_DELTA};
use crate::engine::types::{
    Block, GraphStatistics, PinnedVertex, Placement, RemainingVertex, VertexStatus,
};
use crate::errors::StoreError;
use crate::graph::breaker::CircuitBreaker;
use crate::graph::client::{
    row_bool, row_f64, row_i64, row_opt_i64, row_string, row_string_vec, row_u64, Neo4jClient,
};
use crate::traits::GraphStore;

const WCC_PROJECTION: &str = "citemap_unplaced";

pub struct Neo4jGraphStore {
    client: Arc<Neo4jClient>,
    breaker: CircuitBreaker,
    edge_label: String,
    exclude_isolated: bool,
    batch_size: usize,
}

impl Neo4jGraphStore {
    pub fn new(client: Arc<Neo4jClient>, settings: &Settings, capabilities: &Capabilities) -> Self {
        Neo4jGraphStore {
            client,
            breaker: CircuitBreaker::from_settings(&settings.circuit_breaker),
            edge_label: capabilities.edge_label.clone(),
            exclude_isolated: settings.exclude_isolated_vertices,
            batch_size: settings.clamped_batch_size(),
        }
    }

    async fn single_count(&self, cypher: String, column: &str) -> Result<u64, StoreError> {
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || query(&cypher)))
            .await?;
        rows.first()
            .map(|r| row_u64(r, column))
            .transpose()
            .map(|v| v.unwrap_or(0))
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn statistics(&self) -> Result<GraphStatistics, StoreError> {
        self.breaker
            .call(self.client.graph_statistics(&self.edge_label))
            .await
    }

    async fn prepare_schema(&self) -> Result<(), StoreError> {
        let schema = vec![
            "CREATE INDEX IF NOT EXISTS FOR (n:Article) ON (n.layout_status)".to_string(),
            "CREATE INDEX IF NOT EXISTS FOR (n:Article) ON (n.topo_order)".to_string(),
            "CREATE INDEX IF NOT EXISTS FOR (n:Article) ON (n.layer, n.level)".to_string(),
            "CREATE INDEX IF NOT EXISTS FOR (n:Article) ON (n.uid, n.layout_status)".to_string(),
            format!(
                "CREATE INDEX IF NOT EXISTS FOR ()-[r:{}]->() ON (r)",
                self.edge_label
            ),
        ];
        self.breaker
            .call(self.client.run_transactions(&[schema]))
            .await
    }

    async fn clear_layout(&self) -> Result<u64, StoreError> {
        self.single_count(queries::clear_layout(), "cleared").await
    }

    async fn clear_positions(&self) -> Result<u64, StoreError> {
        self.single_count(queries::clear_positions(), "cleared")
            .await
    }

    async fn remove_self_loops(&self) -> Result<u64, StoreError> {
        self.single_count(queries::remove_self_loops(&self.edge_label), "removed")
            .await
    }

    async fn dedupe_parallel_edges(&self) -> Result<u64, StoreError> {
        self.single_count(queries::dedupe_parallel_edges(&self.edge_label), "removed")
            .await
    }

    async fn source_count(&self) -> Result<u64, StoreError> {
        self.single_count(queries::source_count(&self.edge_label), "source_count")
            .await
    }

    async fn init_topo_batch(&self, batch_size: usize) -> Result<u64, StoreError> {
        let cypher = queries::init_topo_batch(&self.edge_label);
        let batch = batch_size as i64;
        let rows = self
            .breaker
            .call(
                self.client
                    .execute_with_retry(move || query(&cypher).param("batch", batch)),
            )
            .await?;
        rows.first()
            .map(|r| row_u64(r, "initialised"))
            .transpose()
            .map(|v| v.unwrap_or(0))
    }

    async fn visit_next_wave(
        &self,
        batch_size: usize,
        first_order: i64,
    ) -> Result<u64, StoreError> {
        let cypher = queries::visit_next_wave(&self.edge_label);
        let batch = batch_size as i64;
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || {
                query(&cypher)
                    .param("batch", batch)
                    .param("first_order", first_order)
            }))
            .await?;
        rows.first()
            .map(|r| row_u64(r, "visited_count"))
            .transpose()
            .map(|v| v.unwrap_or(0))
    }

    async fn unvisited_uids(&self) -> Result<Vec<String>, StoreError> {
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(|| {
                query(
                    "MATCH (n:Article) WHERE n.visited = false \
                     RETURN n.uid AS uid ORDER BY uid",
                )
            }))
            .await?;
        rows.iter().map(|r| row_string(r, "uid")).collect()
    }

    async fn assign_fallback_orders(
        &self,
        uids: &[String],
        first_order: i64,
    ) -> Result<(), StoreError> {
        if uids.is_empty() {
            return Ok(());
        }
        let uids = uids.to_vec();
        self.breaker
            .call(self.client.execute_with_retry(move || {
                query(
                    "UNWIND range(0, size($uids) - 1) AS i \
                     MATCH (n:Article {uid: $uids[i]}) \
                     SET n.topo_order = $first_order + i, n.visited = true",
                )
                .param("uids", uids.clone())
                .param("first_order", first_order)
            }))
            .await?;
        Ok(())
    }

    async fn topo_violation_count(&self, fallback_start: i64) -> Result<u64, StoreError> {
        let cypher = queries::topo_violations(&self.edge_label);
        let rows = self
            .breaker
            .call(
                self.client
                    .execute_with_retry(move || query(&cypher).param("fallback_start", fallback_start)),
            )
            .await?;
        rows.first()
            .map(|r| row_u64(r, "violations"))
            .transpose()
            .map(|v| v.unwrap_or(0))
    }

    async fn find_and_place_longest_path(&self) -> Result<Vec<String>, StoreError> {
        let cypher = queries::find_and_place_longest_path(&self.edge_label);
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || {
                query(&cypher)
                    .param("layer_spacing", LAYER_SPACING)
                    .param("y_delta", PATH_Y_DELTA)
            }))
            .await?;
        rows.iter().map(|r| row_string(r, "uid")).collect()
    }

    async fn find_and_place_longest_path_bounded(
        &self,
        max_depth: u32,
        root_cap: usize,
    ) -> Result<Vec<String>, StoreError> {
        let cypher = queries::find_and_place_longest_path_bounded(&self.edge_label, max_depth);
        let cap = root_cap as i64;
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || {
                query(&cypher)
                    .param("root_cap", cap)
                    .param("layer_spacing", LAYER_SPACING)
                    .param("y_delta", PATH_Y_DELTA)
            }))
            .await?;
        rows.iter().map(|r| row_string(r, "uid")).collect()
    }

    async fn place_path(&self, path: &[String]) -> Result<u64, StoreError> {
        if path.is_empty() {
            return Ok(0);
        }
        let uids = path.to_vec();
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || {
                query(queries::PLACE_PATH)
                    .param("uids", uids.clone())
                    .param("layer_spacing", LAYER_SPACING)
                    .param("y_delta", PATH_Y_DELTA)
            }))
            .await?;
        rows.first()
            .map(|r| row_u64(r, "placed"))
            .transpose()
            .map(|v| v.unwrap_or(0))
    }

    async fn place_path_neighbours(&self) -> Result<u64, StoreError> {
        let cypher = queries::place_path_neighbours(&self.edge_label);
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || {
                query(&cypher)
                    .param("layer_spacing", LAYER_SPACING)
                    .param("y_delta", PATH_Y_DELTA)
            }))
            .await?;
        rows.first()
            .map(|r| row_u64(r, "placed"))
            .transpose()
            .map(|v| v.unwrap_or(0))
    }

    async fn path_neighbour_uids(&self) -> Result<Vec<String>, StoreError> {
        let cypher = queries::path_neighbour_uids(&self.edge_label);
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || query(&cypher)))
            .await?;
        rows.iter().map(|r| row_string(r, "uid")).collect()
    }

    async fn wcc_component_pairs(&self) -> Result<Vec<(String, i64)>, StoreError> {
        // Drop a leftover projection from an aborted run, then project,
        // stream, and drop again. Failures here fall back to expansion in
        // the component phase, so each step may surface its store error.
        let _ = self
            .client
            .execute_with_retry(|| {
                query(&format!(
                    "CALL gds.graph.drop('{WCC_PROJECTION}', false) YIELD graphName \
                     RETURN graphName"
                ))
            })
            .await; // missing projection is the normal case

        let project = queries::wcc_project(&self.edge_label, self.exclude_isolated);
        self.breaker
            .call(self.client.execute_with_retry(move || query(&project)))
            .await?;

        let stream_result = self
            .breaker
            .call(self.client.execute_with_retry(|| {
                query(&format!(
                    "CALL gds.wcc.stream('{WCC_PROJECTION}') \
                     YIELD nodeId, componentId \
                     RETURN gds.util.asNode(nodeId).uid AS uid, componentId \
                     ORDER BY componentId, uid"
                ))
            }))
            .await;

        let _ = self
            .client
            .execute_with_retry(|| {
                query(&format!(
                    "CALL gds.graph.drop('{WCC_PROJECTION}', false) YIELD graphName \
                     RETURN graphName"
                ))
            })
            .await;

        let rows = stream_result?;
        rows.iter()
            .map(|r| Ok((row_string(r, "uid")?, row_i64(r, "componentId")?)))
            .collect()
    }

    async fn expansion_components(&self, max_hops: u32) -> Result<Vec<Vec<String>>, StoreError> {
        let cypher =
            queries::expansion_components(&self.edge_label, max_hops, self.exclude_isolated);
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || query(&cypher)))
            .await?;
        rows.iter()
            .map(|r| {
                let seed = row_string(r, "seed")?;
                let mut connected = row_string_vec(r, "connected")?;
                connected.push(seed);
                Ok(connected)
            })
            .collect()
    }

    async fn placed_neighbour_positions(
        &self,
        uids: &[String],
    ) -> Result<Vec<(i64, i64)>, StoreError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let cypher = queries::placed_neighbour_positions(&self.edge_label);
        let uids = uids.to_vec();
        let rows = self
            .breaker
            .call(
                self.client
                    .execute_with_retry(move || query(&cypher).param("uids", uids.clone())),
            )
            .await?;
        rows.iter()
            .map(|r| Ok((row_i64(r, "layer")?, row_i64(r, "level")?)))
            .collect()
    }

    async fn max_level_in_layer(&self, layer: i64) -> Result<Option<i64>, StoreError> {
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || {
                query(
                    "MATCH (n:Article {layer: $layer}) \
                     WHERE n.layout_status IN ['placed', 'in_longest_path'] \
                     RETURN max(n.level) AS max_level",
                )
                .param("layer", layer)
            }))
            .await?;
        rows.first().map(|r| row_opt_i64(r, "max_level")).transpose().map(|v| v.flatten())
    }

    async fn position_occupied(&self, layer: i64, level: i64) -> Result<bool, StoreError> {
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || {
                query(
                    "MATCH (n:Article {layer: $layer, level: $level}) \
                     WHERE n.layout_status IN ['placed', 'in_longest_path'] \
                     RETURN count(n) AS occupied",
                )
                .param("layer", layer)
                .param("level", level)
            }))
            .await?;
        Ok(rows
            .first()
            .map(|r| row_u64(r, "occupied"))
            .transpose()?
            .unwrap_or(0)
            > 0)
    }

    async fn write_placements(
        &self,
        rows: &[Placement],
        status: VertexStatus,
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.breaker
            .call(
                self.client
                    .batch_update_positions(rows, status, self.batch_size),
            )
            .await
    }

    async fn remaining_unplaced(
        &self,
        chunk_size: usize,
    ) -> Result<Vec<RemainingVertex>, StoreError> {
        let cypher = queries::remaining_unplaced(&self.edge_label, self.exclude_isolated);
        let mut pager = self.client.pager(cypher, chunk_size);
        let mut remaining = Vec::new();
        loop {
            let page = self
                .breaker
                .call(self.client.next_page(&mut pager))
                .await?;
            let Some(rows) = page else { break };
            for row in &rows {
                remaining.push(RemainingVertex {
                    uid: row_string(row, "uid")?,
                    topo_order: row_i64(row, "topo_order")?,
                });
            }
        }
        Ok(remaining)
    }

    async fn pinned_vertices(&self) -> Result<Vec<PinnedVertex>, StoreError> {
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(|| {
                query(
                    "MATCH (n:Article {is_pinned: true}) \
                     RETURN n.uid AS uid, \
                            coalesce(n.level_target, n.level, 0) AS target_level \
                     ORDER BY uid",
                )
            }))
            .await?;
        rows.iter()
            .map(|r| {
                Ok(PinnedVertex {
                    uid: row_string(r, "uid")?,
                    target_level: row_i64(r, "target_level")?,
                })
            })
            .collect()
    }

    async fn apply_pinned_level(&self, uid: &str, level: i64, y: f64) -> Result<(), StoreError> {
        let uid = uid.to_string();
        self.breaker
            .call(self.client.execute_with_retry(move || {
                query(
                    "MATCH (n:Article {uid: $uid}) \
                     SET n.layout_status = 'pinned', n.level = $level, n.y = $y",
                )
                .param("uid", uid.clone())
                .param("level", level)
                .param("y", y)
            }))
            .await?;
        Ok(())
    }

    async fn layout_blocks(&self, chunk_size: usize) -> Result<Vec<Block>, StoreError> {
        let cypher = queries::layout_blocks(&self.edge_label, self.exclude_isolated);
        let mut pager = self.client.pager(cypher, chunk_size);
        let mut blocks = Vec::new();
        loop {
            let page = self
                .breaker
                .call(self.client.next_page(&mut pager))
                .await?;
            let Some(rows) = page else { break };
            for row in &rows {
                blocks.push(Block {
                    id: row_string(row, "id")?,
                    layer: row_i64(row, "layer")?,
                    level: row_i64(row, "level")?,
                    x: row_f64(row, "x")?,
                    y: row_f64(row, "y")?,
                    is_pinned: row_bool(row, "is_pinned")?,
                });
            }
        }
        Ok(blocks)
    }

    async fn mark_worker_complete(
        &self,
        worker_id: u32,
        total_workers: u32,
    ) -> Result<(), StoreError> {
        self.breaker
            .call(self.client.execute_with_retry(move || {
                query(
                    "MERGE (s:SyncWorker {worker_id: $worker_id, total_workers: $total_workers}) \
                     SET s.completed = true, s.timestamp = datetime()",
                )
                .param("worker_id", worker_id as i64)
                .param("total_workers", total_workers as i64)
            }))
            .await?;
        Ok(())
    }

    async fn completed_worker_count(&self, total_workers: u32) -> Result<u32, StoreError> {
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(move || {
                query(
                    "MATCH (s:SyncWorker) \
                     WHERE s.total_workers = $total_workers AND s.completed = true \
                     RETURN count(s) AS completed",
                )
                .param("total_workers", total_workers as i64)
            }))
            .await?;
        Ok(rows
            .first()
            .map(|r| row_u64(r, "completed"))
            .transpose()?
            .unwrap_or(0) as u32)
    }

    async fn master_completed(&self) -> Result<bool, StoreError> {
        let rows = self
            .breaker
            .call(self.client.execute_with_retry(|| {
                query(
                    "MATCH (s:SyncWorker {worker_id: 0}) \
                     WHERE s.completed = true \
                     RETURN count(s) AS done",
                )
            }))
            .await?;
        Ok(rows
            .first()
            .map(|r| row_u64(r, "done"))
            .transpose()?
            .unwrap_or(0)
            > 0)
    }

    fn operation_count(&self) -> u64 {
        self.client.operation_count()
    }
}

/// Cypher builders. The relationship type is interpolated here and
/// nowhere else.
pub(crate) mod queries {
    /// Predicate: the vertex bound to `n` has at least one incident edge.
    fn incident(label: &str) -> String {
        format!(
            "(EXISTS {{ (n)-[:{label}]->(:Article) }} OR EXISTS {{ (:Article)-[:{label}]->(n) }})"
        )
    }

    pub fn clear_layout() -> String {
        "MATCH (n:Article) \
         SET n.layout_status = 'unprocessed' \
         REMOVE n.layer, n.level, n.x, n.y, n.topo_order, n.visited, n.in_deg \
         RETURN count(n) AS cleared"
            .to_string()
    }

    pub fn clear_positions() -> String {
        "MATCH (n:Article) \
         WHERE n.layer IS NOT NULL OR n.level IS NOT NULL \
            OR n.x IS NOT NULL OR n.y IS NOT NULL \
            OR n.layout_status <> 'unprocessed' \
         SET n.layout_status = 'unprocessed' \
         REMOVE n.layer, n.level, n.x, n.y \
         RETURN count(n) AS cleared"
            .to_string()
    }

    pub fn remove_self_loops(label: &str) -> String {
        format!(
            "MATCH (n:Article)-[r:{label}]->(n) \
             DELETE r \
             RETURN count(r) AS removed"
        )
    }

    pub fn dedupe_parallel_edges(label: &str) -> String {
        format!(
            "MATCH (a:Article)-[r:{label}]-(b:Article) \
             WHERE a.uid < b.uid \
             WITH a, b, collect(r) AS edges \
             WHERE size(edges) > 1 \
             UNWIND edges[1..] AS extra \
             DELETE extra \
             RETURN count(extra) AS removed"
        )
    }

    pub fn source_count(label: &str) -> String {
        format!(
            "MATCH (n:Article) \
             WHERE NOT (:Article)-[:{label}]->(n) \
             RETURN count(n) AS source_count"
        )
    }

    pub fn init_topo_batch(label: &str) -> String {
        format!(
            "MATCH (n:Article) \
             WHERE n.topo_order IS NULL AND {incident} \
             WITH n LIMIT $batch \
             SET n.in_deg = size([(m:Article)-[:{label}]->(n) | m]), \
                 n.topo_order = -1, \
                 n.visited = false \
             RETURN count(n) AS initialised",
            incident = incident(label),
        )
    }

    pub fn visit_next_wave(label: &str) -> String {
        format!(
            "MATCH (n:Article) \
             WHERE n.in_deg = 0 AND n.visited = false \
             WITH n ORDER BY n.uid LIMIT $batch \
             WITH collect(n) AS wave \
             UNWIND range(0, size(wave) - 1) AS i \
             WITH wave[i] AS n, $first_order + i AS ord \
             SET n.topo_order = ord, n.visited = true \
             WITH collect(n) AS visited_nodes \
             CALL {{ \
                 WITH visited_nodes \
                 UNWIND visited_nodes AS v \
                 MATCH (v)-[:{label}]->(m:Article) \
                 WHERE m.visited = false \
                 SET m.in_deg = m.in_deg - 1 \
                 RETURN count(m) AS decremented \
             }} \
             RETURN size(visited_nodes) AS visited_count"
        )
    }

    pub fn topo_violations(label: &str) -> String {
        format!(
            "MATCH (u:Article)-[:{label}]->(v:Article) \
             WHERE u.topo_order IS NOT NULL AND v.topo_order IS NOT NULL \
               AND u.topo_order < $fallback_start AND v.topo_order < $fallback_start \
               AND u.topo_order >= v.topo_order \
             RETURN count(*) AS violations"
        )
    }

    pub fn find_and_place_longest_path(label: &str) -> String {
        format!(
            "MATCH path = (start:Article)-[:{label}*]->(end:Article) \
             WHERE start <> end \
             WITH path ORDER BY length(path) DESC LIMIT 1 \
             WITH nodes(path) AS vs \
             UNWIND range(0, size(vs) - 1) AS i \
             WITH vs[i] AS v, i \
             SET v.layout_status = 'in_longest_path', \
                 v.layer = i, \
                 v.level = 0, \
                 v.x = i * $layer_spacing, \
                 v.y = i * $y_delta \
             RETURN v.uid AS uid \
             ORDER BY i"
        )
    }

    pub fn find_and_place_longest_path_bounded(label: &str, max_depth: u32) -> String {
        format!(
            "MATCH (sink:Article) \
             WHERE NOT (sink)-[:{label}]->(:Article) \
             WITH sink ORDER BY sink.uid LIMIT $root_cap \
             MATCH path = (src:Article)-[:{label}*1..{max_depth}]->(sink) \
             WHERE src <> sink \
             WITH path ORDER BY length(path) DESC LIMIT 1 \
             WITH nodes(path) AS vs \
             UNWIND range(0, size(vs) - 1) AS i \
             WITH vs[i] AS v, i \
             SET v.layout_status = 'in_longest_path', \
                 v.layer = i, \
                 v.level = 0, \
                 v.x = i * $layer_spacing, \
                 v.y = i * $y_delta \
             RETURN v.uid AS uid \
             ORDER BY i"
        )
    }

    pub const PLACE_PATH: &str = "\
UNWIND range(0, size($uids) - 1) AS i
MATCH (n:Article {uid: $uids[i]})
SET n.layout_status = 'in_longest_path',
    n.layer = i,
    n.level = 0,
    n.x = i * $layer_spacing,
    n.y = i * $y_delta
RETURN count(n) AS placed";

    pub fn place_path_neighbours(label: &str) -> String {
        format!(
            "MATCH (lp:Article {{layout_status: 'in_longest_path'}}) \
             WITH count(lp) AS lp_count \
             MATCH (lp:Article {{layout_status: 'in_longest_path'}}) \
             OPTIONAL MATCH (pred:Article)-[:{label}]->(lp) \
             OPTIONAL MATCH (lp)-[:{label}]->(succ:Article) \
             WITH lp_count, collect(DISTINCT pred) + collect(DISTINCT succ) AS neighbours \
             UNWIND neighbours AS n \
             WITH DISTINCT n, lp_count \
             WHERE n IS NOT NULL AND n.layout_status <> 'in_longest_path' \
             WITH n, lp_count ORDER BY n.uid \
             WITH collect(n) AS ns, lp_count \
             UNWIND range(0, size(ns) - 1) AS i \
             WITH ns[i] AS n, lp_count + i AS layer, i \
             SET n.layout_status = 'lp_neighbor', \
                 n.layer = layer, \
                 n.level = 0, \
                 n.x = layer * $layer_spacing, \
                 n.y = i * $y_delta \
             RETURN count(n) AS placed"
        )
    }

    pub fn path_neighbour_uids(label: &str) -> String {
        format!(
            "MATCH (lp:Article {{layout_status: 'in_longest_path'}}) \
             OPTIONAL MATCH (pred:Article)-[:{label}]->(lp) \
             OPTIONAL MATCH (lp)-[:{label}]->(succ:Article) \
             WITH collect(DISTINCT pred) + collect(DISTINCT succ) AS neighbours \
             UNWIND neighbours AS n \
             WITH DISTINCT n \
             WHERE n IS NOT NULL AND n.layout_status <> 'in_longest_path' \
             RETURN n.uid AS uid \
             ORDER BY uid"
        )
    }

    pub fn wcc_project(label: &str, exclude_isolated: bool) -> String {
        let isolated_clause = if exclude_isolated {
            format!(
                " AND (EXISTS {{ (n)-[:{label}]->(:Article) }} \
                 OR EXISTS {{ (:Article)-[:{label}]->(n) }})"
            )
        } else {
            String::new()
        };
        format!(
            "CALL gds.graph.project.cypher( \
             '{projection}', \
             'MATCH (n:Article) WHERE n.layout_status = \"unprocessed\"{isolated_clause} \
              RETURN id(n) AS id', \
             'MATCH (a:Article)-[:{label}]-(b:Article) \
              WHERE a.layout_status = \"unprocessed\" AND b.layout_status = \"unprocessed\" \
              RETURN id(a) AS source, id(b) AS target' \
             ) YIELD graphName RETURN graphName",
            projection = super::WCC_PROJECTION,
        )
    }

    pub fn expansion_components(label: &str, max_hops: u32, exclude_isolated: bool) -> String {
        let isolated_clause = if exclude_isolated {
            format!(" WHERE {}", incident(label))
        } else {
            String::new()
        };
        format!(
            "MATCH (n:Article {{layout_status: 'unprocessed'}}){isolated_clause} \
             CALL {{ \
                 WITH n \
                 OPTIONAL MATCH (n)-[:{label}*1..{max_hops}]-(m:Article {{layout_status: 'unprocessed'}}) \
                 RETURN collect(DISTINCT m.uid) AS connected \
             }} \
             RETURN n.uid AS seed, connected \
             ORDER BY seed"
        )
    }

    pub fn placed_neighbour_positions(label: &str) -> String {
        format!(
            "MATCH (n:Article)-[:{label}]-(m:Article) \
             WHERE n.uid IN $uids \
               AND m.layout_status IN ['placed', 'in_longest_path'] \
             RETURN m.layer AS layer, m.level AS level"
        )
    }

    pub fn remaining_unplaced(label: &str, exclude_isolated: bool) -> String {
        let isolated_clause = if exclude_isolated {
            format!(" AND {}", incident(label))
        } else {
            String::new()
        };
        format!(
            "MATCH (n:Article) \
             WHERE n.layout_status = 'unprocessed'{isolated_clause} \
             RETURN n.uid AS uid, coalesce(n.topo_order, 0) AS topo_order \
             ORDER BY topo_order ASC, uid ASC \
             SKIP $skip LIMIT $limit"
        )
    }

    pub fn layout_blocks(label: &str, exclude_isolated: bool) -> String {
        let isolated_clause = if exclude_isolated {
            format!(" AND {}", incident(label))
        } else {
            String::new()
        };
        format!(
            "MATCH (n:Article) \
             WHERE n.layout_status IN \
                   ['placed', 'in_longest_path', 'lp_neighbor', 'pinned']{isolated_clause} \
             RETURN n.uid AS id, \
                    coalesce(n.layer, 0) AS layer, \
                    coalesce(n.level, 0) AS level, \
                    coalesce(n.x, 0.0) AS x, \
                    coalesce(n.y, 0.0) AS y, \
                    coalesce(n.is_pinned, false) AS is_pinned, \
                    coalesce(n.topo_order, 0) AS topo_order \
             ORDER BY topo_order ASC, id ASC \
             SKIP $skip LIMIT $limit"
        )
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn edge_label_is_interpolated_everywhere() {
            for label in ["CITES", "BIBLIOGRAPHIC_LINK"] {
                let needle = format!("[:{label}]");
                assert!(remove_self_loops(label).contains(&format!("[r:{label}]")));
                assert!(dedupe_parallel_edges(label).contains(&format!("[r:{label}]")));
                assert!(source_count(label).contains(&needle));
                assert!(visit_next_wave(label).contains(&needle));
                assert!(find_and_place_longest_path(label).contains(&format!("[:{label}*]")));
                assert!(place_path_neighbours(label).contains(&needle));
                assert!(
                    expansion_components(label, 6, true).contains(&format!("[:{label}*1..6]"))
                );
            }
        }

        #[test]
        fn bounded_search_embeds_the_depth_cap() {
            let q = find_and_place_longest_path_bounded("CITES", 15);
            assert!(q.contains("[:CITES*1..15]"));
            assert!(q.contains("LIMIT $root_cap"));
        }

        #[test]
        fn paged_queries_carry_stable_order_and_pagination() {
            for q in [
                remaining_unplaced("CITES", true),
                layout_blocks("CITES", true),
            ] {
                assert!(q.contains("ORDER BY topo_order ASC"));
                assert!(q.contains("SKIP $skip LIMIT $limit"));
            }
        }

        #[test]
        fn isolated_vertex_filter_is_optional() {
            assert!(remaining_unplaced("CITES", true).contains("EXISTS {"));
            assert!(!remaining_unplaced("CITES", false).contains("EXISTS {"));
        }

        #[test]
        fn sanitiser_dedupe_keeps_one_edge_per_pair() {
            let q = dedupe_parallel_edges("CITES");
            assert!(q.contains("a.uid < b.uid"));
            assert!(q.contains("edges[1..]"));
        }
    }
}
