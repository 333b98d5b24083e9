// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed gateway to the property-graph database.
//!
//! Wraps the Bolt driver with the concerns every layout query needs:
//! idempotent connection lifecycle, a bounded-retry envelope with
//! exponential backoff and reconnect-on-defunct, per-call timeouts,
//! stable `SKIP/LIMIT` pagination, and `UNWIND`-batched position writes.
//! Queries are rebuilt per attempt, so retries never replay a consumed
//! statement handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use neo4rs::{query, ConfigBuilder, Graph, Query, Row};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::engine::types::{GraphStatistics, Placement, VertexStatus};
use crate::errors::StoreError;
use crate::observability::messages::store::{QueryRetried, Reconnecting};
use crate::observability::messages::StructuredLog;

pub struct Neo4jClient {
    uri: String,
    user: String,
    password: String,
    database: String,
    pool_size: usize,
    query_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    graph: RwLock<Option<Graph>>,
    operations: AtomicU64,
}

impl Neo4jClient {
    pub fn new(settings: &Settings) -> Self {
        Neo4jClient {
            uri: settings.store.uri.clone(),
            user: settings.store.user.clone(),
            password: settings.store.password.clone(),
            database: settings.store.database.clone(),
            pool_size: settings.store.pool_size,
            query_timeout: settings.query_timeout(),
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
            graph: RwLock::new(None),
            operations: AtomicU64::new(0),
        }
    }

    /// Establish the driver handle. A no-op when already connected.
    pub async fn connect(&self) -> Result<(), StoreError> {
        let mut guard = self.graph.write().await;
        if guard.is_some() {
            return Ok(());
        }
        let config = ConfigBuilder::default()
            .uri(&self.uri)
            .user(&self.user)
            .password(&self.password)
            .db(self.database.as_str())
            .max_connections(self.pool_size)
            .build()
            .map_err(|e| StoreError::Fatal(format!("driver config: {e}")))?;
        let graph = Graph::connect(config)
            .await
            .map_err(|e| classify_driver_error(&e))?;
        info!(uri = %self.uri, "connected to graph store");
        *guard = Some(graph);
        Ok(())
    }

    /// Drop the driver handle. A no-op when already closed.
    pub async fn close(&self) {
        let mut guard = self.graph.write().await;
        if guard.take().is_some() {
            info!("disconnected from graph store");
        }
    }

    /// Tear down and re-establish the connection.
    pub async fn reconnect(&self) -> Result<(), StoreError> {
        Reconnecting { uri: &self.uri }.log();
        self.close().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.connect().await
    }

    async fn graph(&self) -> Result<Graph, StoreError> {
        if let Some(graph) = self.graph.read().await.as_ref() {
            return Ok(graph.clone());
        }
        self.connect().await?;
        self.graph
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or_else(|| StoreError::Fatal("connection handle missing after connect".into()))
    }

    /// Monotonic count of logical store calls issued.
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    /// Execute a read/write statement and collect all rows, retrying
    /// transient failures with backoff `retry_delay * 2^attempt` and a
    /// reconnect between attempts. The builder is invoked once per
    /// attempt.
    pub async fn execute_with_retry<F>(&self, build: F) -> Result<Vec<Row>, StoreError>
    where
        F: Fn() -> Query + Send + Sync,
    {
        self.operations.fetch_add(1, Ordering::Relaxed);
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let graph = self.graph().await?;
            let outcome = tokio::time::timeout(self.query_timeout, async {
                let mut stream = graph
                    .execute(build())
                    .await
                    .map_err(|e| classify_driver_error(&e))?;
                let mut rows = Vec::new();
                while let Some(row) = stream.next().await.map_err(|e| classify_driver_error(&e))? {
                    rows.push(row);
                }
                Ok::<_, StoreError>(rows)
            })
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Transient(format!(
                    "query timed out after {}s",
                    self.query_timeout.as_secs()
                )))
            });

            match outcome {
                Ok(rows) => {
                    debug!(rows = rows.len(), attempt, "query executed");
                    return Ok(rows);
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let wait = self.backoff(attempt);
                    QueryRetried {
                        attempt: attempt + 1,
                        wait_secs: wait.as_secs(),
                        error: &err,
                    }
                    .log();
                    tokio::time::sleep(wait).await;
                    if let Err(reconnect_err) = self.reconnect().await {
                        warn!(error = %reconnect_err, "reconnect failed, retrying anyway");
                    }
                    last_error = Some(err);
                }
                Err(err) if err.is_transient() => {
                    return Err(StoreError::Fatal(format!(
                        "query failed after {} retries: {err}",
                        self.max_retries
                    )));
                }
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::Fatal(format!(
            "query failed after {} retries: {}",
            self.max_retries,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Run schema DDL and data DML as separate sequential transactions in
    /// the same logical session. Each slice commits on its own so a DDL
    /// failure never poisons the data reset.
    pub async fn run_transactions(&self, groups: &[Vec<String>]) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::Relaxed);
        let graph = self.graph().await?;
        for group in groups {
            let mut txn = graph
                .start_txn()
                .await
                .map_err(|e| classify_driver_error(&e))?;
            for statement in group {
                txn.run(query(statement))
                    .await
                    .map_err(|e| classify_driver_error(&e))?;
            }
            txn.commit().await.map_err(|e| classify_driver_error(&e))?;
        }
        Ok(())
    }

    /// Lazily page through a query carrying `SKIP $skip LIMIT $limit`,
    /// with a stable `ORDER BY` expected in the statement. Restartable:
    /// a fresh pager starts from offset zero.
    pub fn pager(&self, cypher: impl Into<String>, chunk_size: usize) -> Pager {
        Pager {
            cypher: cypher.into(),
            chunk_size: chunk_size.max(1),
            offset: 0,
            finished: false,
        }
    }

    /// Fetch the next page, or `None` once the stream is exhausted.
    pub async fn next_page(&self, pager: &mut Pager) -> Result<Option<Vec<Row>>, StoreError> {
        if pager.finished {
            return Ok(None);
        }
        let cypher = pager.cypher.clone();
        let skip = pager.offset as i64;
        let limit = pager.chunk_size as i64;
        let rows = self
            .execute_with_retry(move || query(&cypher).param("skip", skip).param("limit", limit))
            .await?;
        if rows.len() < pager.chunk_size {
            pager.finished = true;
        }
        pager.offset += rows.len();
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows))
        }
    }

    /// Write positions in `UNWIND`-style batches: one statement per
    /// `batch_size` rows, parallel-array parameters, rows applied in the
    /// order given.
    pub async fn batch_update_positions(
        &self,
        rows: &[Placement],
        status: VertexStatus,
        batch_size: usize,
    ) -> Result<u64, StoreError> {
        let mut written = 0u64;
        for batch in rows.chunks(batch_size.max(1)) {
            let uids: Vec<String> = batch.iter().map(|p| p.uid.clone()).collect();
            let layers: Vec<i64> = batch.iter().map(|p| p.layer).collect();
            let levels: Vec<i64> = batch.iter().map(|p| p.level).collect();
            let xs: Vec<f64> = batch.iter().map(|p| p.x).collect();
            let ys: Vec<f64> = batch.iter().map(|p| p.y).collect();
            let rows = self
                .execute_with_retry(move || {
                    query(UPDATE_POSITIONS)
                        .param("uids", uids.clone())
                        .param("layers", layers.clone())
                        .param("levels", levels.clone())
                        .param("xs", xs.clone())
                        .param("ys", ys.clone())
                        .param("status", status.as_str())
                })
                .await?;
            if let Some(row) = rows.first() {
                written += row_u64(row, "updated")?;
            }
        }
        Ok(written)
    }

    /// Whole-graph statistics with graceful fallbacks: an estimated edge
    /// count when the exact count fails, zero pinned vertices when the
    /// property is absent.
    pub async fn graph_statistics(&self, edge_label: &str) -> Result<GraphStatistics, StoreError> {
        let node_count = {
            let rows = self
                .execute_with_retry(|| query("MATCH (n:Article) RETURN count(n) AS node_count"))
                .await?;
            rows.first()
                .map(|r| row_u64(r, "node_count"))
                .transpose()?
                .unwrap_or(0)
        };

        let edge_count = match self.relationship_count(edge_label).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "edge count failed, using degree estimate");
                node_count * 2
            }
        };

        let pinned_count = {
            let result = self
                .execute_with_retry(|| {
                    query(
                        "MATCH (n:Article {is_pinned: true}) \
                         RETURN count(n) AS pinned_count",
                    )
                })
                .await;
            match result {
                Ok(rows) => rows
                    .first()
                    .map(|r| row_u64(r, "pinned_count"))
                    .transpose()?
                    .unwrap_or(0),
                Err(e) => {
                    warn!(error = %e, "pinned count failed, defaulting to 0");
                    0
                }
            }
        };

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

    /// Count relationships of one type.
    pub async fn relationship_count(&self, edge_label: &str) -> Result<u64, StoreError> {
        let cypher = format!("MATCH ()-[r:{edge_label}]->() RETURN count(r) AS edge_count");
        let rows = self.execute_with_retry(move || query(&cypher)).await?;
        rows.first()
            .map(|r| row_u64(r, "edge_count"))
            .transpose()
            .map(|v| v.unwrap_or(0))
    }

    /// Whether the graph-data-science `wcc` routine is installed.
    pub async fn gds_wcc_available(&self) -> Result<bool, StoreError> {
        let rows = self
            .execute_with_retry(|| {
                query(
                    "CALL gds.list() YIELD name \
                     WHERE name CONTAINS 'wcc' \
                     RETURN count(*) AS available",
                )
            })
            .await?;
        Ok(rows
            .first()
            .map(|r| row_u64(r, "available"))
            .transpose()?
            .unwrap_or(0)
            > 0)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .checked_mul(1u32 << attempt.min(16))
            .unwrap_or(Duration::from_secs(3600))
    }
}

/// Paged query state; see [`Neo4jClient::pager`].
pub struct Pager {
    cypher: String,
    chunk_size: usize,
    offset: usize,
    finished: bool,
}

const UPDATE_POSITIONS: &str = "\
UNWIND range(0, size($uids) - 1) AS i
MATCH (n:Article {uid: $uids[i]})
SET n.layout_status = $status,
    n.layer = $layers[i],
    n.level = $levels[i],
    n.x = $xs[i],
    n.y = $ys[i]
RETURN count(n) AS updated";

/// Map a driver error onto the retry taxonomy. Connection-shaped
/// failures (lost, defunct, timed out) are transient; everything else is
/// fatal and surfaces unchanged.
fn classify_driver_error(err: &neo4rs::Error) -> StoreError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    let transient = lower.contains("transient")
        || lower.contains("connection")
        || lower.contains("defunct")
        || lower.contains("timed out")
        || lower.contains("broken pipe")
        || lower.contains("io error");
    if transient {
        StoreError::Transient(message)
    } else {
        StoreError::Fatal(message)
    }
}

pub fn row_i64(row: &Row, key: &str) -> Result<i64, StoreError> {
    row.get::<i64>(key)
        .map_err(|e| StoreError::Record(format!("{key}: {e}")))
}

pub fn row_u64(row: &Row, key: &str) -> Result<u64, StoreError> {
    Ok(row_i64(row, key)?.max(0) as u64)
}

pub fn row_f64(row: &Row, key: &str) -> Result<f64, StoreError> {
    row.get::<f64>(key)
        .map_err(|e| StoreError::Record(format!("{key}: {e}")))
}

pub fn row_string(row: &Row, key: &str) -> Result<String, StoreError> {
    row.get::<String>(key)
        .map_err(|e| StoreError::Record(format!("{key}: {e}")))
}

pub fn row_bool(row: &Row, key: &str) -> Result<bool, StoreError> {
    row.get::<bool>(key)
        .map_err(|e| StoreError::Record(format!("{key}: {e}")))
}

pub fn row_opt_i64(row: &Row, key: &str) -> Result<Option<i64>, StoreError> {
    row.get::<Option<i64>>(key)
        .map_err(|e| StoreError::Record(format!("{key}: {e}")))
}

pub fn row_string_vec(row: &Row, key: &str) -> Result<Vec<String>, StoreError> {
    row.get::<Vec<String>>(key)
        .map_err(|e| StoreError::Record(format!("{key}: {e}")))
}
