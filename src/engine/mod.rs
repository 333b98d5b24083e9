// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The distributed incremental layout engine.
//!
//! The orchestrator sequences the phases — initialise, sanitise,
//! topologically sort, place the longest-path spine and its neighbours,
//! place components, grid-fill the rest, apply pinned levels, and (in
//! distributed mode) rendezvous with the other workers. Every phase
//! talks to the store through the [`GraphStore`](crate::traits::GraphStore)
//! seam; the orchestrator itself never raises — it always returns a
//! [`LayoutResult`], partial on failure or cancellation.

pub mod components;
pub mod fast_placement;
pub mod longest_path;
pub mod positioning;
pub mod rendezvous;
pub mod sanitizer;
pub mod toposort;
pub mod types;

#[cfg(test)]
mod integration_tests;

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument, Span};

use crate::config::{Capabilities, Settings};
use crate::engine::longest_path::LongestPathProcessor;
use crate::engine::positioning::LEVEL_SPACING;
use crate::engine::types::{LayoutResult, LayoutStatistics, PhaseReport};
use crate::errors::LayoutError;
use crate::observability::messages::engine::{
    LayoutFinished, PhaseCompleted, PhaseFailed, PhaseStarted,
};
use crate::observability::messages::StructuredLog;
use crate::observability::progress::ProgressReporter;
use crate::traits::GraphStore;

pub struct IncrementalLayoutEngine {
    store: Arc<dyn GraphStore>,
    settings: Settings,
    capabilities: Capabilities,
    progress: Arc<ProgressReporter>,
    longest_path: LongestPathProcessor,
}

impl IncrementalLayoutEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        settings: Settings,
        capabilities: Capabilities,
        progress: ProgressReporter,
    ) -> Self {
        IncrementalLayoutEngine {
            store,
            settings,
            capabilities,
            progress: Arc::new(progress),
            longest_path: LongestPathProcessor::new(),
        }
    }

    /// Run the full pipeline. In distributed mode (`total_workers > 1`)
    /// this worker places only its component partition and joins the
    /// rendezvous at the end.
    pub async fn run(&self, cancel: CancellationToken) -> LayoutResult {
        let started = Instant::now();
        let mut stats = LayoutStatistics::default();

        let outcome = self.run_phases(&cancel, &mut stats).await;

        stats.processing_time_secs = started.elapsed().as_secs_f64();
        stats.db_operations = self.store.operation_count();

        // Best-effort result collection even after a failure, so callers
        // see whatever was placed before things went wrong.
        let (blocks, layers, levels) = match fast_placement::collect_result(
            self.store.as_ref(),
            self.settings.effective_chunk_size(),
        )
        .await
        {
            Ok(collections) => collections,
            Err(e) => {
                warn!(error = %e, "result collection failed, returning empty collections");
                Default::default()
            }
        };

        let (success, error) = match outcome {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        LayoutFinished {
            success,
            duration: started.elapsed(),
            blocks: blocks.len(),
            db_operations: stats.db_operations,
        }
        .log();

        LayoutResult {
            success,
            blocks,
            layers,
            levels,
            statistics: stats,
            error,
        }
    }

    async fn run_phases(
        &self,
        cancel: &CancellationToken,
        stats: &mut LayoutStatistics,
    ) -> Result<(), LayoutError> {
        let store = self.store.as_ref();
        let batch_size = self.settings.clamped_batch_size();
        let chunk_size = self.settings.effective_chunk_size();

        // 1. Initialise: schema, wipe previous layout, reset caches.
        self.ensure_active(cancel, "initialize")?;
        let graph_stats = {
            let (t, span) = self.start_phase("initialize");
            let result = async {
                store
                    .prepare_schema()
                    .await
                    .map_err(|e| LayoutError::phase("initialize", e))?;
                store
                    .clear_layout()
                    .await
                    .map_err(|e| LayoutError::phase("initialize", e))?;
                store
                    .statistics()
                    .await
                    .map_err(|e| LayoutError::phase("initialize", e))
            }
            .instrument(span)
            .await;
            self.finish_phase(stats, "initialize", t, result)?
        };
        info!(
            nodes = graph_stats.node_count,
            edges = graph_stats.edge_count,
            pinned = graph_stats.pinned_count,
            "graph statistics collected"
        );
        stats.total_articles = graph_stats.node_count;
        stats.graph = graph_stats;
        self.longest_path.clear_cache();
        self.progress.reset();

        // 2. Sanitise: loops, duplicates, acyclicity check.
        self.ensure_active(cancel, "sanitize")?;
        let sanitize_outcome = {
            let (t, span) = self.start_phase("sanitize");
            let result = sanitizer::run(store)
                .instrument(span)
                .await
                .map_err(|e| LayoutError::phase("sanitize", e));
            self.finish_phase(stats, "sanitize", t, result)?
        };
        stats.removed_edges = sanitize_outcome.removed_edges();

        // 3. Topological sort, with the optional assertion pass.
        self.ensure_active(cancel, "toposort")?;
        let topo_outcome = {
            let (t, span) = self.start_phase("toposort");
            let result = async {
                let outcome = toposort::run(
                    store,
                    batch_size,
                    stats.total_articles,
                    &self.progress,
                    cancel,
                )
                .await?;
                if self.settings.validate_topo_order {
                    toposort::validate(store, &outcome).await?;
                }
                Ok(outcome)
            }
            .instrument(span)
            .await;
            self.finish_phase(stats, "toposort", t, result)?
        };
        stats.iterations += topo_outcome.iterations;

        // 4. Longest-path spine.
        self.ensure_active(cancel, "longest_path")?;
        let path = {
            let (t, span) = self.start_phase("longest_path");
            let result = self
                .longest_path
                .find_and_place(store)
                .instrument(span)
                .await
                .map_err(|e| LayoutError::phase("longest_path", e));
            self.finish_phase(stats, "longest_path", t, result)?
        };
        stats.longest_path_length = path.len();

        // 5. Spine neighbours. Failures are absorbed; the rest of the
        // pipeline still covers the vertices.
        self.ensure_active(cancel, "lp_neighbors")?;
        if !path.is_empty() {
            let (t, span) = self.start_phase("lp_neighbors");
            let result = self
                .longest_path
                .place_neighbours(store)
                .instrument(span)
                .await
                .map_err(|e| LayoutError::phase("lp_neighbors", e));
            if let Some(placed) = self.absorb_phase(stats, "lp_neighbors", t, result) {
                stats.lp_neighbors_placed = placed;
            }
        }

        // 6. Weakly connected components, possibly partitioned across
        // workers. Failures are absorbed per chunk.
        self.ensure_active(cancel, "components")?;
        {
            let (t, span) = self.start_phase("components");
            let discovered = components::discover(store, &self.capabilities)
                .instrument(span.clone())
                .await
                .map_err(|e| LayoutError::phase("components", e));
            if let Some(mut found) = self.absorb_phase(stats, "components", t, discovered) {
                stats.components_found = found.len();
                if self.settings.distributed() {
                    found = components::partition_for_worker(
                        found,
                        self.settings.worker_id,
                        self.settings.total_workers,
                    );
                    info!(
                        worker_id = self.settings.worker_id,
                        owned = found.len(),
                        total = stats.components_found,
                        "component partition selected"
                    );
                }
                let outcome = components::place_parallel(
                    self.store.clone(),
                    found,
                    self.settings.max_parallel_workers,
                    self.progress.clone(),
                    cancel.clone(),
                )
                .instrument(span)
                .await;
                stats.components_placed = outcome.placed;
                stats.components_failed = outcome.failed;
            }
        }

        // 7. Fast placement of whatever is left (optional).
        self.ensure_active(cancel, "fast_placement")?;
        if self.settings.fast_placement {
            let (t, span) = self.start_phase("fast_placement");
            let result = fast_placement::run(store, chunk_size, &self.progress, cancel)
                .instrument(span)
                .await;
            stats.fast_placed = self.finish_phase(stats, "fast_placement", t, result)?;
        }

        // 8. Pinned levels override whatever the phases chose.
        self.ensure_active(cancel, "pinned")?;
        {
            let (t, span) = self.start_phase("pinned");
            let result = self.apply_pinned_levels().instrument(span).await;
            stats.pinned_applied = self.finish_phase(stats, "pinned", t, result)?;
        }

        // 9. Distributed rendezvous.
        if self.settings.distributed() {
            self.ensure_active(cancel, "rendezvous")?;
            let (t, span) = self.start_phase("rendezvous");
            let result = rendezvous::synchronize(
                store,
                self.settings.worker_id,
                self.settings.total_workers,
                cancel,
            )
            .instrument(span)
            .await;
            self.finish_phase(stats, "rendezvous", t, result)?;
        }

        Ok(())
    }

    async fn apply_pinned_levels(&self) -> Result<u64, LayoutError> {
        let store = self.store.as_ref();
        let pinned = store
            .pinned_vertices()
            .await
            .map_err(|e| LayoutError::phase("pinned", e))?;
        for vertex in &pinned {
            let y = vertex.target_level as f64 * LEVEL_SPACING;
            store
                .apply_pinned_level(&vertex.uid, vertex.target_level, y)
                .await
                .map_err(|e| LayoutError::phase("pinned", e))?;
        }
        if !pinned.is_empty() {
            info!(pinned = pinned.len(), "pinned levels applied");
        }
        Ok(pinned.len() as u64)
    }

    fn ensure_active(
        &self,
        cancel: &CancellationToken,
        phase: &'static str,
    ) -> Result<(), LayoutError> {
        if cancel.is_cancelled() {
            Err(LayoutError::Cancelled { phase })
        } else {
            Ok(())
        }
    }

    /// Log the phase start and hand back the timing mark plus a span
    /// the phase's future runs under.
    fn start_phase(&self, name: &'static str) -> (Instant, Span) {
        let message = PhaseStarted { phase: name };
        message.log();
        self.progress.reset();
        (Instant::now(), message.span("layout_phase"))
    }

    /// Record the phase report and propagate failure.
    fn finish_phase<T>(
        &self,
        stats: &mut LayoutStatistics,
        name: &'static str,
        started: Instant,
        result: Result<T, LayoutError>,
    ) -> Result<T, LayoutError> {
        let duration = started.elapsed();
        match &result {
            Ok(_) => PhaseCompleted {
                phase: name,
                duration,
            }
            .log(),
            Err(e) => PhaseFailed {
                phase: name,
                error: e,
            }
            .log(),
        }
        stats.phases.push(PhaseReport {
            name,
            duration_secs: duration.as_secs_f64(),
            success: result.is_ok(),
        });
        result
    }

    /// Record the phase report and absorb failure; the pipeline
    /// continues without the phase's contribution.
    fn absorb_phase<T>(
        &self,
        stats: &mut LayoutStatistics,
        name: &'static str,
        started: Instant,
        result: Result<T, LayoutError>,
    ) -> Option<T> {
        self.finish_phase(stats, name, started, result).ok()
    }
}
