// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for layout phase lifecycle events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A phase is about to run.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use citemap::observability::messages::engine::PhaseStarted;
///
/// let msg = PhaseStarted { phase: "sanitize" };
/// tracing::info!("{}", msg);
/// ```
pub struct PhaseStarted<'a> {
    pub phase: &'a str,
}

impl Display for PhaseStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Starting layout phase '{}'", self.phase)
    }
}

impl StructuredLog for PhaseStarted<'_> {
    fn log(&self) {
        tracing::info!(phase = self.phase, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("phase", span_name = name, phase = self.phase)
    }
}

/// A phase finished successfully.
pub struct PhaseCompleted<'a> {
    pub phase: &'a str,
    pub duration: Duration,
}

impl Display for PhaseCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Layout phase '{}' completed in {:?}",
            self.phase, self.duration
        )
    }
}

impl StructuredLog for PhaseCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            phase = self.phase,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "phase_completed",
            span_name = name,
            phase = self.phase,
            duration = ?self.duration,
        )
    }
}

/// A phase failed; the run continues or aborts depending on the phase.
pub struct PhaseFailed<'a> {
    pub phase: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for PhaseFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Layout phase '{}' failed: {}", self.phase, self.error)
    }
}

impl StructuredLog for PhaseFailed<'_> {
    fn log(&self) {
        tracing::error!(phase = self.phase, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "phase_failed",
            span_name = name,
            phase = self.phase,
            error = %self.error,
        )
    }
}

/// The sanitiser found no source vertices: every vertex sits on a cycle.
/// Non-fatal; the topological sorter falls back to a residual numbering.
pub struct CycleWarning {
    pub node_count: u64,
}

impl Display for CycleWarning {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph has no source vertices ({} vertices total); residual cycles will \
             receive fallback topological orders",
            self.node_count
        )
    }
}

impl StructuredLog for CycleWarning {
    fn log(&self) {
        tracing::warn!(node_count = self.node_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "cycle_warning",
            span_name = name,
            node_count = self.node_count,
        )
    }
}

/// The whole run finished.
///
/// # Log Level
/// `info!` on success, `error!` on failure
pub struct LayoutFinished {
    pub success: bool,
    pub duration: Duration,
    pub blocks: usize,
    pub db_operations: u64,
}

impl Display for LayoutFinished {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Layout {} in {:?}: {} blocks, {} store operations",
            if self.success { "completed" } else { "failed" },
            self.duration,
            self.blocks,
            self.db_operations
        )
    }
}

impl StructuredLog for LayoutFinished {
    fn log(&self) {
        if self.success {
            tracing::info!(
                duration_ms = self.duration.as_millis() as u64,
                blocks = self.blocks,
                db_operations = self.db_operations,
                "{}", self
            );
        } else {
            tracing::error!(
                duration_ms = self.duration.as_millis() as u64,
                blocks = self.blocks,
                db_operations = self.db_operations,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "layout_finished",
            span_name = name,
            success = self.success,
            duration = ?self.duration,
            blocks = self.blocks,
            db_operations = self.db_operations,
        )
    }
}

/// One component chunk could not be placed; the other chunks continue.
pub struct ComponentChunkFailed<'a> {
    pub chunk: usize,
    pub components: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for ComponentChunkFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Component chunk {} ({} components) failed: {}",
            self.chunk, self.components, self.error
        )
    }
}

impl StructuredLog for ComponentChunkFailed<'_> {
    fn log(&self) {
        tracing::error!(
            chunk = self.chunk,
            components = self.components,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "component_chunk_failed",
            span_name = name,
            chunk = self.chunk,
            components = self.components,
            error = %self.error,
        )
    }
}
