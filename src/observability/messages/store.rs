// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph store retry and recovery events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A transient failure is being retried after a backoff wait.
///
/// # Log Level
/// `warn!` - Recovered locally, but worth noticing in aggregate
pub struct QueryRetried<'a> {
    pub attempt: u32,
    pub wait_secs: u64,
    pub error: &'a dyn std::error::Error,
}

impl Display for QueryRetried<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Transient store error, retry {} in {}s: {}",
            self.attempt, self.wait_secs, self.error
        )
    }
}

impl StructuredLog for QueryRetried<'_> {
    fn log(&self) {
        tracing::warn!(
            attempt = self.attempt,
            wait_secs = self.wait_secs,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "query_retry",
            span_name = name,
            attempt = self.attempt,
            wait_secs = self.wait_secs,
            error = %self.error,
        )
    }
}

/// The client is tearing down a defunct connection and reconnecting.
pub struct Reconnecting<'a> {
    pub uri: &'a str,
}

impl Display for Reconnecting<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Reconnecting to graph store at {}", self.uri)
    }
}

impl StructuredLog for Reconnecting<'_> {
    fn log(&self) {
        tracing::info!(uri = self.uri, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("reconnect", span_name = name, uri = self.uri)
    }
}

/// Progress has not moved for many consecutive emissions.
pub struct ProgressStalled<'a> {
    pub stage: &'a str,
    pub emissions: u32,
}

impl Display for ProgressStalled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "No progress in stage '{}' for {} consecutive reports",
            self.stage, self.emissions
        )
    }
}

impl StructuredLog for ProgressStalled<'_> {
    fn log(&self) {
        tracing::warn!(stage = self.stage, emissions = self.emissions, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "progress_stall",
            span_name = name,
            stage = self.stage,
            emissions = self.emissions,
        )
    }
}
