// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised at the graph store boundary.

use thiserror::Error;

/// Errors that can occur while talking to the graph store.
///
/// The retry envelope recovers `Transient` errors locally (reconnect plus
/// bounded exponential backoff). `Fatal` is what a transient condition
/// becomes once the retry budget is exhausted, or what a non-retryable
/// driver error maps to immediately. `CircuitOpen` is never retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Retryable driver-level condition: lost or defunct connection,
    /// transient server error, per-call timeout.
    #[error("transient store error: {0}")]
    Transient(String),

    /// Non-retryable failure, or a transient one past `max_retries`.
    #[error("fatal store error: {0}")]
    Fatal(String),

    /// The circuit breaker refused the call outright.
    #[error("circuit breaker is open, refusing call")]
    CircuitOpen,

    /// A returned row was missing an expected column or carried an
    /// unexpected type.
    #[error("malformed record: {0}")]
    Record(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    /// Whether this failure should count against the circuit breaker.
    ///
    /// Only store-side conditions trip the breaker; `Record` is a local
    /// decoding problem and `CircuitOpen` is the breaker itself talking.
    pub fn trips_breaker(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::Fatal(_))
    }
}
