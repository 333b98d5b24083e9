// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging and tracing.
//!
//! Messages are organized by subsystem:
//! * `engine` - phase lifecycle and layout run events
//! * `store` - graph store retries, reconnects, breaker transitions
//!
//! Each message type implements `Display` for human-readable output and
//! [`StructuredLog`] for machine-readable fields plus span creation.
//!
//! # Usage
//!
//! ```rust
//! use citemap::observability::messages::{StructuredLog, engine::PhaseStarted};
//!
//! PhaseStarted { phase: "toposort" }.log();
//! ```
//!
//! ```rust
//! use citemap::observability::messages::{StructuredLog, engine::PhaseStarted};
//!
//! let span = PhaseStarted { phase: "toposort" }.span("layout_phase");
//! let _guard = span.enter();
//! // work happens here with span context
//! ```

pub mod engine;
pub mod store;

use tracing::Span;

/// Trait for messages that support structured logging and tracing.
///
/// Implementors provide two capabilities:
///
/// 1. **Structured logging** - emit the human-readable `Display` form
///    alongside machine-readable fields, so operators can grep and
///    dashboards can filter without string parsing. The log level is
///    fixed per message type by its semantic meaning.
/// 2. **Span creation** - build a `tracing::Span` carrying the message
///    fields as attributes, for callers that want the surrounding work
///    traced rather than a point-in-time event.
pub trait StructuredLog {
    /// Emit the event with structured fields.
    fn log(&self);

    /// Create a span with this message's fields as attributes.
    ///
    /// The span is closed when dropped; `name` distinguishes call sites
    /// that share a message type.
    fn span(&self, name: &str) -> Span;
}
