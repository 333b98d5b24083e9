// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and progress reporting.
//!
//! Message types follow a struct-based pattern with `Display` plus the
//! `StructuredLog` trait so every operational event carries queryable
//! fields instead of preformatted strings. Progress reporting is a
//! bounded, throttled emitter: a slow sink can never stall the engine.

pub mod messages;
pub mod progress;
