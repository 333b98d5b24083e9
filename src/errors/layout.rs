// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::StoreError;
use thiserror::Error;

/// Errors surfaced by the layout engine.
///
/// The orchestrator never propagates these to the caller; it converts them
/// into a `LayoutResult` with `success = false` and the partial state
/// retained. They exist so the phases themselves can use `?`.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A phase failed on a store error it could not absorb.
    #[error("phase '{phase}' failed: {source}")]
    Phase {
        phase: &'static str,
        #[source]
        source: StoreError,
    },

    /// Cooperative cancellation was observed before or during a phase.
    #[error("layout cancelled during '{phase}'")]
    Cancelled { phase: &'static str },
}

impl LayoutError {
    pub fn phase(phase: &'static str, source: StoreError) -> Self {
        LayoutError::Phase { phase, source }
    }

    /// The phase this error was raised in.
    pub fn phase_name(&self) -> &'static str {
        match self {
            LayoutError::Phase { phase, .. } | LayoutError::Cancelled { phase } => phase,
        }
    }
}
