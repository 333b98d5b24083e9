// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Core value types shared by the layout phases.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Lifecycle status of a vertex across the layout phases.
///
/// Stored in the graph as the `layout_status` property. `Unprocessed` is
/// the initial value every run resets to; the four remaining values are
/// terminal for a given run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexStatus {
    Unprocessed,
    InLongestPath,
    LpNeighbor,
    Placed,
    Pinned,
}

impl VertexStatus {
    /// The property value written to the store.
    pub fn as_str(self) -> &'static str {
        match self {
            VertexStatus::Unprocessed => "unprocessed",
            VertexStatus::InLongestPath => "in_longest_path",
            VertexStatus::LpNeighbor => "lp_neighbor",
            VertexStatus::Placed => "placed",
            VertexStatus::Pinned => "pinned",
        }
    }

    pub fn from_property(value: &str) -> Option<Self> {
        match value {
            "unprocessed" => Some(VertexStatus::Unprocessed),
            "in_longest_path" => Some(VertexStatus::InLongestPath),
            "lp_neighbor" => Some(VertexStatus::LpNeighbor),
            "placed" => Some(VertexStatus::Placed),
            "pinned" => Some(VertexStatus::Pinned),
            _ => None,
        }
    }

    /// True once a vertex has been given a position this run.
    pub fn is_terminal(self) -> bool {
        !matches!(self, VertexStatus::Unprocessed)
    }
}

/// One position write: a vertex and its grid slot plus derived coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub uid: String,
    pub layer: i64,
    pub level: i64,
    pub x: f64,
    pub y: f64,
}

/// A laid-out vertex as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub id: String,
    pub layer: i64,
    pub level: i64,
    pub x: f64,
    pub y: f64,
    pub is_pinned: bool,
}

/// Whole-graph statistics gathered during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStatistics {
    pub node_count: u64,
    pub edge_count: u64,
    pub pinned_count: u64,
    pub density: f64,
    pub avg_degree: f64,
}

/// An unplaced vertex queued for fast placement.
#[derive(Debug, Clone)]
pub struct RemainingVertex {
    pub uid: String,
    pub topo_order: i64,
}

/// A vertex whose level is fixed by the caller.
#[derive(Debug, Clone)]
pub struct PinnedVertex {
    pub uid: String,
    pub target_level: i64,
}

/// Timing and outcome of a single orchestrated phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub name: &'static str,
    pub duration_secs: f64,
    pub success: bool,
}

/// Counters accumulated over a full run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LayoutStatistics {
    pub processing_time_secs: f64,
    pub total_articles: u64,
    pub removed_edges: u64,
    pub longest_path_length: usize,
    pub lp_neighbors_placed: u64,
    pub components_found: usize,
    pub components_placed: usize,
    pub components_failed: usize,
    pub fast_placed: u64,
    pub pinned_applied: u64,
    pub iterations: u64,
    pub db_operations: u64,
    pub graph: GraphStatistics,
    pub phases: Vec<PhaseReport>,
}

/// Final product of a layout run.
///
/// The orchestrator always returns one of these; failures show up as
/// `success = false` with `error` set and whatever state was reached
/// retained in the other fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LayoutResult {
    pub success: bool,
    pub blocks: Vec<Block>,
    pub layers: HashMap<String, i64>,
    pub levels: BTreeMap<i64, Vec<String>>,
    pub statistics: LayoutStatistics,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_property_value() {
        for status in [
            VertexStatus::Unprocessed,
            VertexStatus::InLongestPath,
            VertexStatus::LpNeighbor,
            VertexStatus::Placed,
            VertexStatus::Pinned,
        ] {
            assert_eq!(VertexStatus::from_property(status.as_str()), Some(status));
        }
        assert_eq!(VertexStatus::from_property("nonsense"), None);
    }

    #[test]
    fn only_unprocessed_is_non_terminal() {
        assert!(!VertexStatus::Unprocessed.is_terminal());
        assert!(VertexStatus::Placed.is_terminal());
        assert!(VertexStatus::Pinned.is_terminal());
    }
}
