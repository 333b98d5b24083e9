// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Startup capability detection.
//!
//! Deployments differ in two ways that would otherwise leak branching
//! into every call site: whether the graph-data-science plugin is
//! installed, and whether citations were ingested under the canonical
//! `CITES` relationship type or the legacy `BIBLIOGRAPHIC_LINK` name.
//! Both are probed exactly once when the engine starts; the answers pick
//! one concrete strategy per component for the whole run.

use tracing::{info, warn};

use crate::graph::client::Neo4jClient;

/// Canonical citation relationship type.
pub const EDGE_LABEL_CANONICAL: &str = "CITES";
/// Migration-time alias still present in older ingests.
pub const EDGE_LABEL_LEGACY: &str = "BIBLIOGRAPHIC_LINK";

/// How weakly connected components are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentDiscovery {
    /// Stream `gds.wcc` over a projected subgraph.
    Gds,
    /// Bounded undirected expansion from each unprocessed seed.
    Expansion,
}

/// The strategy selection for one engine run.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub component_discovery: ComponentDiscovery,
    pub edge_label: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            component_discovery: ComponentDiscovery::Expansion,
            edge_label: EDGE_LABEL_CANONICAL.to_string(),
        }
    }
}

impl Capabilities {
    /// Probe the connected store. Probe failures degrade to the
    /// conservative defaults rather than failing startup.
    pub async fn detect(client: &Neo4jClient) -> Self {
        let component_discovery = match client.gds_wcc_available().await {
            Ok(true) => {
                info!("gds wcc available, components will use the gds stream");
                ComponentDiscovery::Gds
            }
            Ok(false) => {
                info!("gds wcc not installed, components will use hop expansion");
                ComponentDiscovery::Expansion
            }
            Err(e) => {
                warn!(error = %e, "gds probe failed, components will use hop expansion");
                ComponentDiscovery::Expansion
            }
        };

        let edge_label = match client.relationship_count(EDGE_LABEL_CANONICAL).await {
            Ok(0) => match client.relationship_count(EDGE_LABEL_LEGACY).await {
                Ok(n) if n > 0 => {
                    warn!(
                        legacy_edges = n,
                        "no {EDGE_LABEL_CANONICAL} relationships found, \
                         aliasing legacy {EDGE_LABEL_LEGACY} for this run"
                    );
                    EDGE_LABEL_LEGACY.to_string()
                }
                _ => EDGE_LABEL_CANONICAL.to_string(),
            },
            Ok(_) => EDGE_LABEL_CANONICAL.to_string(),
            Err(e) => {
                warn!(error = %e, "edge label probe failed, assuming {EDGE_LABEL_CANONICAL}");
                EDGE_LABEL_CANONICAL.to_string()
            }
        };

        Capabilities {
            component_discovery,
            edge_label,
        }
    }

    /// Capabilities for a backend that supports everything natively, as
    /// the in-memory store does.
    pub fn native() -> Self {
        Capabilities {
            component_discovery: ComponentDiscovery::Gds,
            edge_label: EDGE_LABEL_CANONICAL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_conservative() {
        let caps = Capabilities::default();
        assert_eq!(caps.component_discovery, ComponentDiscovery::Expansion);
        assert_eq!(caps.edge_label, EDGE_LABEL_CANONICAL);
    }
}
