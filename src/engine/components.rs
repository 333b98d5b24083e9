// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Weakly-connected-component discovery and placement.
//!
//! Components are discovered among still-unprocessed vertices — via the
//! store's WCC routine when the capability probe found one, else via
//! bounded undirected expansion — then placed near their already-placed
//! neighbourhoods. Placement fans out over disjoint layer/level bands,
//! one band per chunk, so concurrent chunks never compete for slots and
//! need no locking beyond the store's per-vertex write serialisation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Capabilities, ComponentDiscovery};
use crate::engine::positioning::PositionCalculator;
use crate::engine::types::{Placement, VertexStatus};
use crate::errors::StoreError;
use crate::observability::messages::engine::ComponentChunkFailed;
use crate::observability::messages::StructuredLog;
use crate::observability::progress::ProgressReporter;
use crate::traits::GraphStore;

/// Undirected hop bound for the expansion fallback.
pub const EXPANSION_MAX_HOPS: u32 = 6;
/// Components larger than this take the deterministic grid.
pub const DETAILED_PLACEMENT_CAP: usize = 100;
/// Base layer of chunk 0; chunk `i` starts at `20 + 10i`.
pub const CHUNK_BASE_LAYER: i64 = 20;
/// Base level of chunk 0; chunk `i` starts at `5 + 5i`.
pub const CHUNK_BASE_LEVEL: i64 = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentOutcome {
    pub found: usize,
    pub placed: usize,
    pub failed: usize,
}

/// Discover components among unprocessed vertices. WCC errors degrade to
/// the expansion fallback rather than failing the phase.
pub async fn discover(
    store: &dyn GraphStore,
    capabilities: &Capabilities,
) -> Result<Vec<Vec<String>>, StoreError> {
    let raw = match capabilities.component_discovery {
        ComponentDiscovery::Gds => match store.wcc_component_pairs().await {
            Ok(pairs) => {
                let mut grouped: HashMap<i64, Vec<String>> = HashMap::new();
                for (uid, component_id) in pairs {
                    grouped.entry(component_id).or_default().push(uid);
                }
                let mut components: Vec<Vec<String>> = grouped.into_values().collect();
                components.sort_by(|a, b| a.first().cmp(&b.first()));
                components
            }
            Err(e) => {
                warn!(error = %e, "wcc stream failed, falling back to hop expansion");
                store.expansion_components(EXPANSION_MAX_HOPS).await?
            }
        },
        ComponentDiscovery::Expansion => store.expansion_components(EXPANSION_MAX_HOPS).await?,
    };

    // Overlapping expansions repeat vertices; first-seen wins, and a
    // group contributes only its unseen members.
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut components: Vec<Vec<String>> = Vec::new();
    for group in raw {
        let fresh: Vec<String> = group.into_iter().filter(|uid| seen.insert(uid.clone())).collect();
        if !fresh.is_empty() {
            components.push(fresh);
        }
    }
    components.sort_by_key(|c| std::cmp::Reverse(c.len()));
    info!(components = components.len(), "connected components discovered");
    Ok(components)
}

/// Stable string hash (FNV-1a) so component ownership agrees across
/// worker processes.
pub fn stable_hash(value: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for byte in value.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// The subset of components owned by one worker: hash of the first uid
/// modulo the worker count.
pub fn partition_for_worker(
    components: Vec<Vec<String>>,
    worker_id: u32,
    total_workers: u32,
) -> Vec<Vec<String>> {
    if total_workers <= 1 {
        return components;
    }
    components
        .into_iter()
        .filter(|component| {
            component
                .first()
                .map(|uid| stable_hash(uid) % u64::from(total_workers) == u64::from(worker_id))
                .unwrap_or(false)
        })
        .collect()
}

/// Base coordinates of a parallel chunk's band.
pub fn chunk_band(chunk_index: usize) -> (i64, i64) {
    (
        CHUNK_BASE_LAYER + 10 * chunk_index as i64,
        CHUNK_BASE_LEVEL + 5 * chunk_index as i64,
    )
}

/// Place components in up to `max_chunks` concurrent chunks. A failed
/// component is logged and counted; the rest continue.
pub async fn place_parallel(
    store: Arc<dyn GraphStore>,
    components: Vec<Vec<String>>,
    max_chunks: usize,
    progress: Arc<ProgressReporter>,
    cancel: CancellationToken,
) -> ComponentOutcome {
    let found = components.len();
    if found == 0 {
        return ComponentOutcome::default();
    }

    let worker_count = max_chunks.max(1).min(found);
    let chunk_size = found.div_ceil(worker_count);
    let chunks: Vec<Vec<Vec<String>>> = components
        .chunks(chunk_size)
        .map(|c| c.to_vec())
        .collect();
    info!(
        components = found,
        chunks = chunks.len(),
        "placing components in parallel chunks"
    );

    let mut tasks = Vec::new();
    for (i, chunk) in chunks.into_iter().enumerate() {
        let (start_layer, start_level) = chunk_band(i);
        let store = store.clone();
        let progress = progress.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            process_chunk(store, i, chunk, start_layer, start_level, progress, cancel).await
        }));
    }

    let mut outcome = ComponentOutcome {
        found,
        ..ComponentOutcome::default()
    };
    for task in tasks {
        match task.await {
            Ok((placed, failed)) => {
                outcome.placed += placed;
                outcome.failed += failed;
            }
            Err(join_error) => {
                warn!(error = %join_error, "component chunk task panicked");
                outcome.failed += 1;
            }
        }
    }
    outcome
}

async fn process_chunk(
    store: Arc<dyn GraphStore>,
    chunk_index: usize,
    components: Vec<Vec<String>>,
    start_layer: i64,
    start_level: i64,
    progress: Arc<ProgressReporter>,
    cancel: CancellationToken,
) -> (usize, usize) {
    let total = components.len();
    let mut placed = 0;
    let mut failed = 0;
    for (j, component) in components.into_iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let layer = start_layer + (j as i64 % 10);
        let level = start_level + 2 * j as i64;
        match place_component(store.as_ref(), &component, layer, level).await {
            Ok(_) => placed += 1,
            Err(e) => {
                ComponentChunkFailed {
                    chunk: chunk_index,
                    components: 1,
                    error: &e,
                }
                .log();
                failed += 1;
            }
        }
        progress.emit(
            "components",
            "place",
            (j + 1) as u64,
            total as u64,
            None,
            0,
            store.operation_count(),
        );
    }
    (placed, failed)
}

/// Place one component near its already-placed neighbourhood.
async fn place_component(
    store: &dyn GraphStore,
    component: &[String],
    start_layer: i64,
    start_level: i64,
) -> Result<(), StoreError> {
    let calculator = PositionCalculator::default();
    let neighbours = store.placed_neighbour_positions(component).await?;
    let (target_layer, target_level) = if neighbours.is_empty() {
        (start_layer + 1, start_level)
    } else {
        let n = neighbours.len() as i64;
        let layer_sum: i64 = neighbours.iter().map(|(layer, _)| layer).sum();
        let level_sum: i64 = neighbours.iter().map(|(_, level)| level).sum();
        (layer_sum / n, level_sum / n)
    };

    let mut placements = Vec::with_capacity(component.len());
    if component.len() > DETAILED_PLACEMENT_CAP {
        // Large component: deterministic 10-wide grid from the target.
        for (i, uid) in component.iter().enumerate() {
            let layer = target_layer + (i as i64 % 10);
            let level = target_level + i as i64 / 10;
            let (x, y) = calculator.coordinates(layer, level);
            placements.push(Placement {
                uid: uid.clone(),
                layer,
                level,
                x,
                y,
            });
        }
    } else {
        // Small component: exact slot when free, otherwise a fresh level
        // above the layer's maximum. Levels handed out earlier in this
        // batch are tracked locally so successive vertices stack instead
        // of colliding before the batch write lands.
        let mut local_max: HashMap<i64, i64> = HashMap::new();
        let mut target_taken = store.position_occupied(target_layer, target_level).await?;
        for uid in component {
            let (layer, level) = if !target_taken {
                target_taken = true;
                (target_layer, target_level)
            } else {
                let db_max = store.max_level_in_layer(target_layer).await?.unwrap_or(-1);
                let base = local_max.get(&target_layer).copied().unwrap_or(db_max);
                let fresh = base.max(db_max) + 1;
                local_max.insert(target_layer, fresh);
                (target_layer, fresh)
            };
            let (x, y) = calculator.coordinates(layer, level);
            placements.push(Placement {
                uid: uid.clone(),
                layer,
                level,
                x,
                y,
            });
        }
    }

    store
        .write_placements(&placements, VertexStatus::Placed)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Capabilities;
    use crate::graph::MemoryGraphStore;
    use crate::observability::progress::{NullSink, ProgressReporter};
    use std::time::Duration;

    fn progress() -> Arc<ProgressReporter> {
        Arc::new(ProgressReporter::with_throttle(NullSink, Duration::ZERO))
    }

    #[test]
    fn stable_hash_is_stable() {
        // pinned values: a different hash here would split components
        // differently across worker versions
        assert_eq!(stable_hash(""), 0xcbf29ce484222325);
        assert_eq!(stable_hash("a"), 0xaf63dc4c8601ec8c);
        assert_eq!(stable_hash("article-42"), stable_hash("article-42"));
        assert_ne!(stable_hash("article-42"), stable_hash("article-43"));
    }

    #[test]
    fn partition_covers_every_component_exactly_once() {
        let components: Vec<Vec<String>> = (0..50)
            .map(|i| vec![format!("uid-{i}"), format!("uid-{i}-b")])
            .collect();
        let total_workers = 3;
        let mut seen = BTreeSet::new();
        for worker in 0..total_workers {
            for component in
                partition_for_worker(components.clone(), worker, total_workers)
            {
                assert!(seen.insert(component[0].clone()), "component assigned twice");
            }
        }
        assert_eq!(seen.len(), components.len());
    }

    #[test]
    fn single_worker_owns_everything() {
        let components = vec![vec!["a".to_string()], vec!["b".to_string()]];
        assert_eq!(partition_for_worker(components.clone(), 0, 1).len(), 2);
    }

    #[test]
    fn chunk_bands_are_disjoint() {
        let bands: Vec<(i64, i64)> = (0..4).map(chunk_band).collect();
        assert_eq!(bands[0], (20, 5));
        assert_eq!(bands[1], (30, 10));
        assert_eq!(bands[2], (40, 15));
        assert_eq!(bands[3], (50, 20));
        for pair in bands.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= 10);
        }
    }

    #[tokio::test]
    async fn discovery_deduplicates_overlapping_expansions() {
        let store = MemoryGraphStore::new();
        store.add_edge("a", "b");
        store.add_edge("b", "c");
        store.add_edge("x", "y");

        let caps = Capabilities::default(); // expansion strategy
        let components = discover(&store, &caps).await.unwrap();
        assert_eq!(components.len(), 2);
        // size-descending order
        assert_eq!(components[0].len(), 3);
        assert_eq!(components[1].len(), 2);
    }

    #[tokio::test]
    async fn wcc_failure_degrades_to_expansion() {
        let store = MemoryGraphStore::new().without_wcc();
        store.add_edge("a", "b");

        let caps = Capabilities::native(); // asks for gds
        let components = discover(&store, &caps).await.unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 2);
    }

    #[tokio::test]
    async fn small_component_lands_near_placed_neighbours() {
        let store = MemoryGraphStore::new();
        store.add_edge("spine1", "spine2");
        store.add_edge("spine2", "orphan");
        // put the spine at layers 4 and 6, level 2
        store
            .write_placements(
                &[
                    Placement {
                        uid: "spine1".into(),
                        layer: 4,
                        level: 2,
                        x: 0.0,
                        y: 0.0,
                    },
                    Placement {
                        uid: "spine2".into(),
                        layer: 6,
                        level: 2,
                        x: 0.0,
                        y: 0.0,
                    },
                ],
                VertexStatus::Placed,
            )
            .await
            .unwrap();

        place_component(&store, &["orphan".to_string()], 20, 5)
            .await
            .unwrap();
        let v = store.snapshot("orphan").unwrap();
        assert_eq!(v.status, VertexStatus::Placed);
        // target is the placed neighbour's slot (6, 2); it is occupied,
        // so the orphan takes a fresh level above the layer maximum
        assert_eq!(v.layer, Some(6));
        assert_eq!(v.level, Some(3));
    }

    #[tokio::test]
    async fn occupied_target_allocates_fresh_levels() {
        let store = MemoryGraphStore::new();
        store.add_vertex("u1");
        store.add_vertex("u2");
        store.add_vertex("blocker");
        store
            .write_placements(
                &[Placement {
                    uid: "blocker".into(),
                    layer: 21,
                    level: 5,
                    x: 0.0,
                    y: 0.0,
                }],
                VertexStatus::Placed,
            )
            .await
            .unwrap();

        // no placed neighbours, so the target is (20 + 1, 5) == the
        // blocker's slot
        place_component(&store, &["u1".to_string(), "u2".to_string()], 20, 5)
            .await
            .unwrap();
        let u1 = store.snapshot("u1").unwrap();
        let u2 = store.snapshot("u2").unwrap();
        assert_eq!(u1.layer, Some(21));
        assert_eq!(u2.layer, Some(21));
        assert_eq!(u1.level, Some(6));
        assert_eq!(u2.level, Some(7));
    }

    #[tokio::test]
    async fn oversized_component_uses_the_grid() {
        let store = MemoryGraphStore::new();
        let component: Vec<String> = (0..150).map(|i| format!("v{i:03}")).collect();
        for uid in &component {
            store.add_vertex(uid);
        }

        place_component(&store, &component, 20, 5).await.unwrap();
        let first = store.snapshot("v000").unwrap();
        let eleventh = store.snapshot("v010").unwrap();
        assert_eq!(first.layer, Some(21));
        assert_eq!(first.level, Some(5));
        // ten per row: v010 wraps to the next level
        assert_eq!(eleventh.layer, Some(21));
        assert_eq!(eleventh.level, Some(6));
    }

    #[tokio::test]
    async fn parallel_placement_processes_every_component() {
        let memory = Arc::new(MemoryGraphStore::new());
        for i in 0..8 {
            memory.add_edge(&format!("c{i}a"), &format!("c{i}b"));
        }
        let store: Arc<dyn GraphStore> = memory.clone();
        let components = discover(store.as_ref(), &Capabilities::native())
            .await
            .unwrap();
        assert_eq!(components.len(), 8);

        let outcome = place_parallel(
            store,
            components,
            4,
            progress(),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome.found, 8);
        assert_eq!(outcome.placed, 8);
        assert_eq!(outcome.failed, 0);
        for snapshot in memory.snapshots() {
            assert_eq!(snapshot.status, VertexStatus::Placed);
        }
    }
}
