// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Inter-worker completion rendezvous for distributed runs.
//!
//! Coordination flows through the store only: each worker persists a
//! `SyncWorker` marker when its phases finish. The master (worker 0)
//! polls until every marker is present; the other workers poll for the
//! master's marker. No worker-to-worker channel exists.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::{LayoutError, StoreError};
use crate::traits::GraphStore;

const PHASE: &str = "rendezvous";

/// Master poll interval for follower completion.
pub const MASTER_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Follower poll interval for the master marker.
pub const FOLLOWER_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub async fn synchronize(
    store: &dyn GraphStore,
    worker_id: u32,
    total_workers: u32,
    cancel: &CancellationToken,
) -> Result<(), LayoutError> {
    let phase_err = |source: StoreError| LayoutError::phase(PHASE, source);

    store
        .mark_worker_complete(worker_id, total_workers)
        .await
        .map_err(phase_err)?;
    info!(worker_id, total_workers, "completion marker persisted");

    if worker_id == 0 {
        loop {
            let completed = store
                .completed_worker_count(total_workers)
                .await
                .map_err(phase_err)?;
            if completed >= total_workers {
                info!(total_workers, "all workers completed");
                return Ok(());
            }
            info!(completed, total_workers, "waiting for workers");
            if cancel.is_cancelled() {
                return Err(LayoutError::Cancelled { phase: PHASE });
            }
            tokio::time::sleep(MASTER_POLL_INTERVAL).await;
        }
    } else {
        loop {
            if store.master_completed().await.map_err(phase_err)? {
                info!(worker_id, "master signal received");
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(LayoutError::Cancelled { phase: PHASE });
            }
            tokio::time::sleep(FOLLOWER_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraphStore;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn master_waits_for_every_marker() {
        let store = Arc::new(MemoryGraphStore::new());
        let follower_store = store.clone();

        let follower = tokio::spawn(async move {
            // follower finishes slightly later, then waits for the master
            tokio::time::sleep(Duration::from_secs(7)).await;
            synchronize(
                follower_store.as_ref(),
                1,
                2,
                &CancellationToken::new(),
            )
            .await
        });

        synchronize(store.as_ref(), 0, 2, &CancellationToken::new())
            .await
            .unwrap();
        follower.await.unwrap().unwrap();

        assert_eq!(store.completed_worker_count(2).await.unwrap(), 2);
        assert!(store.master_completed().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_breaks_the_poll_loop() {
        let store = MemoryGraphStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        // worker 0 of 2 can never complete: worker 1 never marks
        let result = synchronize(&store, 0, 2, &cancel).await;
        assert!(matches!(result, Err(LayoutError::Cancelled { .. })));
    }
}
