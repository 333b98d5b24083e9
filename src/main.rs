// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Direct-execution entry point: runs the full layout pipeline against
//! the configured graph store. Takes no arguments; all configuration
//! comes from the environment (and the optional `CITEMAP_CONFIG` TOML
//! file). Exits 0 when the run succeeded, 1 otherwise.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use citemap::config::{Capabilities, Settings};
use citemap::engine::IncrementalLayoutEngine;
use citemap::graph::{Neo4jClient, Neo4jGraphStore};
use citemap::observability::progress::{ProgressReporter, StdoutSink};

#[tokio::main]
async fn main() {
    init_tracing();
    let success = match run().await {
        Ok(success) => success,
        Err(e) => {
            error!(error = %e, "layout run aborted");
            false
        }
    };
    std::process::exit(if success { 0 } else { 1 });
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run() -> anyhow::Result<bool> {
    let settings = Settings::load()?;
    info!(
        uri = %settings.store.uri,
        worker_id = settings.worker_id,
        total_workers = settings.total_workers,
        "starting citation map layout"
    );

    let client = Arc::new(Neo4jClient::new(&settings));
    client.connect().await?;

    let capabilities = Capabilities::detect(&client).await;
    info!(
        discovery = ?capabilities.component_discovery,
        edge_label = %capabilities.edge_label,
        "capabilities detected"
    );

    let store = Arc::new(Neo4jGraphStore::new(
        client.clone(),
        &settings,
        &capabilities,
    ));
    let engine = IncrementalLayoutEngine::new(
        store,
        settings,
        capabilities,
        ProgressReporter::new(StdoutSink),
    );

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling layout");
            ctrl_c_cancel.cancel();
        }
    });

    let result = engine.run(cancel).await;
    println!("{}", serde_json::to_string_pretty(&result.statistics)?);
    if let Some(error) = &result.error {
        error!(error = %error, "layout finished unsuccessfully");
    }

    client.close().await;
    Ok(result.success)
}
