// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed runtime configuration.
//!
//! Every option has a default and can be overridden from the environment
//! (`CITEMAP_*` variables). When `CITEMAP_CONFIG` names a TOML file, the
//! file is loaded first and the environment is applied on top, so a
//! deployment can ship a base file and still tweak single values per
//! worker.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Connection parameters for the graph store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool_size: usize,
    /// Per-call timeout in seconds; a breach counts as a transient error.
    pub timeout_sec: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "password".into(),
            database: "neo4j".into(),
            pool_size: 50,
            timeout_sec: 300,
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_sec: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        BreakerSettings {
            failure_threshold: 5,
            recovery_timeout_sec: 60,
        }
    }
}

/// All engine options in one place. Downstream constants (effective chunk
/// size, clamped batch size, timeouts) derive from here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub circuit_breaker: BreakerSettings,

    /// Streaming batch size for paged reads.
    pub chunk_size: usize,
    /// Write batch size for UNWIND statements; clamped to 1000..=5000.
    pub batch_size: usize,
    pub max_workers: usize,
    pub max_parallel_workers: usize,

    pub max_retries: u32,
    pub retry_delay_sec: u64,

    /// Memory hint used to shrink the streaming chunk size on small boxes.
    pub memory_limit_gb: f64,

    /// Lay out only vertices with at least one incident edge.
    pub exclude_isolated_vertices: bool,
    /// Run the edge-order assertion pass after topological sorting.
    pub validate_topo_order: bool,
    /// Grid-fill everything the earlier phases left behind.
    pub fast_placement: bool,

    pub worker_id: u32,
    pub total_workers: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            store: StoreSettings::default(),
            circuit_breaker: BreakerSettings::default(),
            chunk_size: 8000,
            batch_size: 5000,
            max_workers: 4,
            max_parallel_workers: 4,
            max_retries: 3,
            retry_delay_sec: 60,
            memory_limit_gb: 4.0,
            exclude_isolated_vertices: true,
            validate_topo_order: false,
            fast_placement: true,
            worker_id: 0,
            total_workers: 1,
        }
    }
}

impl Settings {
    /// Load settings: defaults, then the optional `CITEMAP_CONFIG` TOML
    /// file, then environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut settings = match std::env::var("CITEMAP_CONFIG") {
            Ok(path) => Settings::from_file(Path::new(&path))?,
            Err(_) => Settings::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&raw)?;
        Ok(settings)
    }

    /// Apply `CITEMAP_*` overrides from any string lookup. Unparseable
    /// values are ignored and the current value is kept.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_from(&lookup, "CITEMAP_STORE_URI", &mut self.store.uri);
        override_from(&lookup, "CITEMAP_STORE_USER", &mut self.store.user);
        override_from(&lookup, "CITEMAP_STORE_PASSWORD", &mut self.store.password);
        override_from(&lookup, "CITEMAP_STORE_DATABASE", &mut self.store.database);
        override_from(&lookup, "CITEMAP_STORE_POOL_SIZE", &mut self.store.pool_size);
        override_from(&lookup, "CITEMAP_STORE_TIMEOUT_SEC", &mut self.store.timeout_sec);
        override_from(
            &lookup,
            "CITEMAP_BREAKER_FAILURE_THRESHOLD",
            &mut self.circuit_breaker.failure_threshold,
        );
        override_from(
            &lookup,
            "CITEMAP_BREAKER_RECOVERY_TIMEOUT_SEC",
            &mut self.circuit_breaker.recovery_timeout_sec,
        );
        override_from(&lookup, "CITEMAP_CHUNK_SIZE", &mut self.chunk_size);
        override_from(&lookup, "CITEMAP_BATCH_SIZE", &mut self.batch_size);
        override_from(&lookup, "CITEMAP_MAX_WORKERS", &mut self.max_workers);
        override_from(
            &lookup,
            "CITEMAP_MAX_PARALLEL_WORKERS",
            &mut self.max_parallel_workers,
        );
        override_from(&lookup, "CITEMAP_MAX_RETRIES", &mut self.max_retries);
        override_from(&lookup, "CITEMAP_RETRY_DELAY_SEC", &mut self.retry_delay_sec);
        override_from(&lookup, "CITEMAP_MEMORY_LIMIT_GB", &mut self.memory_limit_gb);
        override_from(
            &lookup,
            "CITEMAP_EXCLUDE_ISOLATED_VERTICES",
            &mut self.exclude_isolated_vertices,
        );
        override_from(
            &lookup,
            "CITEMAP_VALIDATE_TOPO_ORDER",
            &mut self.validate_topo_order,
        );
        override_from(&lookup, "CITEMAP_FAST_PLACEMENT", &mut self.fast_placement);
        override_from(&lookup, "CITEMAP_WORKER_ID", &mut self.worker_id);
        override_from(&lookup, "CITEMAP_TOTAL_WORKERS", &mut self.total_workers);
    }

    /// Streaming chunk size scaled down by the memory hint. Below 2 GB
    /// the configured size is halved, below 1 GB quartered; never under
    /// 500 rows.
    pub fn effective_chunk_size(&self) -> usize {
        let scaled = if self.memory_limit_gb < 1.0 {
            self.chunk_size / 4
        } else if self.memory_limit_gb < 2.0 {
            self.chunk_size / 2
        } else {
            self.chunk_size
        };
        scaled.max(500)
    }

    /// Write batch size bounded to the range the store handles well.
    pub fn clamped_batch_size(&self) -> usize {
        self.batch_size.clamp(1000, 5000)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_sec)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_sec)
    }

    pub fn breaker_recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker.recovery_timeout_sec)
    }

    pub fn distributed(&self) -> bool {
        self.total_workers > 1
    }
}

fn override_from<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        if let Ok(parsed) = raw.trim().parse::<T>() {
            *target = parsed;
        }
    }
}
