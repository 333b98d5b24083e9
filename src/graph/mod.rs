// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod breaker;
pub mod client;
pub mod memory;
pub mod store;

pub use breaker::{BreakerState, CircuitBreaker};
pub use client::Neo4jClient;
pub use memory::MemoryGraphStore;
pub use store::Neo4jGraphStore;
