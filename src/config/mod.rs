// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod capabilities;
mod settings;

pub use capabilities::{Capabilities, ComponentDiscovery, EDGE_LABEL_CANONICAL, EDGE_LABEL_LEGACY};
pub use settings::{BreakerSettings, Settings, StoreSettings};
