// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod layout;
mod store;

pub use layout::LayoutError;
pub use store::StoreError;
