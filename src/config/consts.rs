// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default fuel budget per guest call (100 million instructions)
pub const DEFAULT_FUEL_LEVEL: u64 = 100_000_000;
/// Minimum allowed fuel budget (1 million instructions)
pub const MIN_FUEL_LEVEL: u64 = 1_000_000;
/// Maximum allowed fuel budget (500 million instructions) - security limit
pub const MAX_FUEL_LEVEL: u64 = 500_000_000;

/// Default linear memory limit per instance (64 MiB)
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 64 * 1024 * 1024;
/// Smallest accepted memory limit: one WASM page
pub const MIN_MAX_MEMORY_BYTES: usize = 64 * 1024;
