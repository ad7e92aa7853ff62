// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability for the plugin host.
//!
//! Log text lives in struct-based message types under [`messages`] instead of
//! being scattered through the code as string literals. The library only
//! emits `tracing` events; installing a subscriber is left to the binary.

pub mod messages;
