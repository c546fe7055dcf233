// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache storage backends.
//!
//! - [`memory`]: in-process store with lazy TTL eviction
//! - [`redis`]: shared network cache
//! - [`manager`]: one-time backend selection with typed JSON access

pub mod traits;
pub mod memory;
pub mod redis;
pub mod manager;

pub use manager::{BackendSelection, CacheManager};
pub use traits::{BackendKind, CacheStore, StorageError};
