//! Pool configuration parameters.

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// Configuration for a [`Pool`](crate::Pool).
///
/// Controls arena size and slab geometry. Validated at construction; all
/// values are immutable once the pool exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Total arena size in bytes.
    ///
    /// Default: 64 MiB. Must be a multiple of `slab_size`.
    pub total_size: usize,

    /// Size of each slab (group) in bytes.
    ///
    /// Default: 64 KiB. Must be in `1..=MAX_SLAB_SIZE`.
    pub slab_size: usize,
}

impl PoolConfig {
    /// Default arena size: 64 MiB.
    pub const DEFAULT_TOTAL_SIZE: usize = 64 * 1024 * 1024;

    /// Default slab size: 64 KiB.
    pub const DEFAULT_SLAB_SIZE: usize = 64 * 1024;

    /// Largest permitted slab. Bounds the cost of a free-list scan and of
    /// a single `reorder`.
    pub const MAX_SLAB_SIZE: usize = 256 * 1024 * 1024;

    /// Create a config with the given geometry.
    pub fn new(total_size: usize, slab_size: usize) -> Self {
        Self {
            total_size,
            slab_size,
        }
    }

    /// Check the geometry constraints.
    pub fn validate(&self) -> Result<(), PoolError> {
        let reason = if self.slab_size == 0 {
            Some("slab size must be non-zero")
        } else if self.slab_size > Self::MAX_SLAB_SIZE {
            Some("slab size exceeds the 256 MiB maximum")
        } else if self.total_size % self.slab_size != 0 {
            Some("total size is not a multiple of slab size")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(PoolError::InvalidConfig {
                total_size: self.total_size,
                slab_size: self.slab_size,
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Number of slabs the arena is divided into.
    ///
    /// Only meaningful after [`validate`](Self::validate) succeeds.
    pub fn slab_count(&self) -> usize {
        self.total_size.checked_div(self.slab_size).unwrap_or(0)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TOTAL_SIZE, Self::DEFAULT_SLAB_SIZE)
    }
}
