use crate::error::{Result, SimFsError};
use log::warn;

/// Block size used when none is supplied at startup.
pub const DEFAULT_BLOCK_SIZE: u64 = 512;
/// Total capacity used when none is supplied at startup (64KiB).
pub const DEFAULT_CAPACITY: u64 = 65536;

/// Geometry of the simulated disk. Both values are in bytes and are fixed for
/// the lifetime of a filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    block_size: u64,
    capacity: u64,
}

impl Config {
    /// Shorthand for building a config from an explicit block size and total
    /// capacity.
    pub fn new(block_size: u64, capacity: u64) -> Result<Self> {
        ConfigBuilder::default()
            .with_block_size(block_size)
            .with_capacity(capacity)
            .build()
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The number of whole blocks that fit in the configured capacity. Any
    /// trailing partial block is unusable.
    pub fn num_blocks(&self) -> u64 {
        self.capacity / self.block_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

pub struct ConfigBuilder {
    block_size: u64,
    capacity: u64,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder {
            block_size: DEFAULT_BLOCK_SIZE,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ConfigBuilder {
    /// Sets the size of a single block in bytes.
    pub fn with_block_size(mut self, bytes: u64) -> Self {
        self.block_size = bytes;
        self
    }

    /// Sets the total size of the simulated disk in bytes.
    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity = bytes;
        self
    }

    pub fn build(self) -> Result<Config> {
        if self.block_size == 0 {
            return Err(SimFsError::InvalidConfig(
                "block size must be positive".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(SimFsError::InvalidConfig(
                "capacity must be positive".to_string(),
            ));
        }
        if self.capacity < self.block_size {
            warn!(
                "capacity of {}B is smaller than one {}B block, no data can be stored",
                self.capacity, self.block_size
            );
        }

        Ok(Config {
            block_size: self.block_size,
            capacity: self.capacity,
        })
    }
}
