//! Surrogate key allocation for fact rows
//!
//! Keys are unique within a run and strictly increasing in allocation order.
//! They carry no meaning and are not stable across runs.

use crate::config::IdStrategy;
use crate::error::Result;

/// Bits reserved for the offset inside a partition-tagged block
const OFFSET_BITS: u32 = 33;

#[derive(Debug, Clone)]
pub struct KeyAllocator {
    strategy: IdStrategy,
    issued: u64,
}

impl KeyAllocator {
    /// Rejects partition-tagged strategies whose block size cannot hold a key
    pub fn new(strategy: IdStrategy) -> Result<Self> {
        strategy.validate()?;
        Ok(Self {
            strategy,
            issued: 0,
        })
    }

    /// Number of keys handed out so far
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Allocate the next `count` keys
    pub fn allocate(&mut self, count: usize) -> Vec<i64> {
        let start = self.issued;
        self.issued += count as u64;

        (start..self.issued)
            .map(|position| match self.strategy {
                IdStrategy::Sequential => position as i64,
                IdStrategy::PartitionTagged { rows_per_partition } => {
                    let block = rows_per_partition as u64;
                    (((position / block) << OFFSET_BITS) | (position % block)) as i64
                }
            })
            .collect()
    }
}
