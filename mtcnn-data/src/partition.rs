//! Communication-free partition of a cyclic record stream among workers.

use crate::common::*;

/// The execution mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Train,
    Eval,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Train
    }
}

/// The `(rank, world_size)` pair of a worker.
///
/// Every worker traverses the same stream and advances its cursor on every
/// record. A worker keeps a record only if the logical offset of that record
/// modulo `world_size` equals its `rank`. Workers must start from the same
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PartitionConfig", into = "PartitionConfig")]
pub struct Partition {
    rank: usize,
    world_size: usize,
}

impl Partition {
    pub fn new(rank: usize, world_size: usize) -> Result<Self> {
        if world_size == 0 {
            return Err(Error::config("world_size must be positive"));
        }
        if rank >= world_size {
            return Err(Error::config(format!(
                "rank {} is out of range for world_size {}",
                rank, world_size
            )));
        }
        Ok(Self { rank, world_size })
    }

    /// The partition of a single worker that owns every record.
    pub fn single() -> Self {
        Self {
            rank: 0,
            world_size: 1,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// Whether the worker consumes the record at `offset`.
    ///
    /// Only one worker is active in evaluation mode, so it keeps everything.
    pub fn keeps(&self, offset: u64, mode: ExecutionMode) -> bool {
        mode == ExecutionMode::Eval || offset % self.world_size as u64 == self.rank as u64
    }

    /// The negation of [`Partition::keeps`].
    pub fn skips(&self, offset: u64, mode: ExecutionMode) -> bool {
        !self.keeps(offset, mode)
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self::single()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PartitionConfig {
    rank: usize,
    world_size: usize,
}

impl TryFrom<PartitionConfig> for Partition {
    type Error = Error;

    fn try_from(from: PartitionConfig) -> Result<Self> {
        Self::new(from.rank, from.world_size)
    }
}

impl From<Partition> for PartitionConfig {
    fn from(from: Partition) -> Self {
        Self {
            rank: from.rank,
            world_size: from.world_size,
        }
    }
}
