use std::path::PathBuf;

use copy_error::{CopyError, Result};

/// Size of one transfer block in bytes.
///
/// Every worker partitions against this same constant; the geometry of a
/// job is derived from the one shared [`Job`], never from per-worker state.
pub const TRANSFER_BLOCK_SIZE: u64 = 1_048_576;

/// Immutable description of one copy job, shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct Job {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub total_size: u64,
    pub block_size: u64,
    pub worker_count: usize,
}

impl Job {
    pub fn new(
        source: PathBuf,
        destination: PathBuf,
        total_size: u64,
        block_size: u64,
        worker_count: usize,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(CopyError::Config(
                "transfer block size must be non-zero".to_owned(),
            ));
        }
        if worker_count == 0 {
            return Err(CopyError::Config(
                "at least one worker is required".to_owned(),
            ));
        }
        Ok(Self {
            source,
            destination,
            total_size,
            block_size,
            worker_count,
        })
    }

    /// Number of full transfer blocks; the partial tail is excluded.
    pub fn total_blocks(&self) -> u64 {
        self.total_size / self.block_size
    }

    /// Byte offset of the tail segment.
    pub fn tail_offset(&self) -> u64 {
        self.total_blocks() * self.block_size
    }

    /// Length of the tail segment in bytes, possibly zero.
    pub fn tail_len(&self) -> u64 {
        self.total_size - self.tail_offset()
    }

    /// The block range owned by `rank`.
    pub fn partition(&self, rank: usize) -> Partition {
        partition(self.total_size, self.block_size, self.worker_count, rank)
    }
}

/// Contiguous range of transfer blocks owned by a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub rank: usize,
    pub start_block: u64,
    pub block_count: u64,
}

impl Partition {
    pub fn start_byte(&self, block_size: u64) -> u64 {
        self.start_block * block_size
    }

    pub fn byte_len(&self, block_size: u64) -> u64 {
        self.block_count * block_size
    }

    pub fn is_empty(&self) -> bool {
        self.block_count == 0
    }
}

/// Compute the block range owned by `rank` out of `worker_count` workers.
///
/// Blocks are laid out contiguously in rank order with no gaps; the first
/// `total_blocks % worker_count` ranks carry one extra block each, shifting
/// the start of every subsequent rank accordingly. Deterministic and free
/// of side effects, so every worker derives its own range without
/// communication.
///
/// When `worker_count` exceeds the number of full blocks, the surplus ranks
/// receive an empty range; when `block_size` exceeds `total_size`, every
/// range is empty and the whole file is the tail segment.
pub fn partition(
    total_size: u64,
    block_size: u64,
    worker_count: usize,
    rank: usize,
) -> Partition {
    assert!(worker_count > 0, "worker_count must be non-zero");
    assert!(rank < worker_count, "rank {rank} out of range");

    let workers = worker_count as u64;
    let rank_index = rank as u64;
    let total_blocks = total_size / block_size;
    let base = total_blocks / workers;
    let remainder = total_blocks % workers;

    let block_count = if rank_index < remainder { base + 1 } else { base };
    let start_block = rank_index * base + rank_index.min(remainder);

    Partition {
        rank,
        start_block,
        block_count,
    }
}
