use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use copy_collective::Collective;
use copy_error::{CopyError, IoPhase, Result};
use copy_partition::Job;
use log::{debug, info};

/// Outcome of one worker's transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferResult {
    pub rank: usize,
    pub bytes_copied: u64,
    pub elapsed: Duration,
}

/// Run one worker's share of the copy described by `job`.
///
/// Opens both files, waits for the rest of the group to do the same, then
/// copies this rank's block range in ascending offset order. Rank 0
/// additionally copies the tail segment once the second barrier confirms
/// that every main-range transfer has finished. Any failure triggers the
/// group-wide abort before the error is returned, so no peer is left
/// waiting at a barrier.
pub fn run_worker<C: Collective>(
    job: &Job,
    group: &C,
) -> Result<TransferResult> {
    if job.worker_count != group.size() {
        group.abort();
        return Err(CopyError::Config(format!(
            "job expects {} workers but the group has {}",
            job.worker_count,
            group.size()
        )));
    }

    let rank = group.rank();
    let part = job.partition(rank);

    if rank == 0 {
        info!(
            "copying {} to {}: {} bytes, {} full blocks of {} bytes, {} tail bytes",
            job.source.display(),
            job.destination.display(),
            job.total_size,
            job.total_blocks(),
            job.block_size,
            job.tail_len()
        );
    }
    debug!(
        "rank {} covers bytes {}..{}",
        rank,
        part.start_byte(job.block_size),
        part.start_byte(job.block_size) + part.byte_len(job.block_size)
    );

    let mut source = abort_on_err(open_source(&job.source), group)?;
    let mut dest = abort_on_err(open_destination(&job.destination), group)?;

    // All files are open everywhere before the first timed byte moves.
    group.barrier()?;

    let start = Instant::now();
    let mut bytes_copied = 0u64;
    let mut buffer = vec![0u8; job.block_size as usize];

    if !part.is_empty() {
        let start_byte = part.start_byte(job.block_size);
        abort_on_err(seek_both(&mut source, &mut dest, start_byte), group)?;

        // The range is contiguous, so sequential cursors keep each block
        // at offset index * block_size without per-block seeks.
        for index in part.start_block..part.start_block + part.block_count {
            let offset = index * job.block_size;
            abort_on_err(
                copy_block(&mut source, &mut dest, &mut buffer, offset),
                group,
            )?;
            bytes_copied += job.block_size;
        }
    }
    let mut elapsed = start.elapsed();

    // Every main-range transfer is complete before the tail is touched.
    group.barrier()?;

    if rank == 0 && job.tail_len() > 0 {
        let offset = job.tail_offset();
        let len = job.tail_len() as usize;
        debug!("rank 0 copies the {len} residual bytes at offset {offset}");

        abort_on_err(seek_both(&mut source, &mut dest, offset), group)?;
        abort_on_err(
            copy_block(&mut source, &mut dest, &mut buffer[..len], offset),
            group,
        )?;
        bytes_copied += job.tail_len();
        elapsed = start.elapsed();
    }

    info!(
        "rank {} copied {} bytes in {:.3} s ({:.2} MiB/s)",
        rank,
        bytes_copied,
        elapsed.as_secs_f64(),
        bytes_copied as f64 / 1_048_576.0 / elapsed.as_secs_f64()
    );

    Ok(TransferResult {
        rank,
        bytes_copied,
        elapsed,
    })
}

/// Propagate `result`, aborting the whole group first if it is an error.
fn abort_on_err<T, C: Collective>(result: Result<T>, group: &C) -> Result<T> {
    if result.is_err() {
        group.abort();
    }
    result
}

fn open_source(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| CopyError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn open_destination(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .open(path)
        .map_err(|source| CopyError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn seek_both(source: &mut File, dest: &mut File, offset: u64) -> Result<()> {
    source
        .seek(SeekFrom::Start(offset))
        .map_err(|e| io_error(IoPhase::Read, offset, e))?;
    dest.seek(SeekFrom::Start(offset))
        .map_err(|e| io_error(IoPhase::Write, offset, e))?;
    Ok(())
}

/// Read exactly `buffer.len()` bytes and write them back out at the same
/// offset. A short read or write surfaces as the corresponding phase error.
fn copy_block(
    source: &mut File,
    dest: &mut File,
    buffer: &mut [u8],
    offset: u64,
) -> Result<()> {
    source
        .read_exact(buffer)
        .map_err(|e| io_error(IoPhase::Read, offset, e))?;
    dest.write_all(buffer)
        .map_err(|e| io_error(IoPhase::Write, offset, e))?;
    Ok(())
}

fn io_error(phase: IoPhase, offset: u64, source: std::io::Error) -> CopyError {
    CopyError::Io {
        phase,
        offset,
        source,
    }
}
