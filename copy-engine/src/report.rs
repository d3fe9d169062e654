use std::fmt;

use copy_collective::Collective;
use copy_error::Result;
use log::debug;

use crate::transfer::TransferResult;

/// Aggregate outcome of a copy job, reported once by rank 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobSummary {
    pub total_bytes: u64,
    pub elapsed_secs: f64,
}

impl JobSummary {
    /// Effective throughput in bytes per second.
    pub fn throughput(&self) -> f64 {
        self.total_bytes as f64 / self.elapsed_secs
    }
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "copied {} bytes in {:.6} s ({:.2} bytes/s)",
            self.total_bytes,
            self.elapsed_secs,
            self.throughput()
        )
    }
}

/// Fold every worker's elapsed time into the group-wide maximum.
///
/// The job is only as fast as its slowest worker, so the maximum, not the
/// mean, is the effective parallel copy time. Returns `Some` on rank 0,
/// the designated reporting worker, and `None` everywhere else.
pub fn converge<C: Collective>(
    group: &C,
    result: &TransferResult,
    total_bytes: u64,
) -> Result<Option<JobSummary>> {
    let elapsed_secs = group.reduce_max(result.elapsed.as_secs_f64())?;
    debug!("rank {}: job wall time {elapsed_secs:.6} s", group.rank());

    if group.rank() == 0 {
        Ok(Some(JobSummary {
            total_bytes,
            elapsed_secs,
        }))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_renders_one_line() {
        let summary = JobSummary {
            total_bytes: 1_048_576,
            elapsed_secs: 2.0,
        };
        assert_eq!(summary.throughput(), 524_288.0);
        assert_eq!(
            summary.to_string(),
            "copied 1048576 bytes in 2.000000 s (524288.00 bytes/s)"
        );
    }
}
