mod cli;
mod error;

use std::fs;
use std::thread;

use clap::Parser;
use copy_collective::LocalCollective;
use copy_engine::{converge, run_worker, JobSummary};
use copy_error::CopyError;
use copy_partition::{Job, TRANSFER_BLOCK_SIZE};
use log::debug;

use crate::cli::Cli;
use crate::error::AppError;

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("parcp: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let metadata = fs::metadata(&cli.source).map_err(|source| {
        CopyError::SizeDetermination {
            path: cli.source.clone(),
            source,
        }
    })?;
    if !metadata.is_file() {
        return Err(AppError::SourceNotAFile(
            cli.source.display().to_string(),
        ));
    }

    let workers = match cli.workers {
        Some(count) => count,
        None => thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1),
    };
    debug!("running with {workers} workers");

    let job = Job::new(
        cli.source,
        cli.destination,
        metadata.len(),
        TRANSFER_BLOCK_SIZE,
        workers,
    )?;

    let summary = run_workers(&job, workers)?;
    println!("{summary}");
    Ok(())
}

/// Launch one worker thread per rank and wait for the whole group.
///
/// The first worker error wins and becomes the process outcome; a
/// successful job yields exactly one summary, from rank 0.
fn run_workers(job: &Job, workers: usize) -> Result<JobSummary, AppError> {
    let group = LocalCollective::group(workers);

    thread::scope(|scope| {
        let handles: Vec<_> = group
            .into_iter()
            .map(|member| {
                scope.spawn(
                    move || -> Result<Option<JobSummary>, CopyError> {
                        let result = run_worker(job, &member)?;
                        converge(&member, &result, job.total_size)
                    },
                )
            })
            .collect();

        let mut summary = None;
        let mut first_error = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(Some(s))) => summary = Some(s),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(AppError::from(e));
                    }
                }
                Err(_) => {
                    if first_error.is_none() {
                        first_error = Some(AppError::WorkerPanicked);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => summary.ok_or(AppError::WorkerPanicked),
        }
    })
}
