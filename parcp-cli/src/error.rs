use std::io;

use copy_error::CopyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("source {0} is not a regular file")]
    SourceNotAFile(String),

    #[error("a worker thread panicked")]
    WorkerPanicked,

    #[error(transparent)]
    CopyError(#[from] CopyError),

    #[error(transparent)]
    IoError(#[from] io::Error),
}
