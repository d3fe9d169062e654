use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CopyError>;

/// Phase of a block transfer in which an I/O failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoPhase {
    Read,
    Write,
}

impl fmt::Display for IoPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoPhase::Read => write!(f, "read"),
            IoPhase::Write => write!(f, "write"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("cannot determine size of source file {}: {}", .path.display(), .source)]
    SizeDetermination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open {}: {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{phase} failed at offset {offset}: {source}")]
    Io {
        phase: IoPhase,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Collective(#[from] CollectiveError),
}

/// Transport-level failure of a barrier or reduction.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectiveError {
    #[error("collective group aborted")]
    Aborted,

    #[error("collective state poisoned by a failed worker")]
    Poisoned,
}
