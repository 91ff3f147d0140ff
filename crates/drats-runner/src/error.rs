//! Runner error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a runner command.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration file could not be read.
    #[error("unable to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML for our schema.
    #[error("invalid configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Configuration parsed but makes no sense.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// No configured port by that name.
    #[error("no such port: {0}")]
    UnknownPort(String),

    #[error("callsign error: {0}")]
    Frame(#[from] drats_frame::FrameError),

    #[error("port error: {0}")]
    DataPath(#[from] drats_transport::DataPathError),

    #[error(transparent)]
    Store(#[from] drats_store::StoreError),

    #[error(transparent)]
    Router(#[from] drats_router::RouterError),

    #[error(transparent)]
    Wl2k(#[from] drats_wl2k::Wl2kError),

    /// A background job reported failure.
    #[error("{0}")]
    Failed(String),

    #[error("signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
