use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("{program} exited with {status}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} timed out after {timeout:?}")]
    CommandTimeout { program: String, timeout: Duration },

    #[error("Repository connect failed: {0}")]
    Connect(String),
}

pub type Result<T> = std::result::Result<T, Error>;
