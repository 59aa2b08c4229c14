//! Error taxonomy for weaveutil
//!
//! Every daemon-facing error carries the operation that failed and the
//! container or image it targeted.

use thiserror::Error;

/// Errors surfaced by weaveutil operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or insufficient command-line input
    #[error("{message}")]
    Usage {
        /// Subcommand whose usage should be shown
        command: &'static str,
        message: String,
    },

    /// The daemon could not be reached
    #[error("unable to {op} {target}: cannot reach docker daemon: {message}")]
    Connection {
        op: &'static str,
        target: String,
        message: String,
    },

    /// The referenced container or image does not exist
    #[error("unable to {op} {target}: no such container or image: {message}")]
    NotFound {
        op: &'static str,
        target: String,
        message: String,
    },

    /// The daemon rejected the operation
    #[error("unable to {op} {target}: {message}")]
    Operation {
        op: &'static str,
        target: String,
        message: String,
    },
}

impl Error {
    pub fn usage(command: &'static str, message: impl Into<String>) -> Self {
        Error::Usage {
            command,
            message: message.into(),
        }
    }

    /// Classify a bollard error and tag it with the failing operation
    pub fn from_docker(op: &'static str, target: &str, err: bollard::errors::Error) -> Self {
        use bollard::errors::Error as DockerError;

        let target = target.to_string();
        match err {
            DockerError::DockerResponseServerError {
                status_code: 404,
                message,
            } => Error::NotFound {
                op,
                target,
                message,
            },
            DockerError::DockerResponseServerError { message, .. } => Error::Operation {
                op,
                target,
                message,
            },
            e @ (DockerError::IOError { .. } | DockerError::HyperResponseError { .. }) => {
                Error::Connection {
                    op,
                    target,
                    message: e.to_string(),
                }
            }
            e => Error::Operation {
                op,
                target,
                message: e.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// The underlying message, without the operation prefix
    pub fn detail(&self) -> &str {
        match self {
            Error::Usage { message, .. }
            | Error::Connection { message, .. }
            | Error::NotFound { message, .. }
            | Error::Operation { message, .. } => message,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage { .. } => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
