//! Error type for the spawn/reap/drain core.

/// Coarse classification of an [`Error`], for callers deciding whether to
/// surface it to a human or just retry.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ErrorKind {
    /// The request itself was invalid: bad path, bad credentials, conflicting options.
    UserFault,
    /// Something about the OS environment prevented the spawn or the I/O that followed.
    Environment,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("executable not found: {path}")]
    ExecutableNotFound { path: std::path::PathBuf },

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("resource exhausted: {reason}")]
    ResourceExhausted { reason: String },

    #[error("child failed before exec (os error {os_error})")]
    SpawnFailed { os_error: i32 },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("io failure")]
    IoFailure {
        #[from]
        cause: std::io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ExecutableNotFound { .. }
            | Error::InvalidConfiguration { .. }
            | Error::PermissionDenied { .. } => ErrorKind::UserFault,
            Error::ResourceExhausted { .. } | Error::SpawnFailed { .. } | Error::IoFailure { .. } => {
                ErrorKind::Environment
            }
        }
    }

    pub fn is_user_fault(&self) -> bool {
        self.kind() == ErrorKind::UserFault
    }

    pub fn is_environment(&self) -> bool {
        self.kind() == ErrorKind::Environment
    }
}

impl From<nix::Error> for Error {
    fn from(err: nix::Error) -> Self {
        let os_error = err as i32;
        match err {
            nix::Error::EACCES | nix::Error::EPERM => Error::PermissionDenied {
                reason: err.to_string(),
            },
            nix::Error::ENOENT => Error::ExecutableNotFound {
                path: std::path::PathBuf::new(),
            },
            nix::Error::EMFILE | nix::Error::ENFILE | nix::Error::ENOMEM | nix::Error::EAGAIN => {
                Error::ResourceExhausted {
                    reason: err.to_string(),
                }
            }
            _ => Error::SpawnFailed { os_error },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
