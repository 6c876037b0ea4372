//! Stdio disposition trio. What a caller does with a `Piped` end afterwards
//! (stream it or drain it with `capture_both`) is an [`crate::Execution`]
//! concern, not a disposition variant — this layer only needs to know
//! whether a pipe was created.

use std::os::unix::io::RawFd;

#[derive(Debug, Clone)]
pub enum Stdin {
    /// Child's stdin reads from `/dev/null`-equivalent.
    Null,
    /// Child's stdin is fd `fd`, inherited from the parent.
    ReadFrom { fd: RawFd, close_after_spawn: bool },
    /// A pipe is created; the write end is handed to the caller.
    Piped,
}

#[derive(Debug, Clone)]
pub enum Stdout {
    /// Output is discarded (dup2'd from `/dev/null`).
    Discarded,
    /// Output goes to fd `fd`, inherited from the parent.
    WriteTo { fd: RawFd, close_after_spawn: bool },
    /// A pipe is created; the read end is owned by the resulting
    /// [`crate::Execution`].
    Piped,
}

/// Stderr has the same shape as stdout but is a distinct type so a
/// `Stdout` value can never be passed where `Stderr` was meant, or vice
/// versa — stdout and stderr consumption are tracked independently and
/// this separation makes conflating them unrepresentable at the type level.
pub type Stderr = Stdout;

#[derive(Debug, Clone)]
pub struct StdioSpecification {
    pub stdin: Stdin,
    pub stdout: Stdout,
    pub stderr: Stderr,
}

impl Default for StdioSpecification {
    fn default() -> Self {
        StdioSpecification {
            stdin: Stdin::Null,
            stdout: Stdout::Discarded,
            stderr: Stderr::Discarded,
        }
    }
}
