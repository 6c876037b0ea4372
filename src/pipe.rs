//! Pipe Manager: owns each end of a stdio pipe pair and guarantees release
//! on every exit path. Pipes are always created close-on-exec via `pipe2`
//! so a pending exec never leaks the wrong end into an unrelated child.

use crate::{error::Result, fd::OwnedFd};
use nix::fcntl::OFlag;
use nix::unistd::pipe2;

/// One pipe, both ends still owned by the Pipe Manager. Each end is `Some`
/// until transferred (to the child, by `into_raw`, or to a caller as a
/// stream) or closed. Dropping a `CreatedPipe` with either end still `Some`
/// closes it — this is what makes `close_all` idempotent and exit-path-safe.
#[derive(Debug, Default)]
pub struct CreatedPipe {
    pub read: Option<OwnedFd>,
    pub write: Option<OwnedFd>,
}

impl CreatedPipe {
    /// Closes whichever end is still held. Safe to call more than once or on
    /// a pipe that was never fully populated.
    pub fn close_all(&mut self) {
        self.read.take();
        self.write.take();
    }

    /// Closes only the read end, leaving the write end (if any) untouched.
    pub fn close_read(&mut self) {
        self.read.take();
    }

    /// Closes only the write end, leaving the read end (if any) untouched.
    pub fn close_write(&mut self) {
        self.write.take();
    }
}

/// Creates a close-on-exec pipe pair. Close-on-exec is mandatory here: a
/// concurrent spawn running in another task must never see this fd leak into
/// an unrelated child between our fork and our dup2 sweep.
pub fn make_pipe() -> Result<CreatedPipe> {
    let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
    Ok(CreatedPipe {
        read: Some(OwnedFd::new(read)),
        write: Some(OwnedFd::new(write)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_pipe_both_ends_present() {
        let pipe = make_pipe().unwrap();
        assert!(pipe.read.is_some());
        assert!(pipe.write.is_some());
    }

    #[test]
    fn close_all_is_idempotent() {
        let mut pipe = make_pipe().unwrap();
        pipe.close_all();
        assert!(pipe.read.is_none());
        assert!(pipe.write.is_none());
        // Second call: no panic, no double close.
        pipe.close_all();
    }

    #[test]
    fn dropping_without_consuming_closes_both_ends() {
        // If this leaked fds, a long-running test process would eventually
        // hit EMFILE; exercised at scale by the integration suite instead.
        let pipe = make_pipe().unwrap();
        drop(pipe);
    }
}
