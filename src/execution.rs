//! The Execution Controller: the handle a caller gets back from spawning, and
//! the only place stdout/stderr are allowed to be consumed from. stdout and
//! stderr each carry their own consumption bit, so taking one can never
//! silently poison the other.

use crate::{
    asyncio::PipeStream,
    error::{Error, Result},
    fd::OwnedFd,
    reaper::Reaper,
    status::{ProcessIdentifier, TerminationStatus},
};
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::io::AsyncReadExt;

const STDOUT_CONSUMED: u8 = 0b01;
const STDERR_CONSUMED: u8 = 0b10;

/// A running (or already-exited-but-not-yet-awaited) child. Owns the parent
/// side of whatever stdio pipes were requested and the reaper registration
/// for its pid.
///
/// Consuming stdout or stderr is strictly one-shot per stream: each stream
/// has its own bit in `consumed`, set exactly once, so taking one stream can
/// never poison the other.
pub struct Execution {
    pid: ProcessIdentifier,
    reaper: Reaper,
    stdin: Option<OwnedFd>,
    stdout: Option<OwnedFd>,
    stderr: Option<OwnedFd>,
    consumed: AtomicU8,
}

impl Execution {
    pub(crate) fn new(
        pid: ProcessIdentifier,
        reaper: Reaper,
        stdin: Option<OwnedFd>,
        stdout: Option<OwnedFd>,
        stderr: Option<OwnedFd>,
    ) -> Self {
        Execution {
            pid,
            reaper,
            stdin,
            stdout,
            stderr,
            consumed: AtomicU8::new(0),
        }
    }

    pub fn pid(&self) -> ProcessIdentifier {
        self.pid
    }

    /// Awaits this child's termination. Multiple callers may await the same
    /// `Execution` concurrently; the reaper's rendezvous handles the first
    /// one queuing and the rest not existing, since `Execution` itself is not
    /// `Clone` — cloning the wait is a future extension, not something this
    /// crate needs today.
    pub async fn wait(&self) -> TerminationStatus {
        self.reaper.wait_for(self.pid).await
    }

    /// Takes the write end of stdin, if the request asked for
    /// [`crate::stdio::Stdin::Piped`]. Can be taken exactly once; later calls
    /// get `None`, matching `Option::take`'s normal semantics (this stream
    /// has no ordering invariant with stdout/stderr consumption, so it is not
    /// gated through `consumed`).
    pub fn stdin(&mut self) -> Option<io::Result<PipeStream>> {
        self.stdin.take().map(PipeStream::new)
    }

    /// Takes a streaming view of stdout. Panics if stdout was not piped, or
    /// if stdout has already been consumed (by this call or by
    /// [`Execution::capture_both`]) — exactly one consumer per stream, ever.
    pub fn stdout(&mut self) -> io::Result<PipeStream> {
        self.take_stream(STDOUT_CONSUMED, "stdout")
    }

    /// Takes a streaming view of stderr. Stderr has its own bit in
    /// `consumed`, independent of stdout's — taking one never marks the
    /// other taken.
    pub fn stderr(&mut self) -> io::Result<PipeStream> {
        self.take_stream(STDERR_CONSUMED, "stderr")
    }

    fn take_stream(&mut self, bit: u8, name: &'static str) -> io::Result<PipeStream> {
        let previous = self.consumed.fetch_or(bit, Ordering::AcqRel);
        if previous & bit != 0 {
            panic!("{name} already consumed from this Execution");
        }
        let fd = match name {
            "stdout" => self.stdout.take(),
            _ => self.stderr.take(),
        };
        let fd = fd.unwrap_or_else(|| panic!("{name} was not piped for this Execution"));
        PipeStream::new(fd)
    }

    /// Concurrently drains stdout and stderr to completion, returning both in
    /// full. Structured concurrency: if the returned future is dropped before
    /// it resolves (the caller cancelled it, e.g. via a timeout), both
    /// drainers are dropped together and whatever bytes were read so far are
    /// discarded — cancelling a capture never sends the child a signal, it
    /// only stops listening.
    ///
    /// Marks both streams consumed up front, so a caller cannot call
    /// `capture_both` and then also call `stdout()`/`stderr()` on the same
    /// `Execution`.
    pub async fn capture_both(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let stdout_previous = self.consumed.fetch_or(STDOUT_CONSUMED, Ordering::AcqRel);
        let stderr_previous = self.consumed.fetch_or(STDERR_CONSUMED, Ordering::AcqRel);
        if stdout_previous & STDOUT_CONSUMED != 0 {
            panic!("stdout already consumed from this Execution");
        }
        if stderr_previous & STDERR_CONSUMED != 0 {
            panic!("stderr already consumed from this Execution");
        }

        let stdout_fd = self
            .stdout
            .take()
            .ok_or_else(|| Error::InvalidConfiguration {
                reason: "stdout was not piped for this Execution".into(),
            })?;
        let stderr_fd = self
            .stderr
            .take()
            .ok_or_else(|| Error::InvalidConfiguration {
                reason: "stderr was not piped for this Execution".into(),
            })?;

        let mut stdout_reader = PipeStream::new(stdout_fd)?;
        let mut stderr_reader = PipeStream::new(stderr_fd)?;

        let stdout_fut = async {
            let mut buf = Vec::new();
            stdout_reader.read_to_end(&mut buf).await.map(|_| buf)
        };
        let stderr_fut = async {
            let mut buf = Vec::new();
            stderr_reader.read_to_end(&mut buf).await.map(|_| buf)
        };
        let (stdout_bytes, stderr_bytes) = tokio::try_join!(stdout_fut, stderr_fut)?;
        Ok((stdout_bytes, stderr_bytes))
    }
}

// Any stream never consumed is closed by `OwnedFd`'s own `Drop` when this
// `Execution` is dropped. That never signals the child — going out of scope
// is not a cancellation request.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumed_bits_are_independent() {
        let consumed = AtomicU8::new(0);
        let prev_out = consumed.fetch_or(STDOUT_CONSUMED, Ordering::AcqRel);
        assert_eq!(prev_out & STDOUT_CONSUMED, 0);
        let prev_err = consumed.fetch_or(STDERR_CONSUMED, Ordering::AcqRel);
        assert_eq!(prev_err & STDERR_CONSUMED, 0);
        let prev_out_again = consumed.fetch_or(STDOUT_CONSUMED, Ordering::AcqRel);
        assert_ne!(prev_out_again & STDOUT_CONSUMED, 0);
    }
}
