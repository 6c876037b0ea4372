/*!
 * A POSIX subprocess execution core: spawn with controlled stdio,
 * credentials and session state; reap asynchronously through a single
 * process-wide SIGCHLD dispatcher; drain stdout/stderr concurrently without
 * ever letting one stream's backpressure stall the other.
 *
 * This crate does not provide fluent builder ergonomics, argument-parsing
 * helpers, or a shell/job-control layer. Callers build a [`SpawnRequest`]
 * value directly and hand it to [`run`], [`run_captured`], or
 * [`run_detached`].
 *
 * # Platform support
 * Linux only. There is no fallback backend for other platforms.
 */
mod asyncio;
mod config;
mod credentials;
mod error;
mod execution;
mod fd;
mod pipe;
mod reaper;
mod request;
mod run;
mod spawn;
mod status;
mod stdio;

pub use asyncio::PipeStream;
pub use config::Settings;
pub use credentials::{Credentials, InheritedFd, PreExecHook, ProcessGroup};
pub use error::{Error, ErrorKind, Result};
pub use execution::Execution;
pub use reaper::Reaper;
pub use request::{Environment, SpawnRequest};
pub use run::{
    run, run_captured, run_detached, run_detached_with_settings, run_with_settings, BodyFuture,
};
pub use status::{ProcessIdentifier, TerminationStatus};
pub use stdio::{Stderr, Stdin, Stdout, StdioSpecification};
