//! External interfaces: `run`, its capture-both convenience, and
//! `run_detached` — plain value in, handle or captured output out, with no
//! fluent builder in between.

use crate::{
    config::Settings,
    error::Result,
    execution::Execution,
    reaper::Reaper,
    request::SpawnRequest,
    spawn,
    status::{ProcessIdentifier, TerminationStatus},
    stdio::{Stderr, Stdout},
};
use std::future::Future;
use std::pin::Pin;

/// A body future borrowing the `Execution` it was handed. Boxed because a
/// plain `FnOnce(&mut Execution) -> Fut` can't express "the future borrows
/// its argument" without higher-ranked associated types; this is the
/// standard workaround for that shape pending async closures.
pub type BodyFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Spawns `request`, hands the running child to `body`, and awaits both
/// `body` and the child's termination concurrently. Returns whatever `body`
/// returned alongside the `TerminationStatus`. Uses `Settings::default()`;
/// see [`run_with_settings`] to control reaper-installation timing.
///
/// `body` and the wait for termination run concurrently, not sequentially:
/// a `body` that streams stdout as the child produces it, for a child that
/// blocks writing to a full pipe until its output is drained, would
/// deadlock if the wait were sequenced after `body` instead.
pub async fn run<F, T>(request: SpawnRequest, body: F) -> Result<(T, TerminationStatus)>
where
    F: for<'a> FnOnce(&'a mut Execution) -> BodyFuture<'a, T>,
{
    run_with_settings(request, &Settings::default(), body).await
}

/// As [`run`], but with an explicit [`Settings`] rather than the default.
pub async fn run_with_settings<F, T>(
    request: SpawnRequest,
    settings: &Settings,
    body: F,
) -> Result<(T, TerminationStatus)>
where
    F: for<'a> FnOnce(&'a mut Execution) -> BodyFuture<'a, T>,
{
    let outcome = spawn::spawn(request, settings)?;
    let reaper = Reaper::install();
    let pid = outcome.pid.as_raw();
    let mut execution =
        Execution::new(pid, reaper.clone(), outcome.stdin, outcome.stdout, outcome.stderr);

    let body_fut = body(&mut execution);
    let wait_fut = reaper.wait_for(pid);
    let (body_result, status) = tokio::join!(body_fut, wait_fut);
    Ok((body_result, status))
}

/// Convenience overload of [`run`]: stdout and stderr are piped and drained
/// with [`Execution::capture_both`], stdin is whatever the request already
/// specifies (callers who want no input get it from
/// [`crate::stdio::StdioSpecification`]'s default).
pub async fn run_captured(
    mut request: SpawnRequest,
) -> Result<(Vec<u8>, Vec<u8>, TerminationStatus)> {
    request.stdio.stdout = Stdout::Piped;
    request.stdio.stderr = Stderr::Piped;
    let (captured, status) = run(request, |execution| {
        Box::pin(async move { execution.capture_both().await })
    })
    .await?;
    let (stdout_bytes, stderr_bytes) = captured?;
    Ok((stdout_bytes, stderr_bytes, status))
}

/// Spawns `request` and returns its pid without installing any waiter — the
/// caller never blocks on this child, and it is the caller's responsibility
/// to eventually observe its termination through some other means if that
/// matters. The Reaper still collects it (it is process-wide and reaps
/// every exited child, whether anyone is waiting or not) so it never
/// becomes a zombie; [`Reaper::forget`] tells it nobody will ever claim the
/// status, so it's discarded on reap instead of sitting in the map forever.
pub fn run_detached(request: SpawnRequest) -> Result<ProcessIdentifier> {
    run_detached_with_settings(request, &Settings::default())
}

/// As [`run_detached`], but with an explicit [`Settings`] rather than the default.
pub fn run_detached_with_settings(
    request: SpawnRequest,
    settings: &Settings,
) -> Result<ProcessIdentifier> {
    let outcome = spawn::spawn(request, settings)?;
    // A detached spawn never reads these back; dropping closes them so the
    // parent doesn't hold the child's own stdio pipe ends open forever.
    drop(outcome.stdin);
    drop(outcome.stdout);
    drop(outcome.stderr);
    let pid = outcome.pid.as_raw();
    Reaper::install().forget(pid);
    Ok(pid)
}
