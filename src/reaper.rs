//! The process-wide reaper: one SIGCHLD dispatcher, one `pid -> WaiterState`
//! map, lock-mediated rendezvous between whichever of "child dies" and
//! "caller awaits" happens first. `waitpid(-1, WNOHANG)` is drained in a
//! loop on every signal, since multiple deaths can coalesce into a single
//! SIGCHLD delivery.

use crate::status::{pid_of, ProcessIdentifier, TerminationStatus};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;

enum WaiterState {
    Waiting(oneshot::Sender<TerminationStatus>),
    Ready(TerminationStatus),
    /// Registered by `run_detached`: nobody will ever call `wait_for` for
    /// this pid, so a status reaped for it is discarded rather than kept
    /// around forever.
    Detached,
}

struct Inner {
    waiters: Mutex<HashMap<ProcessIdentifier, WaiterState>>,
}

/// Process-wide singleton. Obtained via [`Reaper::install`], which is
/// idempotent: the first caller (typically the first `spawn`) pays for the
/// signal-handler registration and background task, everyone after gets the
/// same handle.
#[derive(Clone)]
pub struct Reaper {
    inner: Arc<Inner>,
}

static REAPER: OnceCell<Reaper> = OnceCell::new();

impl Reaper {
    /// Installs the SIGCHLD dispatcher if it is not already installed, and
    /// returns the singleton handle. A successful spawn implies this has run
    /// before the fork — `crate::spawn::spawn` calls this itself, so callers
    /// normally never need to.
    ///
    /// The `signal(SignalKind::child())` registration happens synchronously,
    /// before this function returns, rather than inside the spawned dispatch
    /// task. Registration only on the task's first poll would leave a window
    /// between `install()` returning and the handler actually being armed;
    /// a child forked inside that window could exit and deliver SIGCHLD
    /// before anything was listening for it, leaving `wait_for` to hang
    /// forever on a status that was never observed.
    pub fn install() -> Reaper {
        if let Some(reaper) = REAPER.get() {
            return reaper.clone();
        }
        let stream = signal(SignalKind::child()).expect("failed to install SIGCHLD handler");
        let inner = Arc::new(Inner {
            waiters: Mutex::new(HashMap::new()),
        });
        let dispatch_inner = inner.clone();
        REAPER
            .get_or_init(move || {
                tokio::spawn(async move {
                    let mut stream = stream;
                    tracing::debug!("reaper dispatch task started");
                    while stream.recv().await.is_some() {
                        Self::drain(&dispatch_inner);
                    }
                });
                Reaper { inner }
            })
            .clone()
    }

    /// Drains every terminated child visible right now. Signals coalesce, so
    /// a single SIGCHLD delivery can represent more than one dead child —
    /// the loop keeps calling `waitpid(-1, WNOHANG)` until it reports no
    /// further terminated children, not just once per wakeup.
    fn drain(inner: &Inner) {
        let mut waiters = inner.waiters.lock().unwrap();
        loop {
            let status = match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(status) => status,
                Err(nix::Error::EINTR) => continue,
                Err(_) => break,
            };
            let Some(pid) = pid_of(&status) else {
                break;
            };
            let Some(term) = TerminationStatus::from_wait_status(status) else {
                // Stopped/continued: not terminal at this layer, keep draining.
                continue;
            };
            tracing::trace!(pid = pid.as_raw(), ?term, "reaped child");
            match waiters.remove(&pid.as_raw()) {
                Some(WaiterState::Waiting(tx)) => {
                    let _ = tx.send(term);
                }
                Some(WaiterState::Detached) => {
                    tracing::trace!(pid = pid.as_raw(), "discarding status of detached child");
                }
                None | Some(WaiterState::Ready(_)) => {
                    waiters.insert(pid.as_raw(), WaiterState::Ready(term));
                }
            }
        }
    }

    /// Awaits `pid`'s termination. Resolves immediately if the child already
    /// died and no one has collected its status yet; otherwise suspends
    /// until the SIGCHLD dispatcher observes it. Cannot fail — it either
    /// produces a status or stays suspended.
    pub async fn wait_for(&self, pid: ProcessIdentifier) -> TerminationStatus {
        let rx = {
            let mut waiters = self.inner.waiters.lock().unwrap();
            match waiters.remove(&pid) {
                Some(WaiterState::Ready(status)) => return status,
                Some(WaiterState::Waiting(_)) | Some(WaiterState::Detached) | None => {
                    let (tx, rx) = oneshot::channel();
                    waiters.insert(pid, WaiterState::Waiting(tx));
                    rx
                }
            }
        };
        rx.await
            .expect("reaper dropped a waiter without delivering a status")
    }

    /// Registers `pid` as one nobody will ever call [`Reaper::wait_for`] on.
    /// `drain` then discards its status instead of storing a `Ready` entry
    /// that would otherwise sit in the map forever — used by `run_detached`.
    /// If the child was already reaped before this call landed, the stray
    /// `Ready` entry is removed instead of left behind.
    pub(crate) fn forget(&self, pid: ProcessIdentifier) {
        let mut waiters = self.inner.waiters.lock().unwrap();
        match waiters.get(&pid) {
            Some(WaiterState::Ready(_)) => {
                waiters.remove(&pid);
            }
            _ => {
                waiters.insert(pid, WaiterState::Detached);
            }
        }
    }

    /// Returns the singleton handle if [`Reaper::install`] has already run,
    /// without installing it. Used to enforce `Settings::lazy_reaper_install
    /// == false`: spawning before an explicit `install` is a contract
    /// violation under that setting.
    pub(crate) fn get() -> Option<Reaper> {
        REAPER.get().cloned()
    }

    #[cfg(test)]
    pub(crate) fn outstanding_count(&self) -> usize {
        self.inner.waiters.lock().unwrap().len()
    }
}
