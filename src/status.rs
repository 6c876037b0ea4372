//! Process identifiers and termination statuses: normal exit and signal
//! death are the only two terminal shapes; stopped/continued notifications
//! are not terminal and are dropped by the caller before a status ever
//! reaches this decoder.

use nix::sys::wait::WaitStatus;

pub type ProcessIdentifier = libc::pid_t;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationStatus {
    Exited(i32),
    Signaled(i32),
}

impl TerminationStatus {
    pub fn success(self) -> bool {
        matches!(self, TerminationStatus::Exited(0))
    }

    /// Decodes a reaped `WaitStatus` known to be terminal (`Exited` or
    /// `Signaled`). Returns `None` for stopped/continued/still-alive shapes,
    /// which are not terminal at this layer and should simply be skipped by
    /// the reap loop.
    pub(crate) fn from_wait_status(status: WaitStatus) -> Option<TerminationStatus> {
        match status {
            WaitStatus::Exited(_, code) => Some(TerminationStatus::Exited(code)),
            WaitStatus::Signaled(_, signal, _core_dumped) => {
                Some(TerminationStatus::Signaled(signal as i32))
            }
            _ => None,
        }
    }
}

/// Pid embedded in any `WaitStatus` shape, terminal or not. Needed by the
/// reap loop before it knows whether a status is terminal.
pub(crate) fn pid_of(status: &WaitStatus) -> Option<nix::unistd::Pid> {
    match *status {
        WaitStatus::Exited(pid, _) => Some(pid),
        WaitStatus::Signaled(pid, _, _) => Some(pid),
        WaitStatus::Stopped(pid, _) => Some(pid),
        WaitStatus::PtraceEvent(pid, _, _) => Some(pid),
        WaitStatus::PtraceSyscall(pid) => Some(pid),
        WaitStatus::Continued(pid) => Some(pid),
        WaitStatus::StillAlive => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use nix::unistd::Pid;

    #[test]
    fn exited_decodes() {
        let status = WaitStatus::Exited(Pid::from_raw(1), 7);
        assert_eq!(
            TerminationStatus::from_wait_status(status),
            Some(TerminationStatus::Exited(7))
        );
    }

    #[test]
    fn signaled_decodes() {
        let status = WaitStatus::Signaled(Pid::from_raw(1), Signal::SIGTERM, false);
        assert_eq!(
            TerminationStatus::from_wait_status(status),
            Some(TerminationStatus::Signaled(Signal::SIGTERM as i32))
        );
    }

    #[test]
    fn stopped_is_not_terminal() {
        let status = WaitStatus::Stopped(Pid::from_raw(1), Signal::SIGSTOP);
        assert_eq!(TerminationStatus::from_wait_status(status), None);
    }
}
