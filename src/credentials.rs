//! Credentials block: everything applied in the child between fork and exec.
//! Immutable for the duration of a spawn; the parent never touches its own
//! credentials.

use std::os::unix::io::RawFd;

/// `createSession` and `processGroupID` are mutually exclusive: session
/// creation implicitly makes the child its own process-group leader, so
/// asking for both is a configuration error.
#[derive(Debug, Clone, Copy)]
pub enum ProcessGroup {
    /// `setsid()`: new session, new process group, controlling terminal detached.
    CreateSession,
    /// `setpgid(0, pgid)`: join (or create) the given process group.
    Join(i32),
}

/// A pre-exec hook callable in the post-fork/pre-exec window, after
/// credentials are applied and stdio is wired but before `execve`. Must be
/// async-signal-safe: no allocation, no locks, nothing that could be holding
/// a mutex another thread held at fork time.
pub type PreExecHook = Box<dyn Fn() -> std::io::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct Credentials {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub supplementary_gids: Option<Vec<u32>>,
    pub process_group: Option<ProcessGroup>,
    pub pre_exec: Option<PreExecHook>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .field("supplementary_gids", &self.supplementary_gids)
            .field("process_group", &self.process_group)
            .field("pre_exec", &self.pre_exec.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        // `pre_exec` is intentionally not preserved across a clone: it is a
        // one-shot closure bound to a single spawn request, and `Box<dyn Fn>`
        // isn't `Clone`. Callers who need it on a derived request must set it
        // again.
        Credentials {
            uid: self.uid,
            gid: self.gid,
            supplementary_gids: self.supplementary_gids.clone(),
            process_group: self.process_group,
            pre_exec: None,
        }
    }
}

/// Raw fd reference used by [`crate::stdio::Stdin::ReadFrom`] /
/// [`crate::stdio::Stdout::WriteTo`]; a thin alias so call sites read as the
/// spec's prose does.
pub type InheritedFd = RawFd;
