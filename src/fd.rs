//! A move-only owned file descriptor. Transferring it to the child is
//! modeled as [`OwnedFd::into_raw`] (release without close); every other
//! path to losing the value runs `Drop`, which closes exactly once.

use std::os::unix::io::{AsRawFd, RawFd};

pub struct OwnedFd(RawFd);

impl OwnedFd {
    pub fn new(raw: RawFd) -> Self {
        OwnedFd(raw)
    }

    pub fn as_raw(&self) -> RawFd {
        self.0
    }

    /// Releases ownership without closing. Used when the fd is about to be
    /// dup2'd into a child's stdio slot and closed afterwards by the normal
    /// fd-cleanup sweep, or handed to a caller who now owns it.
    pub fn into_raw(self) -> RawFd {
        let this = std::mem::ManuallyDrop::new(self);
        this.0
    }

    pub fn set_cloexec(&self, cloexec: bool) -> nix::Result<()> {
        use nix::fcntl::{fcntl, FcntlArg, FdFlag};
        let flags = if cloexec {
            FdFlag::FD_CLOEXEC
        } else {
            FdFlag::empty()
        };
        fcntl(self.0, FcntlArg::F_SETFD(flags)).map(drop)
    }

    pub fn duplicate(&self) -> nix::Result<Self> {
        Ok(OwnedFd::new(nix::unistd::dup(self.0)?))
    }
}

impl AsRawFd for OwnedFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl std::fmt::Debug for OwnedFd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OwnedFd").field(&self.0).finish()
    }
}

impl Drop for OwnedFd {
    fn drop(&mut self) {
        // Best-effort: EBADF here means something already closed this fd out
        // from under us, which is a bug elsewhere but not one we can recover
        // from in a destructor.
        let _ = nix::unistd::close(self.0);
    }
}
