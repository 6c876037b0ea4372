//! Turns an owned pipe fd into a readiness-driven `AsyncRead`/`AsyncWrite`,
//! the same shape `tokio::net::TcpStream` and friends use internally for a
//! raw fd: register with the reactor via `AsyncFd`, loop on readiness,
//! `read`/`write` the raw fd directly, yield back on `EWOULDBLOCK`.

use crate::fd::OwnedFd;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

fn set_nonblocking(raw: RawFd) -> io::Result<()> {
    let current = fcntl(raw, FcntlArg::F_GETFL).map_err(io::Error::from)?;
    let mut flags = OFlag::from_bits_truncate(current);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(raw, FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;
    Ok(())
}

/// A pipe end wrapped for async use. One direction only — a pipe fd is
/// never both read from and written to by this crate, so there is no
/// combined read+write type.
pub struct PipeStream(AsyncFd<OwnedFd>);

impl PipeStream {
    pub(crate) fn new(fd: OwnedFd) -> io::Result<Self> {
        set_nonblocking(fd.as_raw_fd())?;
        Ok(PipeStream(AsyncFd::new(fd)?))
    }
}

impl AsyncRead for PipeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            let mut guard = ready!(this.0.poll_read_ready(cx))?;
            let result = guard.try_io(|inner| {
                let raw = inner.get_ref().as_raw_fd();
                let unfilled = buf.initialize_unfilled();
                let n = unsafe {
                    libc::read(
                        raw,
                        unfilled.as_mut_ptr() as *mut libc::c_void,
                        unfilled.len(),
                    )
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            });
            match result {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for PipeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            let mut guard = ready!(this.0.poll_write_ready(cx))?;
            let result = guard.try_io(|inner| {
                let raw = inner.get_ref().as_raw_fd();
                let n = unsafe {
                    libc::write(raw, data.as_ptr() as *const libc::c_void, data.len())
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            });
            match result {
                Ok(Ok(n)) => return Poll::Ready(Ok(n)),
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
