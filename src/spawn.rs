//! The Spawner: turns a validated [`SpawnRequest`] into a running child.
//! Fork/exec is sequenced directly (no `std::process::Command`): everything
//! allocation-heavy (argv/envp `CString`s, pointer arrays, resolved paths)
//! is prepared in the parent before forking, so the child does as little as
//! possible — no allocation, no locks — between `fork` and `execve`.

use crate::{
    config::Settings,
    credentials::ProcessGroup,
    error::{Error, Result},
    fd::OwnedFd,
    pipe::make_pipe,
    reaper::Reaper,
    request::{Environment, SpawnRequest},
    stdio::{Stderr, Stdin, Stdout},
};
use nix::unistd::{ForkResult, Pid};
use std::{
    ffi::{CString, OsStr, OsString},
    os::unix::{ffi::OsStrExt, io::RawFd},
    path::{Path, PathBuf},
};

/// What the Spawner hands back to the Execution Controller.
pub(crate) struct SpawnOutcome {
    pub pid: Pid,
    pub stdin: Option<OwnedFd>,
    pub stdout: Option<OwnedFd>,
    pub stderr: Option<OwnedFd>,
}

/// Three child-side fd slots, resolved from the request's
/// [`crate::stdio::StdioSpecification`] before fork.
struct StdioPlan {
    stdin_child: OwnedFd,
    stdout_child: OwnedFd,
    stderr_child: OwnedFd,
    stdin_parent: Option<OwnedFd>,
    stdout_parent: Option<OwnedFd>,
    stderr_parent: Option<OwnedFd>,
    /// Caller-supplied fds that must be closed in the parent once the fork
    /// has happened and the child has its own copy via dup2.
    close_after_spawn: Vec<RawFd>,
}

fn open_null(write: bool) -> Result<OwnedFd> {
    let flags = if write {
        nix::fcntl::OFlag::O_WRONLY
    } else {
        nix::fcntl::OFlag::O_RDONLY
    };
    let fd = nix::fcntl::open("/dev/null", flags, nix::sys::stat::Mode::empty())?;
    Ok(OwnedFd::new(fd))
}

fn plan_stdin(spec: Stdin) -> Result<(OwnedFd, Option<OwnedFd>, Option<RawFd>)> {
    match spec {
        Stdin::Null => Ok((open_null(false)?, None, None)),
        Stdin::ReadFrom {
            fd,
            close_after_spawn,
        } => Ok((
            OwnedFd::new(nix::unistd::dup(fd)?),
            None,
            close_after_spawn.then_some(fd),
        )),
        Stdin::Piped => {
            let mut pipe = make_pipe()?;
            let child = pipe.read.take().expect("fresh pipe has both ends");
            let parent = pipe.write.take().expect("fresh pipe has both ends");
            Ok((child, Some(parent), None))
        }
    }
}

fn plan_stdout_or_stderr(spec: Stdout) -> Result<(OwnedFd, Option<OwnedFd>, Option<RawFd>)> {
    match spec {
        Stdout::Discarded => Ok((open_null(true)?, None, None)),
        Stdout::WriteTo {
            fd,
            close_after_spawn,
        } => Ok((
            OwnedFd::new(nix::unistd::dup(fd)?),
            None,
            close_after_spawn.then_some(fd),
        )),
        Stdout::Piped => {
            let mut pipe = make_pipe()?;
            let child = pipe.write.take().expect("fresh pipe has both ends");
            let parent = pipe.read.take().expect("fresh pipe has both ends");
            Ok((child, Some(parent), None))
        }
    }
}

fn plan_stdio(stdin: Stdin, stdout: Stdout, stderr: Stderr) -> Result<StdioPlan> {
    let (stdin_child, stdin_parent, stdin_close) = plan_stdin(stdin)?;
    let (stdout_child, stdout_parent, stdout_close) = plan_stdout_or_stderr(stdout)?;
    let (stderr_child, stderr_parent, stderr_close) = plan_stdout_or_stderr(stderr)?;
    Ok(StdioPlan {
        stdin_child,
        stdout_child,
        stderr_child,
        stdin_parent,
        stdout_parent,
        stderr_parent,
        close_after_spawn: [stdin_close, stdout_close, stderr_close]
            .into_iter()
            .flatten()
            .collect(),
    })
}

/// Resolves an executable path the way a shell's `execvp` would: a name
/// containing `/` is used verbatim (relative to the eventual cwd, never
/// PATH-searched); a bare name is searched across `PATH` in the parent,
/// before fork, so a missing executable is reported as
/// [`Error::ExecutableNotFound`] instead of surfacing as an opaque
/// post-fork `ENOENT`.
fn resolve_executable(path: &Path) -> Result<PathBuf> {
    if path.to_string_lossy().contains('/') {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::ExecutableNotFound {
            path: path.to_path_buf(),
        });
    }
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(path);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(Error::ExecutableNotFound {
        path: path.to_path_buf(),
    })
}

fn to_cstring(s: &OsStr) -> Result<CString> {
    CString::new(s.as_bytes()).map_err(|_| Error::InvalidConfiguration {
        reason: "argument or environment value contains an interior NUL byte".into(),
    })
}

/// Builds `KEY=VALUE` envp entries; last occurrence of a duplicate key wins.
fn materialize_environment(env: &Environment) -> Vec<OsString> {
    let pairs: Vec<(OsString, OsString)> = match env {
        Environment::Inherit => std::env::vars_os().collect(),
        Environment::Replace(pairs) => pairs.clone(),
    };
    let mut deduped: Vec<(OsString, OsString)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        if let Some(existing) = deduped.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            deduped.push((key, value));
        }
    }
    deduped
        .into_iter()
        .map(|(k, v)| {
            let mut entry = k;
            entry.push("=");
            entry.push(v);
            entry
        })
        .collect()
}

/// Everything the child needs to `execve`, pointer-stable and allocated
/// entirely in the parent. The raw pointer arrays borrow from `argv_c`/
/// `envp_c`, so this struct must outlive the fork.
struct ExecPlan {
    path: CString,
    argv_c: Vec<CString>,
    envp_c: Vec<CString>,
    argv_ptrs: Vec<*const libc::c_char>,
    envp_ptrs: Vec<*const libc::c_char>,
}

fn build_exec_plan(request: &SpawnRequest, resolved_path: &Path) -> Result<ExecPlan> {
    let path = to_cstring(resolved_path.as_os_str())?;

    let mut argv_c = Vec::with_capacity(request.arguments.len() + 1);
    argv_c.push(to_cstring(request.executable.as_os_str())?);
    for arg in &request.arguments {
        argv_c.push(to_cstring(arg)?);
    }

    let env_entries = materialize_environment(&request.environment);
    let mut envp_c = Vec::with_capacity(env_entries.len());
    for entry in &env_entries {
        envp_c.push(to_cstring(entry)?);
    }

    let argv_ptrs = argv_c
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect();
    let envp_ptrs = envp_c
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect();

    Ok(ExecPlan {
        path,
        argv_c,
        envp_c,
        argv_ptrs,
        envp_ptrs,
    })
}

/// Runs entirely between `fork` and `execve`. Never returns: either `execve`
/// replaces the image, or a failure is reported through `error_write` and the
/// child exits with [`CHILD_SETUP_FAILURE`].
///
/// # Safety
/// Only async-signal-safe operations may run here: no heap allocation, no
/// locks that another thread might have held at fork time. Every argument is
/// pre-resolved to a raw syscall-ready form in the parent.
const CHILD_SETUP_FAILURE: i32 = 127;

unsafe fn child_exec_or_die(
    plan: &ExecPlan,
    stdio: StdioPlan,
    working_directory: Option<&CString>,
    credentials_uid: Option<u32>,
    credentials_gid: Option<u32>,
    supplementary_gids: Option<&[u32]>,
    process_group: Option<ProcessGroup>,
    pre_exec: Option<&crate::credentials::PreExecHook>,
    error_write: RawFd,
) -> ! {
    macro_rules! bail {
        ($errno:expr) => {{
            let code: i32 = $errno;
            let bytes = code.to_ne_bytes();
            libc::write(error_write, bytes.as_ptr() as *const libc::c_void, bytes.len());
            libc::_exit(CHILD_SETUP_FAILURE);
        }};
    }

    if let Some(dir) = working_directory {
        if libc::chdir(dir.as_ptr()) != 0 {
            bail!(*libc::__errno_location());
        }
    }

    if let Some(gids) = supplementary_gids {
        if libc::setgroups(gids.len(), gids.as_ptr()) != 0 {
            bail!(*libc::__errno_location());
        }
    }
    // gid before uid: once uid is dropped we may lose permission to change gid.
    if let Some(gid) = credentials_gid {
        if libc::setresgid(gid, gid, gid) != 0 {
            bail!(*libc::__errno_location());
        }
    }
    if let Some(uid) = credentials_uid {
        if libc::setresuid(uid, uid, uid) != 0 {
            bail!(*libc::__errno_location());
        }
    }

    match process_group {
        Some(ProcessGroup::CreateSession) => {
            if libc::setsid() == -1 {
                bail!(*libc::__errno_location());
            }
        }
        Some(ProcessGroup::Join(pgid)) => {
            if libc::setpgid(0, pgid) != 0 {
                bail!(*libc::__errno_location());
            }
        }
        None => {}
    }

    if libc::dup2(stdio.stdin_child.as_raw(), 0) == -1 {
        bail!(*libc::__errno_location());
    }
    if libc::dup2(stdio.stdout_child.as_raw(), 1) == -1 {
        bail!(*libc::__errno_location());
    }
    if libc::dup2(stdio.stderr_child.as_raw(), 2) == -1 {
        bail!(*libc::__errno_location());
    }

    // Close every fd above 2, including the stdio-slot originals (already
    // duplicated into 0/1/2) and anything else this process happens to hold
    // open. No allocation: a bounded close() sweep, errors ignored.
    let max_fd = libc::sysconf(libc::_SC_OPEN_MAX).max(3) as RawFd;
    for fd in 3..max_fd {
        if fd == error_write {
            continue;
        }
        libc::close(fd);
    }

    if let Some(hook) = pre_exec {
        if let Err(err) = hook() {
            let code = err.raw_os_error().unwrap_or(-1);
            bail!(code);
        }
    }

    libc::execve(
        plan.path.as_ptr(),
        plan.argv_ptrs.as_ptr(),
        plan.envp_ptrs.as_ptr(),
    );
    bail!(*libc::__errno_location());
}

/// Converts a validated request into a running child. This is the only
/// function that actually forks.
///
/// # Panics
/// If `settings.lazy_reaper_install` is `false` and [`Reaper::install`] has
/// not already been called — that combination means the caller asked to own
/// reaper installation explicitly and then didn't, which is a programming
/// error rather than a recoverable one.
pub(crate) fn spawn(request: SpawnRequest, settings: &Settings) -> Result<SpawnOutcome> {
    request.validate()?;
    // A successful spawn implies the Reaper has been initialized before the
    // fork.
    if settings.lazy_reaper_install {
        Reaper::install();
    } else if Reaper::get().is_none() {
        panic!(
            "Settings::lazy_reaper_install is false but Reaper::install() was never called \
             before spawning"
        );
    }

    let resolved_path = resolve_executable(&request.executable)?;
    let exec_plan = build_exec_plan(&request, &resolved_path)?;

    let working_directory = match &request.working_directory {
        Some(dir) => {
            let current = std::env::current_dir().ok();
            if current.as_deref() == Some(dir.as_path()) {
                None
            } else {
                Some(to_cstring(dir.as_os_str())?)
            }
        }
        None => None,
    };

    let uid = request.credentials.uid;
    let gid = request.credentials.gid;
    let supplementary_gids = request.credentials.supplementary_gids.clone();
    let process_group = request.credentials.process_group;

    let mut stdio = plan_stdio(
        request.stdio.stdin.clone(),
        request.stdio.stdout.clone(),
        request.stdio.stderr.clone(),
    )?;

    let mut error_pipe = make_pipe()?;
    let error_write = error_pipe
        .write
        .take()
        .expect("fresh pipe has both ends")
        .into_raw();

    // SAFETY: fork + exec orchestration is inherently unsafe; the only code
    // that runs in the child between fork and execve is `child_exec_or_die`,
    // which is documented and written to be async-signal-safe.
    let fork_result = unsafe { nix::unistd::fork()? };

    match fork_result {
        ForkResult::Child => {
            let error_read = error_pipe.read.take();
            drop(error_read);
            unsafe {
                child_exec_or_die(
                    &exec_plan,
                    stdio,
                    working_directory.as_ref(),
                    uid,
                    gid,
                    supplementary_gids.as_deref(),
                    process_group,
                    request.credentials.pre_exec.as_ref(),
                    error_write,
                );
            }
        }
        ForkResult::Parent { child } => {
            // Close our copies of the child-destined error-pipe write end
            // and the stdio child ends immediately; they belong to the
            // child now.
            let _ = OwnedFd::new(error_write);
            drop(stdio.stdin_child);
            drop(stdio.stdout_child);
            drop(stdio.stderr_child);
            for fd in &stdio.close_after_spawn {
                let _ = nix::unistd::close(*fd);
            }

            let error_read = error_pipe.read.take().expect("fresh pipe has both ends");
            let mut buf = [0u8; 4];
            let outcome = match read_full_or_eof(&error_read, &mut buf) {
                Ok(true) => {
                    let os_error = i32::from_ne_bytes(buf);
                    Err(Error::SpawnFailed { os_error })
                }
                Ok(false) => Ok(()),
                Err(err) => Err(err),
            };
            drop(error_read);

            if let Err(err) = outcome {
                // Reap transparently: the child exited (possibly via the
                // sentinel setup-failure code) and must not become a zombie.
                let reaper = Reaper::install();
                tokio::spawn({
                    let reaper = reaper.clone();
                    async move {
                        reaper.wait_for(child.as_raw()).await;
                    }
                });
                stdio.stdin_parent.take();
                stdio.stdout_parent.take();
                stdio.stderr_parent.take();
                return Err(err);
            }

            tracing::debug!(pid = child.as_raw(), "spawned child");
            Ok(SpawnOutcome {
                pid: child,
                stdin: stdio.stdin_parent.take(),
                stdout: stdio.stdout_parent.take(),
                stderr: stdio.stderr_parent.take(),
            })
        }
    }
}

/// Reads until `buf` is full or EOF. Returns `Ok(true)` if `buf` was filled
/// (the child reported an error), `Ok(false)` on immediate EOF (the child
/// execve'd successfully, closing the pipe on exec), or an error.
fn read_full_or_eof(fd: &OwnedFd, buf: &mut [u8; 4]) -> Result<bool> {
    let mut read_total = 0;
    loop {
        match nix::unistd::read(fd.as_raw(), &mut buf[read_total..]) {
            Ok(0) => return Ok(read_total != 0 && read_total == buf.len()),
            Ok(n) => {
                read_total += n;
                if read_total == buf.len() {
                    return Ok(true);
                }
            }
            Err(nix::Error::EINTR) => continue,
            Err(err) => return Err(err.into()),
        }
    }
}
