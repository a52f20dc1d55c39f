//! Process primitives: spawning children with wired standard streams,
//! waiting on them, and reaping.
//!
//! All forking and exec'ing happens here. Pipe ends are owned descriptors
//! created close-on-exec, so a child's unused end disappears at exec (dup2
//! clears the flag on the duplicated descriptor) and the parent's ends close
//! when their owners drop. Redirect files are opened in the child, after the
//! fork, so a bad path kills only that child.

use std::ffi::{CString, NulError};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitStatus, wait, waitpid};
use nix::unistd::{ForkResult, Pid, dup2, execvp, fork, pipe2};
use tracing::{debug, trace};

/// Errors from the process layer, raised in the parent.
#[derive(Debug)]
pub enum ExecError {
    /// A syscall failed.
    Sys(Errno),
    /// An argv word or target path contains an interior NUL byte and cannot
    /// cross exec.
    Argv(NulError),
}

impl From<Errno> for ExecError {
    fn from(errno: Errno) -> Self {
        ExecError::Sys(errno)
    }
}

impl From<NulError> for ExecError {
    fn from(err: NulError) -> Self {
        ExecError::Argv(err)
    }
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Sys(errno) => write!(f, "{}", errno.desc()),
            ExecError::Argv(_) => write!(f, "argument contains an interior NUL byte"),
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecError::Sys(errno) => Some(errno),
            ExecError::Argv(err) => Some(err),
        }
    }
}

/// Where a spawned child's standard input comes from.
#[derive(Debug)]
pub enum Input<'a> {
    /// Inherit the parent's standard input.
    Inherit,
    /// Read from this pipe end.
    Pipe(BorrowedFd<'a>),
    /// Open this path read-only, in the child.
    File(&'a str),
}

/// Where a spawned child's standard output goes.
#[derive(Debug)]
pub enum Output<'a> {
    /// Inherit the parent's standard output.
    Inherit,
    /// Write into this pipe end.
    Pipe(BorrowedFd<'a>),
    /// Create or truncate this path, mode 0644, in the child.
    File(&'a str),
}

// Wiring plan for one standard stream, prepared before the fork so the child
// side only runs syscalls.
enum Wiring {
    Keep,
    Dup(RawFd),
    Open {
        path: CString,
        flags: OFlag,
        mode: Mode,
    },
}

impl Wiring {
    fn for_input(source: &Input<'_>) -> Result<Wiring, ExecError> {
        Ok(match source {
            Input::Inherit => Wiring::Keep,
            Input::Pipe(fd) => Wiring::Dup(fd.as_raw_fd()),
            Input::File(path) => Wiring::Open {
                path: CString::new(*path)?,
                flags: OFlag::O_RDONLY | OFlag::O_CLOEXEC,
                mode: Mode::empty(),
            },
        })
    }

    fn for_output(sink: &Output<'_>) -> Result<Wiring, ExecError> {
        Ok(match sink {
            Output::Inherit => Wiring::Keep,
            Output::Pipe(fd) => Wiring::Dup(fd.as_raw_fd()),
            Output::File(path) => Wiring::Open {
                path: CString::new(*path)?,
                flags: OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC | OFlag::O_CLOEXEC,
                mode: Mode::from_bits_truncate(0o644),
            },
        })
    }

    // Make this wiring the given standard stream. Opened descriptors are
    // close-on-exec; only the dup2'd copy survives into the new program.
    fn apply(&self, target: RawFd) -> Result<(), Errno> {
        match self {
            Wiring::Keep => Ok(()),
            Wiring::Dup(fd) => dup2(*fd, target).map(drop),
            Wiring::Open { path, flags, mode } => {
                let fd = open(path.as_c_str(), *flags, *mode)?;
                dup2(fd, target).map(drop)
            }
        }
    }
}

/// A handle to one spawned child process.
#[derive(Debug)]
pub struct Child {
    pid: Pid,
}

impl Child {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Blocks until exactly this child exits and returns its wait status.
    pub fn wait(self) -> Result<WaitStatus, ExecError> {
        loop {
            match waitpid(self.pid, None) {
                Ok(status) => {
                    trace!(pid = %self.pid, ?status, "child reaped");
                    return Ok(status);
                }
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(errno.into()),
            }
        }
    }
}

/// Creates a pipe. Both ends are close-on-exec; the parent must drop them
/// once every child that uses them has been spawned, or the reader never
/// sees EOF.
pub fn make_pipe() -> Result<(OwnedFd, OwnedFd), ExecError> {
    let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC)?;
    Ok((read_end, write_end))
}

/// Forks one child that execs `argv` with the requested stream wiring.
///
/// The program name is resolved through `PATH` and the environment is
/// inherited. Failures between fork and exec make the child report on
/// stderr and exit without returning: 1 when a stream cannot be wired, 127
/// for an empty argv or a program that cannot be found, 126 for any other
/// exec failure. Those are invisible to the parent here and surface only as
/// the child's wait status.
pub fn spawn(argv: &[String], stdin: Input<'_>, stdout: Output<'_>) -> Result<Child, ExecError> {
    let words = to_cstrings(argv)?;
    let stdin = Wiring::for_input(&stdin)?;
    let stdout = Wiring::for_output(&stdout)?;

    match unsafe { fork() }? {
        ForkResult::Parent { child } => {
            let program = argv.first().map(String::as_str).unwrap_or("");
            debug!(pid = %child, program, "spawned child");
            Ok(Child { pid: child })
        }
        ForkResult::Child => exec_child(&words, &stdin, &stdout),
    }
}

/// Waits for any child repeatedly, discarding statuses, until the kernel
/// reports no children remain.
pub fn reap_all() -> Result<(), ExecError> {
    loop {
        match wait() {
            Ok(status) => trace!(?status, "child reaped"),
            Err(Errno::ECHILD) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno.into()),
        }
    }
}

// Runs between fork and exec: syscalls and `_exit` only, except for the
// error reports just before exiting.
fn exec_child(words: &[CString], stdin: &Wiring, stdout: &Wiring) -> ! {
    // The Rust runtime ignores SIGPIPE and an ignored disposition survives
    // exec; restore the default so pipeline children die on EPIPE.
    unsafe {
        let _ = signal(Signal::SIGPIPE, SigHandler::SigDfl);
    }

    if let Err(errno) = stdin.apply(libc::STDIN_FILENO) {
        eprintln!("monosh: cannot wire standard input: {}", errno.desc());
        unsafe { libc::_exit(1) }
    }
    if let Err(errno) = stdout.apply(libc::STDOUT_FILENO) {
        eprintln!("monosh: cannot wire standard output: {}", errno.desc());
        unsafe { libc::_exit(1) }
    }

    let Some(program) = words.first() else {
        eprintln!("monosh: no command to execute");
        unsafe { libc::_exit(127) }
    };
    let errno = match execvp(program, words) {
        Ok(infallible) => match infallible {},
        Err(errno) => errno,
    };
    eprintln!("monosh: {}: {}", program.to_string_lossy(), errno.desc());
    unsafe { libc::_exit(if errno == Errno::ENOENT { 127 } else { 126 }) }
}

fn to_cstrings(argv: &[String]) -> Result<Vec<CString>, ExecError> {
    argv.iter()
        .map(|word| Ok(CString::new(word.as_str())?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::fd::AsFd;
    use std::path::PathBuf;

    // Tests here wait only on specific pids; wait-any would steal children
    // from other tests running in the same process.

    fn test_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("monosh_exec_{}_{}", std::process::id(), tag));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn spawn_and_wait_reports_the_exit_code() {
        let child = spawn(&argv(&["true"]), Input::Inherit, Output::Inherit).unwrap();
        assert!(matches!(child.wait().unwrap(), WaitStatus::Exited(_, 0)));

        let child = spawn(&argv(&["false"]), Input::Inherit, Output::Inherit).unwrap();
        assert!(matches!(child.wait().unwrap(), WaitStatus::Exited(_, 1)));
    }

    #[test]
    fn output_file_is_created_with_truncation() {
        let dir = test_dir("out");
        let path = dir.join("out.txt");
        fs::write(&path, "stale contents that must vanish").unwrap();

        let child = spawn(
            &argv(&["echo", "fresh"]),
            Input::Inherit,
            Output::File(path.to_str().unwrap()),
        )
        .unwrap();
        assert!(matches!(child.wait().unwrap(), WaitStatus::Exited(_, 0)));

        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn input_file_feeds_the_child() {
        let dir = test_dir("in");
        let src = dir.join("src.txt");
        let dst = dir.join("dst.txt");
        fs::write(&src, "line one\nline two\n").unwrap();

        let child = spawn(
            &argv(&["cat"]),
            Input::File(src.to_str().unwrap()),
            Output::File(dst.to_str().unwrap()),
        )
        .unwrap();
        assert!(matches!(child.wait().unwrap(), WaitStatus::Exited(_, 0)));

        assert_eq!(fs::read_to_string(&dst).unwrap(), "line one\nline two\n");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn pipe_connects_two_children() {
        let dir = test_dir("pipe");
        let out = dir.join("piped.txt");

        let (read_end, write_end) = make_pipe().unwrap();
        let left = spawn(
            &argv(&["echo", "through the pipe"]),
            Input::Inherit,
            Output::Pipe(write_end.as_fd()),
        )
        .unwrap();
        let right = spawn(
            &argv(&["cat"]),
            Input::Pipe(read_end.as_fd()),
            Output::File(out.to_str().unwrap()),
        )
        .unwrap();
        drop(write_end);
        drop(read_end);

        assert!(matches!(left.wait().unwrap(), WaitStatus::Exited(_, 0)));
        assert!(matches!(right.wait().unwrap(), WaitStatus::Exited(_, 0)));

        assert_eq!(fs::read_to_string(&out).unwrap(), "through the pipe\n");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn interior_nul_in_argv_is_rejected_in_the_parent() {
        let err = spawn(&argv(&["ec\0ho"]), Input::Inherit, Output::Inherit).unwrap_err();
        assert!(matches!(err, ExecError::Argv(_)));
    }
}
