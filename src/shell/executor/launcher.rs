use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd};

use log::debug;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{dup2, execvp, fork, write as fd_write, ForkResult, Pid};

use super::error::EngineError;

/// Exit status a child reports when the requested program does not exist.
pub const STATUS_NOT_FOUND: i32 = 127;
/// Exit status a child reports when the program cannot be executed.
pub const STATUS_NOT_EXECUTABLE: i32 = 126;

/// Standard stream assignments for a child about to be launched. `None`
/// means the stream is inherited from the shell unchanged. Endpoints are
/// borrowed: the spawning frame keeps ownership and closes them once
/// every child holds its own duplicated copy.
#[derive(Clone, Copy, Default)]
pub struct StdioSpec<'fd> {
    pub stdin: Option<BorrowedFd<'fd>>,
    pub stdout: Option<BorrowedFd<'fd>>,
    pub stderr: Option<BorrowedFd<'fd>>,
}

impl<'fd> StdioSpec<'fd> {
    pub fn inherit() -> StdioSpec<'static> {
        StdioSpec {
            stdin: None,
            stdout: None,
            stderr: None,
        }
    }

    pub fn with_stdin(self, fd: BorrowedFd<'fd>) -> Self {
        Self {
            stdin: Some(fd),
            ..self
        }
    }

    pub fn with_stdout(self, fd: BorrowedFd<'fd>) -> Self {
        Self {
            stdout: Some(fd),
            ..self
        }
    }

    pub fn with_stderr(self, fd: BorrowedFd<'fd>) -> Self {
        Self {
            stderr: Some(fd),
            ..self
        }
    }
}

/// A spawned child that has not been awaited yet. Waiting consumes the
/// handle; a handle launched in background mode is moved into the job
/// registry and reaped there instead.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Pid,
}

impl ProcessHandle {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Block until the child terminates and return its exit status.
    /// Terminations by signal are reported as 128 plus the signal number.
    pub fn wait(self) -> Result<i32, EngineError> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
                Ok(_) => continue,
                Err(errno) => {
                    return Err(EngineError::Wait {
                        pid: self.pid.as_raw(),
                        errno,
                    })
                }
            }
        }
    }
}

/// Fork, substitute the requested standard streams in the child, and
/// replace the child's image with `program`. Returns to the caller
/// without waiting.
pub fn launch(
    program: &str,
    args: &[String],
    io: StdioSpec<'_>,
) -> Result<ProcessHandle, EngineError> {
    let prog = CString::new(program)?;
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(prog.clone());
    for arg in args {
        argv.push(CString::new(arg.as_str())?);
    }
    // Built before the fork: the child's error path must not allocate.
    let err_prefix = format!("msh: {}: ", program);

    // Anything still buffered would otherwise be duplicated into the
    // child and flushed twice.
    let _ = io::stdout().flush();

    match unsafe { fork() }.map_err(EngineError::Spawn)? {
        ForkResult::Parent { child } => {
            debug!("launched {} as pid {}", program, child);
            Ok(ProcessHandle { pid: child })
        }
        ForkResult::Child => {
            install_stdio(&io);
            let errno = match execvp(&prog, &argv) {
                Err(errno) => errno,
                Ok(infallible) => match infallible {},
            };
            // The image was not replaced. Report and die here; this copy
            // of the process must not run any further shell logic.
            let _ = fd_write(io::stderr(), err_prefix.as_bytes());
            let _ = fd_write(io::stderr(), errno.desc().as_bytes());
            let _ = fd_write(io::stderr(), b"\n");
            let code = if errno == Errno::ENOENT {
                STATUS_NOT_FOUND
            } else {
                STATUS_NOT_EXECUTABLE
            };
            unsafe { libc::_exit(code) }
        }
    }
}

/// Fork a child that evaluates `body` in the copied process and exits
/// with its returned status, never falling back into the caller's shell
/// logic. Used for subtrees whose wait is deferred as a whole: the
/// sequencing inside them happens in the child while the caller returns
/// at once with a handle.
pub fn fork_subshell<F>(body: F) -> Result<ProcessHandle, EngineError>
where
    F: FnOnce() -> i32,
{
    let _ = io::stdout().flush();

    match unsafe { fork() }.map_err(EngineError::Spawn)? {
        ForkResult::Parent { child } => {
            debug!("subshell forked as pid {}", child);
            Ok(ProcessHandle { pid: child })
        }
        ForkResult::Child => {
            let status = body();
            unsafe { libc::_exit(status) }
        }
    }
}

/// Child-side half of a launch: move each assigned stream onto its
/// standard descriptor. The source descriptors keep their close-on-exec
/// flag, so only the duplicated copies survive the exec.
fn install_stdio(io: &StdioSpec<'_>) {
    let assignments = [
        (io.stdin, libc::STDIN_FILENO),
        (io.stdout, libc::STDOUT_FILENO),
        (io.stderr, libc::STDERR_FILENO),
    ];
    for (source, target) in assignments {
        if let Some(fd) = source {
            if dup2(fd.as_raw_fd(), target).is_err() {
                unsafe { libc::_exit(STATUS_NOT_EXECUTABLE) }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::fd::{AsFd, OwnedFd};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_exit_status_propagates() {
        let handle = launch("true", &[], StdioSpec::inherit()).unwrap();
        assert_eq!(handle.wait().unwrap(), 0);

        let handle = launch("false", &[], StdioSpec::inherit()).unwrap();
        assert_ne!(handle.wait().unwrap(), 0);
    }

    #[test]
    fn test_missing_program_reports_127() {
        let dir = tempfile::tempdir().unwrap();
        let err_path = dir.path().join("stderr.txt");
        let err_file: OwnedFd = fs::File::create(&err_path).unwrap().into();

        let io = StdioSpec::inherit().with_stderr(err_file.as_fd());
        let handle = launch("definitely-not-a-real-program", &[], io).unwrap();
        drop(err_file);
        assert_eq!(handle.wait().unwrap(), STATUS_NOT_FOUND);

        let message = fs::read_to_string(&err_path).unwrap();
        assert!(message.starts_with("msh: definitely-not-a-real-program:"));
    }

    #[test]
    fn test_stdout_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.txt");
        let out_file: OwnedFd = fs::File::create(&out_path).unwrap().into();

        let io = StdioSpec::inherit().with_stdout(out_file.as_fd());
        let handle = launch("echo", &args(&["hello"]), io).unwrap();
        drop(out_file);
        assert_eq!(handle.wait().unwrap(), 0);

        assert_eq!(fs::read_to_string(&out_path).unwrap(), "hello\n");
    }

    #[test]
    fn test_stdin_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let in_path = dir.path().join("in.txt");
        let out_path = dir.path().join("out.txt");
        fs::write(&in_path, "some input\n").unwrap();
        let in_file: OwnedFd = fs::File::open(&in_path).unwrap().into();
        let out_file: OwnedFd = fs::File::create(&out_path).unwrap().into();

        let io = StdioSpec::inherit()
            .with_stdin(in_file.as_fd())
            .with_stdout(out_file.as_fd());
        let handle = launch("cat", &[], io).unwrap();
        drop(in_file);
        drop(out_file);
        assert_eq!(handle.wait().unwrap(), 0);

        assert_eq!(fs::read_to_string(&out_path).unwrap(), "some input\n");
    }
}
