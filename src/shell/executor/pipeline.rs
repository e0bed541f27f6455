use std::os::fd::AsFd;

use log::debug;
use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use crate::shell::parser::ast::Node;

use super::error::EngineError;
use super::executor::Executor;
use super::launcher::{ProcessHandle, StdioSpec};

/// Wire `left`'s standard output to `right`'s standard input through a
/// fresh pipe and spawn both sides without waiting for either. Both
/// endpoints are created close-on-exec, so no child can carry a stray
/// write end past its exec and starve the reader of end-of-stream; the
/// shell's own endpoints are dropped here the moment the side that
/// needed them has been spawned.
///
/// Compound sides recurse through further `spawn` calls, so `a | b | c`
/// builds its topology with one pipe per operator node. The returned
/// handles are ordered left to right; the last one is the designated
/// status carrier.
pub fn connect(
    executor: &mut Executor,
    left: &Node,
    right: &Node,
    io: StdioSpec<'_>,
) -> Result<Vec<ProcessHandle>, EngineError> {
    let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).map_err(EngineError::Pipe)?;
    debug!(
        "pipe allocated: read {:?}, write {:?}",
        read_end, write_end
    );

    let handles = executor.spawn(left, io.with_stdout(write_end.as_fd()))?;
    drop(write_end);

    let right_result = executor.spawn(right, io.with_stdin(read_end.as_fd()));
    drop(read_end);

    match right_result {
        Ok(right_handles) => {
            let mut handles = handles;
            handles.extend(right_handles);
            Ok(handles)
        }
        Err(err) => {
            // The left side is already running; reap it so the failed
            // node leaves no zombies behind.
            for handle in handles {
                let _ = handle.wait();
            }
            Err(err)
        }
    }
}
