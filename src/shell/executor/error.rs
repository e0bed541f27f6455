use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Failures that can occur while realizing a command tree. Each is
/// converted to a numeric exit status at the node where it surfaces;
/// exec failures are not represented here because the failed child
/// reports those itself (127/126).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot fork: {0}")]
    Spawn(#[source] Errno),

    #[error("cannot create pipe: {0}")]
    Pipe(#[source] Errno),

    #[error("{path}: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot wait for process {pid}: {errno}")]
    Wait { pid: i32, errno: Errno },

    #[error("command contains an interior NUL byte")]
    BadArg(#[from] std::ffi::NulError),

    #[error("operator node cannot be spawned directly: {0}")]
    Tree(String),
}

impl EngineError {
    /// Exit status reported for a node that failed before, or outside
    /// of, any child process.
    pub fn status(&self) -> i32 {
        1
    }
}
