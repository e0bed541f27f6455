use std::fs::{File, OpenOptions};
use std::os::fd::OwnedFd;

use crate::shell::parser::RedirectOp;

use super::error::EngineError;

/// Open a redirection target and hand back the descriptor that will be
/// moved onto a child's standard stream. Opening happens in the shell
/// process, before any fork, so a bad path fails the whole node without
/// creating a child. The descriptor is close-on-exec; the only copy that
/// reaches the program is the one `dup2` makes onto fd 0 or 1.
pub fn resolve(direction: RedirectOp, target: &str) -> Result<OwnedFd, EngineError> {
    let file = match direction {
        RedirectOp::Input => File::open(target),
        RedirectOp::Output => File::create(target),
        RedirectOp::Append => OpenOptions::new().create(true).append(true).open(target),
    };
    match file {
        Ok(file) => Ok(file.into()),
        Err(source) => Err(EngineError::File {
            path: target.to_string(),
            source,
        }),
    }
}
