use std::os::fd::AsFd;

use log::{debug, error, warn};

use crate::shell::parser::ast::Node;
use crate::shell::parser::RedirectOp;

use super::error::EngineError;
use super::jobs::JobRegistry;
use super::launcher::{self, ProcessHandle, StdioSpec};
use super::{pipeline, redirect};

/// Recursive evaluator over the command tree. Each operator node decides
/// the process topology below it and reports the exit status of the last
/// synchronously awaited child.
pub struct Executor {
    jobs: JobRegistry,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            jobs: JobRegistry::new(),
        }
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Run one top-level tree to completion and return its exit status.
    pub fn execute(&mut self, tree: &Node) -> i32 {
        self.eval(tree, true)
    }

    /// Collect the statuses of background jobs that have terminated
    /// since the last call. Never blocks.
    pub fn reap_jobs(&mut self) -> Vec<(usize, i32)> {
        self.jobs.reap_completed()
    }

    fn eval(&mut self, node: &Node, wait: bool) -> i32 {
        match node {
            Node::Simple { .. } | Node::Redirect { .. } | Node::Pipe { .. } => {
                self.eval_spawnable(node, wait)
            }
            Node::Sequence { left, right } => {
                let status = self.eval(left, true);
                debug!("sequence: left finished with status {}", status);
                self.eval(right, wait)
            }
            Node::And { left, right } => {
                let status = self.eval(left, true);
                if status == 0 {
                    self.eval(right, wait)
                } else {
                    status
                }
            }
            Node::Or { left, right } => {
                let status = self.eval(left, true);
                if status != 0 {
                    self.eval(right, wait)
                } else {
                    status
                }
            }
            Node::Background { child } => {
                // The fork happens now; only the wait is deferred, into
                // the job registry.
                self.eval_background(child);
                0
            }
        }
    }

    /// Leaf and pipeline nodes: spawn the subtree's process topology,
    /// then either await it or hand it to the job registry as one job.
    /// Spawn-layer errors become a numeric status right here.
    fn eval_spawnable(&mut self, node: &Node, wait: bool) -> i32 {
        match self.spawn(node, StdioSpec::inherit()) {
            Ok(handles) if wait => self.wait_handles(handles),
            Ok(handles) => {
                self.jobs.register(handles, node.to_string());
                0
            }
            Err(err) => {
                error!("{}: {}", node, err);
                eprintln!("msh: {}", err);
                err.status()
            }
        }
    }

    /// Detach a subtree. Spawnable nodes go straight to the registry;
    /// a compound subtree gets one intermediate child that runs its
    /// sequencing internally, so the caller never blocks on a left
    /// operand the way a synchronous descent would.
    fn eval_background(&mut self, child: &Node) {
        match child {
            Node::Simple { .. } | Node::Redirect { .. } | Node::Pipe { .. } => {
                let _ = self.eval(child, false);
            }
            compound => match launcher::fork_subshell(|| self.eval(compound, true)) {
                Ok(handle) => {
                    self.jobs.register(vec![handle], compound.to_string());
                }
                Err(err) => {
                    error!("{}: {}", compound, err);
                    eprintln!("msh: {}", err);
                }
            },
        }
    }

    /// Spawn every process a subtree needs, without waiting for any of
    /// them. Handles come back ordered left to right; the last one is
    /// the designated status carrier.
    pub(super) fn spawn(
        &mut self,
        node: &Node,
        io: StdioSpec<'_>,
    ) -> Result<Vec<ProcessHandle>, EngineError> {
        match node {
            Node::Simple { program, args } => Ok(vec![launcher::launch(program, args, io)?]),
            Node::Redirect {
                child,
                direction,
                target,
            } => {
                let file = redirect::resolve(*direction, target)?;
                let io = match direction {
                    RedirectOp::Input => io.with_stdin(file.as_fd()),
                    RedirectOp::Output | RedirectOp::Append => io.with_stdout(file.as_fd()),
                };
                let handles = self.spawn(child, io)?;
                // `file` closes on return, once every child holds its
                // duplicated copy.
                Ok(handles)
            }
            Node::Pipe { left, right } => pipeline::connect(self, left, right, io),
            // The parser keeps sequencing operators above pipes and
            // redirections; this arm guards that invariant.
            Node::Sequence { .. }
            | Node::And { .. }
            | Node::Or { .. }
            | Node::Background { .. } => Err(EngineError::Tree(node.to_string())),
        }
    }

    /// Await a spawned topology: the designated (rightmost) child first
    /// for the status, then the remaining members so nothing is left as
    /// a zombie. Waiting on the designated child before the others means
    /// we never block on a writer whose output the reader stopped
    /// consuming.
    fn wait_handles(&mut self, mut handles: Vec<ProcessHandle>) -> i32 {
        let Some(last) = handles.pop() else {
            return 0;
        };
        let status = match last.wait() {
            Ok(status) => status,
            Err(err) => {
                error!("{}", err);
                err.status()
            }
        };
        for handle in handles {
            if let Err(err) = handle.wait() {
                warn!("failed to reap pipeline member: {}", err);
            }
        }
        status
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}
