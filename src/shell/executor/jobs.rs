use std::fmt;

use log::{debug, warn};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use super::launcher::ProcessHandle;

/// A background topology whose termination has not been fully observed
/// yet. A pipeline contributes several member processes but stays one
/// job; the job finishes once every member is gone, and its status is
/// the designated (rightmost) member's.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    /// Designated member, the rightmost process of the topology.
    pub pid: Pid,
    pub command: String,
    pending: Vec<Pid>,
    status: Option<i32>,
}

impl Job {
    /// Poll every still-running member once with WNOHANG, recording the
    /// designated member's status when it turns up.
    fn poll(&mut self) {
        let designated = self.pid;
        let mut observed = None;
        self.pending.retain(|&pid| {
            let status = match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => return true,
                Ok(WaitStatus::Exited(_, code)) => code,
                Ok(WaitStatus::Signaled(_, signal, _)) => 128 + signal as i32,
                Ok(_) => return true,
                Err(errno) => {
                    warn!("job member pid {} lost: {}", pid, errno);
                    return false;
                }
            };
            if pid == designated {
                observed = Some(status);
            }
            false
        });
        if observed.is_some() {
            self.status = observed;
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.id, self.pid, self.command)
    }
}

/// Owns the handles of children launched in background mode until they
/// are reaped, so finished jobs never linger as zombies.
pub struct JobRegistry {
    jobs: Vec<Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    fn find_available_id(&self) -> usize {
        let mut id = 1;
        while self.jobs.iter().any(|job| job.id == id) {
            id += 1;
        }
        id
    }

    /// Take ownership of one topology's handles, deferred as a single
    /// job. Returns the job id under which its termination will later
    /// be reported.
    pub fn register(&mut self, handles: Vec<ProcessHandle>, command: String) -> usize {
        let id = self.find_available_id();
        let pending: Vec<Pid> = handles.iter().map(ProcessHandle::pid).collect();
        let pid = pending.last().copied().unwrap_or(Pid::from_raw(0));
        debug!(
            "job [{}] registered: pid {} ({} member(s), {})",
            id,
            pid,
            pending.len(),
            command
        );
        self.jobs.push(Job {
            id,
            pid,
            command,
            pending,
            status: None,
        });
        id
    }

    /// Poll every registered job once, removing and reporting those
    /// whose members have all terminated. Running jobs are left
    /// untouched; this never blocks.
    pub fn reap_completed(&mut self) -> Vec<(usize, i32)> {
        let mut finished = Vec::new();
        self.jobs.retain_mut(|job| {
            job.poll();
            if job.pending.is_empty() {
                let status = job.status.unwrap_or(0);
                debug!("job [{}] finished with status {}", job.id, status);
                finished.push((job.id, status));
                false
            } else {
                true
            }
        });
        finished
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shell::executor::launcher::{launch, StdioSpec};
    use std::thread;
    use std::time::{Duration, Instant};

    fn reap_until_done(registry: &mut JobRegistry) -> Vec<(usize, i32)> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let finished = registry.reap_completed();
            if !finished.is_empty() {
                return finished;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("job never terminated");
    }

    #[test]
    fn test_register_and_reap() {
        let mut registry = JobRegistry::new();
        let handle = launch("true", &[], StdioSpec::inherit()).unwrap();
        let id = registry.register(vec![handle], "true".to_string());
        assert_eq!(id, 1);
        assert_eq!(registry.jobs().len(), 1);

        assert_eq!(reap_until_done(&mut registry), vec![(1, 0)]);
        assert!(registry.jobs().is_empty());
    }

    #[test]
    fn test_reap_reports_exit_status() {
        let mut registry = JobRegistry::new();
        let args = vec!["-c".to_string(), "exit 3".to_string()];
        let handle = launch("sh", &args, StdioSpec::inherit()).unwrap();
        let id = registry.register(vec![handle], "sh -c 'exit 3'".to_string());

        assert_eq!(reap_until_done(&mut registry), vec![(id, 3)]);
    }

    #[test]
    fn test_reap_does_not_block_on_running_job() {
        let mut registry = JobRegistry::new();
        let args = vec!["2".to_string()];
        let handle = launch("sleep", &args, StdioSpec::inherit()).unwrap();
        registry.register(vec![handle], "sleep 2".to_string());

        let started = Instant::now();
        assert!(registry.reap_completed().is_empty());
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(registry.jobs().len(), 1);

        // clean up so the test process leaves no zombie behind
        reap_until_done(&mut registry);
    }

    #[test]
    fn test_multi_member_topology_is_one_job() {
        let mut registry = JobRegistry::new();
        let left = launch("sh", &["-c".to_string(), "exit 7".to_string()], StdioSpec::inherit())
            .unwrap();
        let right = launch("sh", &["-c".to_string(), "exit 5".to_string()], StdioSpec::inherit())
            .unwrap();
        let id = registry.register(vec![left, right], "left | right".to_string());
        assert_eq!(registry.jobs().len(), 1);

        // the job reports once, with the rightmost member's status
        assert_eq!(reap_until_done(&mut registry), vec![(id, 5)]);
        assert!(registry.jobs().is_empty());
    }

    #[test]
    fn test_job_outlives_fast_member() {
        let mut registry = JobRegistry::new();
        let fast = launch("true", &[], StdioSpec::inherit()).unwrap();
        let slow = launch("sleep", &["1".to_string()], StdioSpec::inherit()).unwrap();
        registry.register(vec![fast, slow], "true | sleep 1".to_string());

        // the fast member finishing does not finish the job
        thread::sleep(Duration::from_millis(100));
        assert!(registry.reap_completed().is_empty());
        assert_eq!(registry.jobs().len(), 1);

        assert_eq!(reap_until_done(&mut registry), vec![(1, 0)]);
    }

    #[test]
    fn test_smallest_free_id_is_reused() {
        let mut registry = JobRegistry::new();
        let first = launch("true", &[], StdioSpec::inherit()).unwrap();
        let second = launch("sleep", &["2".to_string()], StdioSpec::inherit()).unwrap();
        assert_eq!(registry.register(vec![first], "true".to_string()), 1);
        assert_eq!(registry.register(vec![second], "sleep 2".to_string()), 2);

        // job 1 finishes quickly and frees its id while job 2 runs
        let finished = reap_until_done(&mut registry);
        assert_eq!(finished, vec![(1, 0)]);

        let third = launch("true", &[], StdioSpec::inherit()).unwrap();
        assert_eq!(registry.register(vec![third], "true".to_string()), 1);

        while !registry.jobs().is_empty() {
            reap_until_done(&mut registry);
        }
    }
}
