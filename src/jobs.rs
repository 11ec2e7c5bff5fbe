use crate::command::ExitCode;
use crate::external::status_code;
use std::process::Child;
use tracing::{debug, warn};

/// Children started with a trailing `&` that have not been reaped yet.
///
/// There is no job control: the set only exists so finished children are
/// collected by their own handle instead of by a blind wait on any child.
/// Nothing here blocks, kills, or waits at shell exit.
#[derive(Debug, Default)]
pub struct BackgroundJobs {
    children: Vec<Child>,
}

impl BackgroundJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a spawned child.
    pub fn track(&mut self, child: Child) {
        debug!(pid = child.id(), "tracking background child");
        self.children.push(child);
    }

    /// Process ids of the children still being tracked.
    pub fn pids(&self) -> Vec<u32> {
        self.children.iter().map(Child::id).collect()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Collect every child that has already exited, without blocking.
    ///
    /// Returns the pid and exit status of each reaped child.
    pub fn reap(&mut self) -> Vec<(u32, ExitCode)> {
        let mut reaped = Vec::new();
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                let code = status_code(status);
                debug!(pid = child.id(), code, "background child exited");
                reaped.push((child.id(), code));
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid = child.id(), error = %e, "cannot poll background child");
                false
            }
        });
        reaped
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_reap_collects_finished_children_only() {
        let mut jobs = BackgroundJobs::new();
        let quick = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
        let slow = Command::new("sleep").arg("5").spawn().unwrap();
        let quick_pid = quick.id();
        let slow_pid = slow.id();
        jobs.track(quick);
        jobs.track(slow);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut reaped = Vec::new();
        while reaped.is_empty() && Instant::now() < deadline {
            reaped = jobs.reap();
            thread::sleep(Duration::from_millis(20));
        }

        assert_eq!(reaped, vec![(quick_pid, 3)]);
        assert_eq!(jobs.pids(), vec![slow_pid]);

        for child in &mut jobs.children {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    #[test]
    fn test_empty_set_reaps_nothing() {
        let mut jobs = BackgroundJobs::new();
        assert!(jobs.is_empty());
        assert!(jobs.reap().is_empty());
        assert_eq!(jobs.len(), 0);
    }
}
