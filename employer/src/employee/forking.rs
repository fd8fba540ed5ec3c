// SPDX-License-Identifier: MIT

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use super::{run_guarded, Execution, Outcome, Worker};
use crate::error::Result;
use crate::job::JobHandle;

/// Runs each job in a forked child process.
///
/// A crashing or memory-corrupting job only takes its own process down.
///
/// The child is a copy of the calling thread alone. Locks held by other
/// threads at fork time stay locked in the child, including the stderr and
/// logger locks: a child that logs (as [`run_guarded`] does when a job fails)
/// can deadlock if another thread was writing a log line when the boss forked.
/// Fork from a process whose other threads do not log, or do not mix forking
/// employees with threading ones or with a boss running off the main thread.
pub type ForkingEmployee = Worker<Forked>;

/// A forked child running one job. The child always exits through
/// [`run_guarded`], so its exit status is 0 on success and 1 otherwise.
#[derive(Debug)]
pub struct Forked {
    pid: Pid,
}

impl Forked {
    pub fn pid(&self) -> Pid {
        self.pid
    }
}

fn outcome_of(status: WaitStatus) -> Option<Outcome> {
    match status {
        WaitStatus::Exited(_, 0) => Some(Outcome::Completed),
        WaitStatus::Exited(_, _) | WaitStatus::Signaled(..) => Some(Outcome::Failed),
        _ => None,
    }
}

impl Execution for Forked {
    const KIND: &'static str = "forking";

    fn start(job: &JobHandle) -> Result<Self> {
        // the child only has the calling thread; locks other threads held stay held
        match unsafe { fork()? } {
            ForkResult::Parent { child } => Ok(Forked { pid: child }),
            ForkResult::Child => {
                // a graceful stop from the terminal must not interrupt the job
                let _ = unsafe { signal::signal(Signal::SIGINT, SigHandler::SigIgn) };
                let outcome = run_guarded(job);
                // skip atexit handlers and buffered output inherited from the parent
                unsafe { libc::_exit(outcome.exit_code()) }
            }
        }
    }

    fn poll(&mut self) -> Option<Outcome> {
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => outcome_of(status),
            Err(Errno::EINTR) => None,
            Err(err) => {
                warn!("Could not reap worker process {}: {err}", self.pid);
                Some(Outcome::Failed)
            }
        }
    }

    fn wait(&mut self) -> Outcome {
        loop {
            match waitpid(self.pid, None) {
                Ok(status) => {
                    if let Some(outcome) = outcome_of(status) {
                        return outcome;
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(err) => {
                    warn!("Could not reap worker process {}: {err}", self.pid);
                    return Outcome::Failed;
                }
            }
        }
    }

    fn terminate(&mut self) {
        warn!("Killing worker process {}", self.pid);
        if let Err(err) = signal::kill(self.pid, Signal::SIGKILL) {
            debug!("Worker process {} was already gone: {err}", self.pid);
        }
        let _ = self.wait();
    }
}
