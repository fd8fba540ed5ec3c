// SPDX-License-Identifier: MIT

use std::thread::{self, JoinHandle};

use log::warn;

use super::{run_guarded, Execution, Outcome, Worker};
use crate::error::Result;
use crate::job::{display_id, JobHandle};

/// Runs each job on its own thread. Cheaper than forking, but a job shares
/// the address space of the boss.
pub type ThreadingEmployee = Worker<Threaded>;

#[derive(Debug)]
pub struct Threaded {
    handle: Option<JoinHandle<Outcome>>,
    job_id: String,
}

impl Threaded {
    fn join(&mut self) -> Outcome {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(Outcome::Failed),
            None => Outcome::Failed,
        }
    }
}

impl Execution for Threaded {
    const KIND: &'static str = "threading";

    fn start(job: &JobHandle) -> Result<Self> {
        let job_id = display_id(job);
        let job = job.clone();
        let handle = thread::Builder::new()
            .name(format!("employer-job-{job_id}"))
            .spawn(move || run_guarded(&job))?;
        Ok(Threaded {
            handle: Some(handle),
            job_id,
        })
    }

    fn poll(&mut self) -> Option<Outcome> {
        let running = self
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if running {
            None
        } else {
            Some(self.join())
        }
    }

    fn wait(&mut self) -> Outcome {
        self.join()
    }

    /// Threads cannot be killed from the outside; the thread is detached and
    /// whatever it still does is ignored.
    fn terminate(&mut self) {
        if self.handle.take().is_some() {
            warn!(
                "Abandoning worker thread of job {}; it keeps running detached",
                self.job_id
            );
        }
    }
}
