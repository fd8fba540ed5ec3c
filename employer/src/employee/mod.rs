// SPDX-License-Identifier: MIT

//! # Employees
//!
//! An employee works on at most one job at a time. The job runs on an
//! execution resource owned by the employee for the lifetime of that job: a
//! forked child process ([`ForkingEmployee`]) or a thread
//! ([`ThreadingEmployee`]). Both share the same state machine:
//!
//! ```text
//!            work()                 job ends
//!   Free ───────────────▶ Busy ───────────────▶ Complete | Failed
//!    ▲                                                   │
//!    └──────────────────────── free() ───────────────────┘
//! ```
//!
//! Status is polled, never pushed. A poll checks the execution resource
//! without waiting; [`Employee::wait_for_completion`] does the same check but
//! blocks. The first terminal state observed is cached, so a child process is
//! reaped exactly once and a thread joined exactly once.

use std::panic::{self, AssertUnwindSafe};

use log::{debug, error};

use crate::error::{Error, Result};
use crate::job::{display_id, JobHandle};

pub mod forking;
pub mod threading;

pub use forking::{ForkingEmployee, Forked};
pub use threading::{Threaded, ThreadingEmployee};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    Free,
    Busy,
    Complete,
    Failed,
}

impl WorkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkState::Complete | WorkState::Failed)
    }
}

/// How a job body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Completed => 0,
            Outcome::Failed => 1,
        }
    }

    fn work_state(self) -> WorkState {
        match self {
            Outcome::Completed => WorkState::Complete,
            Outcome::Failed => WorkState::Failed,
        }
    }
}

/// Runs the job body and turns every way out of it, panics included, into an
/// [`Outcome`].
pub fn run_guarded(job: &JobHandle) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(|| job.perform())) {
        Ok(Ok(())) => Outcome::Completed,
        Ok(Err(err)) => {
            error!("Job {} failed: {err:#}", display_id(job));
            Outcome::Failed
        }
        Err(_) => {
            error!("Job {} panicked", display_id(job));
            Outcome::Failed
        }
    }
}

/// Capabilities the boss relies on. Object-safe so that a roster can mix
/// process and thread workers.
pub trait Employee: Send {
    /// Short label for logs, e.g. `"forking"`.
    fn kind(&self) -> &'static str;

    /// The job being worked on, kept until the employee is freed.
    fn job(&self) -> Option<&JobHandle>;

    /// Starts `job`. Fails with [`Error::EmployeeBusy`] unless free.
    fn work(&mut self, job: JobHandle) -> Result<()>;

    /// Current state; `wait` blocks until the job has ended.
    fn work_state(&mut self, wait: bool) -> WorkState;

    /// Back to `Free`. Only has an effect in a terminal state.
    fn free(&mut self);

    /// Forcibly ends the running job; the state becomes `Failed`.
    /// No-op when free or already terminal.
    fn stop_working(&mut self);

    fn is_free(&self) -> bool {
        self.job().is_none()
    }

    fn work_in_progress(&mut self) -> bool {
        self.work_state(false) == WorkState::Busy
    }

    fn work_completed(&mut self) -> bool {
        self.work_state(false) == WorkState::Complete
    }

    fn work_failed(&mut self) -> bool {
        self.work_state(false) == WorkState::Failed
    }

    fn wait_for_completion(&mut self) -> WorkState {
        self.work_state(true)
    }
}

/// Execution substrate of a [`Worker`]: one instance per job.
pub trait Execution: Sized + Send {
    const KIND: &'static str;

    fn start(job: &JobHandle) -> Result<Self>;

    /// Non-blocking check; `None` while the job still runs.
    fn poll(&mut self) -> Option<Outcome>;

    /// Blocks until the job has ended.
    fn wait(&mut self) -> Outcome;

    /// Ends the job without its cooperation and releases the resource.
    fn terminate(&mut self);
}

/// The shared state machine, generic over the execution substrate.
pub struct Worker<X: Execution> {
    job: Option<JobHandle>,
    execution: Option<X>,
    state: WorkState,
}

impl<X: Execution> Worker<X> {
    pub fn new() -> Self {
        Self {
            job: None,
            execution: None,
            state: WorkState::Free,
        }
    }
}

impl<X: Execution> Default for Worker<X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: Execution> Employee for Worker<X> {
    fn kind(&self) -> &'static str {
        X::KIND
    }

    fn job(&self) -> Option<&JobHandle> {
        self.job.as_ref()
    }

    fn work(&mut self, job: JobHandle) -> Result<()> {
        if !self.is_free() {
            return Err(Error::EmployeeBusy);
        }
        let execution = X::start(&job)?;
        debug!(
            "{} employee started {} job {}",
            X::KIND,
            job.type_name(),
            display_id(&job)
        );
        self.execution = Some(execution);
        self.job = Some(job);
        self.state = WorkState::Busy;
        Ok(())
    }

    fn work_state(&mut self, wait: bool) -> WorkState {
        if self.state != WorkState::Busy {
            return self.state;
        }
        let outcome = match self.execution.as_mut() {
            Some(execution) if wait => Some(execution.wait()),
            Some(execution) => execution.poll(),
            None => Some(Outcome::Failed),
        };
        if let Some(outcome) = outcome {
            self.state = outcome.work_state();
        }
        self.state
    }

    fn free(&mut self) {
        if !self.work_state(false).is_terminal() {
            return;
        }
        self.execution = None;
        self.job = None;
        self.state = WorkState::Free;
    }

    fn stop_working(&mut self) {
        if self.work_state(false) != WorkState::Busy {
            return;
        }
        if let Some(execution) = self.execution.as_mut() {
            execution.terminate();
        }
        self.state = WorkState::Failed;
    }
}

impl<X: Execution> std::fmt::Debug for Worker<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("kind", &X::KIND)
            .field("job", &self.job)
            .field("state", &self.state)
            .finish()
    }
}
