// SPDX-License-Identifier: MIT

//! # Boss
//!
//! The scheduler. A single-threaded loop that pulls jobs from the pipeline,
//! hands them to free employees and harvests finished ones:
//!
//! ```text
//!   ┌────────────── manage() ──────────────┐
//!   │                                      │
//!   │  delegate_work ──▶ progress_update ──┤ while keep_going
//!   │                                      │
//!   └──────────────────────────────────────┘
//!                    │ stop requested
//!                    ▼
//!      wait_on_employees   (graceful)
//!      stop_employees      (forced)
//! ```
//!
//! The boss only ever blocks in its sleeper: before each dequeue attempt, and
//! between harvest rounds while no employee is free or while draining. A
//! failing job never surfaces as an error here; it is reset or failed in the
//! pipeline according to [`JobHandle::try_again`]. Errors returned by the boss
//! are configuration problems or backend errors, and [`Boss::manage`] drains
//! its employees before returning one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::employee::{Employee, WorkState};
use crate::error::{Error, Result};
use crate::job::{display_id, JobHandle};
use crate::pipeline::{Backend, Pipeline};

pub mod backoff;

pub use backoff::Backoff;


/// Pause between harvest rounds while every employee is busy.
pub const IDLE_PAUSE: Duration = Duration::from_millis(10);

/// Cloneable stop switch for a running [`Boss::manage`]. Only touches atomics,
/// so it may be used from a signal handler or another thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    keep_going: Arc<AtomicBool>,
    forced: Arc<AtomicBool>,
}

impl StopHandle {
    fn new() -> Self {
        Self {
            keep_going: Arc::new(AtomicBool::new(true)),
            forced: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop taking new jobs; in-flight jobs are waited on.
    pub fn stop_managing(&self) {
        self.keep_going.store(false, Ordering::SeqCst);
    }

    /// Stop taking new jobs and kill the in-flight ones.
    pub fn stop_now(&self) {
        self.forced.store(true, Ordering::SeqCst);
        self.keep_going.store(false, Ordering::SeqCst);
    }

    pub fn keep_going(&self) -> bool {
        self.keep_going.load(Ordering::SeqCst)
    }

    pub fn is_forced(&self) -> bool {
        self.forced.load(Ordering::SeqCst)
    }
}

pub struct Boss {
    pipeline: Arc<Pipeline>,
    employees: Vec<Box<dyn Employee>>,
    stop: StopHandle,
    backoff: Backoff,
    sleeper: Box<dyn FnMut(Duration) + Send>,
}

impl Boss {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            employees: Vec::new(),
            stop: StopHandle::new(),
            backoff: Backoff::default(),
            sleeper: Box::new(thread::sleep),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces `thread::sleep` for the backoff delay.
    pub fn with_sleeper(mut self, sleeper: impl FnMut(Duration) + Send + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn set_pipeline_backend(&self, backend: Box<dyn Backend>) -> Result<()> {
        self.pipeline.set_backend(backend)
    }

    pub fn allocate_employee(&mut self, employee: Box<dyn Employee>) {
        self.employees.push(employee);
    }

    pub fn employees(&self) -> &[Box<dyn Employee>] {
        &self.employees
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn keep_going(&self) -> bool {
        self.stop.keep_going()
    }

    pub fn stop_managing(&self) {
        self.stop.stop_managing();
    }

    /// Runs until stopped or until scheduling fails, then drains the
    /// employees. The first error is returned after the drain.
    pub fn manage(&mut self) -> Result<()> {
        info!("Managing {} employees", self.employees.len());
        let managed = self.keep_managing();
        if let Err(err) = &managed {
            error!("Stopped managing after an error: {err}");
        }

        let drained = if self.stop.is_forced() {
            self.stop_employees()
        } else {
            self.wait_on_employees()
        };
        info!("Stopped managing");
        managed.and(drained)
    }

    fn keep_managing(&mut self) -> Result<()> {
        while self.stop.keep_going() {
            self.delegate_work()?;
            self.progress_update()?;
            if self.free_employee().is_none() {
                (self.sleeper)(IDLE_PAUSE);
            }
        }
        Ok(())
    }

    /// Hands out jobs while an employee is free and the pipeline has work.
    pub fn delegate_work(&mut self) -> Result<()> {
        while self.free_employee().is_some() {
            let Some(job) = self.get_work()? else {
                break;
            };
            self.delegate_job(job)?;
        }
        Ok(())
    }

    /// One dequeue attempt, preceded by the current backoff delay.
    pub fn get_work(&mut self) -> Result<Option<JobHandle>> {
        (self.sleeper)(self.backoff.current());
        let job = self.pipeline.dequeue()?;
        if job.is_some() {
            self.backoff.hit();
        } else {
            self.backoff.miss();
        }
        Ok(job)
    }

    /// Gives `job` to the first free employee.
    pub fn delegate_job(&mut self, job: JobHandle) -> Result<()> {
        let index = self.free_employee().ok_or(Error::NoEmployeeFree)?;
        let employee = &mut self.employees[index];
        debug!(
            "Delegating {} job {} to {} employee #{}",
            job.type_name(),
            display_id(&job),
            employee.kind(),
            index
        );

        if let Err(err) = employee.work(job.clone()) {
            error!("Could not start job {}: {err}", display_id(&job));
            if job.pipeline().is_some() {
                if let Err(reset_err) = self.pipeline.reset(&job) {
                    warn!(
                        "Could not return job {} to the queue: {reset_err}",
                        display_id(&job)
                    );
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// Harvests every busy employee without blocking.
    pub fn progress_update(&mut self) -> Result<()> {
        for employee in self.employees.iter_mut().filter(|e| !e.is_free()) {
            update_job_status(&self.pipeline, employee.as_mut(), false)?;
        }
        Ok(())
    }

    /// Returns once every busy employee has finished and been harvested.
    /// Polls rather than waits, so that a forced stop requested meanwhile
    /// switches over to [`Boss::stop_employees`] within one [`IDLE_PAUSE`].
    ///
    /// A report the pipeline rejects does not stop the drain; the first such
    /// error is returned at the end.
    pub fn wait_on_employees(&mut self) -> Result<()> {
        info!("Waiting on {} busy employees", self.busy_count());
        let mut result = Ok(());
        while self.busy_count() > 0 {
            if self.stop.is_forced() {
                return result.and(self.stop_employees());
            }
            result = result.and(self.harvest_all(false));
            if self.busy_count() > 0 {
                (self.sleeper)(IDLE_PAUSE);
            }
        }
        result
    }

    /// Kills every in-flight job. Killed jobs are failed, never reset.
    pub fn stop_employees(&mut self) -> Result<()> {
        info!("Forcing {} busy employees to stop", self.busy_count());
        for employee in self.employees.iter_mut().filter(|e| !e.is_free()) {
            employee.stop_working();
        }
        self.harvest_all(true)
    }

    /// Like [`Boss::progress_update`], but frees an employee whose report
    /// failed instead of keeping it for another attempt.
    fn harvest_all(&mut self, forced: bool) -> Result<()> {
        let mut result = Ok(());
        for employee in self.employees.iter_mut().filter(|e| !e.is_free()) {
            if let Err(err) = update_job_status(&self.pipeline, employee.as_mut(), forced) {
                let id = employee.job().map(display_id).unwrap_or_default();
                error!("Could not report job {id}: {err}");
                employee.free();
                result = result.and(Err(err));
            }
        }
        result
    }

    fn free_employee(&self) -> Option<usize> {
        self.employees.iter().position(|employee| employee.is_free())
    }

    fn busy_count(&self) -> usize {
        self.employees.iter().filter(|e| !e.is_free()).count()
    }
}

/// Reports a finished job to the pipeline and frees its employee.
/// Leaves a job that is still running alone.
fn update_job_status(
    pipeline: &Pipeline,
    employee: &mut dyn Employee,
    forced: bool,
) -> Result<()> {
    let state = employee.work_state(false);
    let Some(job) = employee.job().cloned() else {
        return Ok(());
    };

    match state {
        WorkState::Free | WorkState::Busy => return Ok(()),
        WorkState::Complete => pipeline.complete(&job)?,
        WorkState::Failed if !forced && job.try_again() => pipeline.reset(&job)?,
        WorkState::Failed => pipeline.fail(&job)?,
    }
    employee.free();
    Ok(())
}

impl std::fmt::Debug for Boss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Boss")
            .field("pipeline", &self.pipeline)
            .field("employees", &self.employees.len())
            .field("stop", &self.stop)
            .field("backoff", &self.backoff)
            .finish()
    }
}
