// SPDX-License-Identifier: MIT
//
// employer: job-processing worker pool.
//
// - A boss polls a pipeline for queued jobs and hands them to employees.
// - Employees run each job in a forked child process or in a thread.
// - The queue itself is a pluggable backend behind the pipeline.

pub mod boss;
pub mod employee;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod workshop;

#[cfg(test)]
mod testing;

pub use boss::{Backoff, Boss, StopHandle};
pub use employee::{Employee, ForkingEmployee, ThreadingEmployee, WorkState};
pub use error::{Error, Result};
pub use job::{Job, JobHandle, JobId, JobRegistry, Record};
pub use pipeline::memory::MemoryBackend;
pub use pipeline::{Backend, Capabilities, Pipeline};
pub use workshop::{Workshop, WorkshopConfig};
