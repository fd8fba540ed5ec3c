// SPDX-License-Identifier: MIT

//! # Pipeline
//!
//! Queue facade in front of a pluggable [`Backend`]. The pipeline turns jobs
//! into [`Record`]s on the way in and back into jobs on the way out, using
//! the [`JobRegistry`] to find the concrete type behind a record's tag.
//!
//! Every operation except assigning the backend fails with
//! [`Error::BackendRequired`] until a backend is set. A backend that lacks
//! one of the required primitives is rejected on assignment.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::error::{Error, Result};
use crate::job::registry::JobRegistry;
use crate::job::{display_id, JobHandle, JobId, Record};

pub mod backend;
pub mod memory;

pub use backend::{Backend, Capabilities};


pub struct Pipeline {
    registry: JobRegistry,
    backend: Mutex<Option<Box<dyn Backend>>>,
}

impl Pipeline {
    pub fn new(registry: JobRegistry) -> Self {
        Self {
            registry,
            backend: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn set_backend(&self, backend: Box<dyn Backend>) -> Result<()> {
        let capabilities = backend.capabilities();
        let missing = capabilities.missing(Capabilities::REQUIRED);
        if !missing.is_empty() {
            return Err(Error::InvalidBackend { missing });
        }
        debug!("Pipeline backend assigned with {:?}", capabilities);
        *self.lock_backend() = Some(backend);
        Ok(())
    }

    pub fn has_backend(&self) -> bool {
        self.lock_backend().is_some()
    }

    pub fn enqueue(&self, job: &JobHandle) -> Result<JobId> {
        let record = job.to_record()?;
        let id = self.with_backend(|backend| backend.enqueue(record))?;
        debug!("Enqueued {} job {}", job.type_name(), id);
        Ok(id)
    }

    /// Next job from the backend, with its pipeline set to `self`.
    ///
    /// A record whose type is not registered is an error, not an empty
    /// queue: the record has already left the backend.
    pub fn dequeue(self: &Arc<Self>) -> Result<Option<JobHandle>> {
        let record: Option<Record> = self.with_backend(|backend| backend.dequeue())?;
        let Some(record) = record else {
            return Ok(None);
        };

        let mut job = self.registry.resolve(record)?;
        job.set_pipeline(self);
        debug!("Dequeued {} job {}", job.type_name(), display_id(&job));
        Ok(Some(job))
    }

    pub fn complete(&self, job: &JobHandle) -> Result<()> {
        self.with_backend(|backend| {
            info!("Marking job {} as complete", display_id(job));
            backend.complete(job)
        })
    }

    pub fn reset(&self, job: &JobHandle) -> Result<()> {
        self.with_backend(|backend| {
            info!("Resetting job {}", display_id(job));
            backend.reset(job)
        })
    }

    pub fn fail(&self, job: &JobHandle) -> Result<()> {
        self.with_backend(|backend| {
            info!("Marking job {} as failed", display_id(job));
            backend.fail(job)
        })
    }

    /// Drops all queued work. Administrative; the boss never calls this.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.lock_backend();
        let backend = guard.as_mut().ok_or(Error::BackendRequired)?;
        if !backend.capabilities().contains(Capabilities::CLEAR) {
            return Err(Error::Unsupported("clear"));
        }
        info!("Clearing pipeline of all jobs!");
        backend.clear()?;
        Ok(())
    }

    fn with_backend<T>(
        &self,
        op: impl FnOnce(&mut dyn Backend) -> anyhow::Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock_backend();
        let backend = guard.as_mut().ok_or(Error::BackendRequired)?;
        Ok(op(backend.as_mut())?)
    }

    fn lock_backend(&self) -> MutexGuard<'_, Option<Box<dyn Backend>>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("has_backend", &self.has_backend())
            .finish()
    }
}
