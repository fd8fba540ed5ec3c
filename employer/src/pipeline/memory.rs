// SPDX-License-Identifier: MIT

//! In-process FIFO backend.
//!
//! Clones share the same queue, so a test or a producer thread can keep a
//! clone to inspect the ledgers while the pipeline owns another.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;

use crate::job::{JobHandle, JobId, Record};
use crate::pipeline::backend::{Backend, Capabilities};

#[derive(Debug, Default)]
struct MemoryQueue {
    last_id: u64,
    queued: VecDeque<Record>,
    in_flight: HashMap<JobId, Record>,
    completed: Vec<JobId>,
    failed: Vec<JobId>,
    resets: Vec<JobId>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    queue: Arc<Mutex<MemoryQueue>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.lock().queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queued.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// True once nothing is queued and nothing is handed out.
    pub fn is_settled(&self) -> bool {
        let queue = self.lock();
        queue.queued.is_empty() && queue.in_flight.is_empty()
    }

    pub fn completed(&self) -> Vec<JobId> {
        self.lock().completed.clone()
    }

    pub fn failed(&self) -> Vec<JobId> {
        self.lock().failed.clone()
    }

    /// Ids in the order they were reset, one entry per reset.
    pub fn resets(&self) -> Vec<JobId> {
        self.lock().resets.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn in_flight_id(job: &JobHandle) -> anyhow::Result<JobId> {
    job.id()
        .cloned()
        .ok_or_else(|| anyhow!("{} job has no id", job.type_name()))
}

impl Backend for MemoryBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn enqueue(&mut self, mut record: Record) -> anyhow::Result<JobId> {
        let mut queue = self.lock();
        queue.last_id += 1;
        let id = JobId::from(queue.last_id);
        record.id = Some(id.clone());
        queue.queued.push_back(record);
        Ok(id)
    }

    fn dequeue(&mut self) -> anyhow::Result<Option<Record>> {
        let mut queue = self.lock();
        let Some(record) = queue.queued.pop_front() else {
            return Ok(None);
        };
        if let Some(id) = &record.id {
            queue.in_flight.insert(id.clone(), record.clone());
        }
        Ok(Some(record))
    }

    fn complete(&mut self, job: &JobHandle) -> anyhow::Result<()> {
        let id = in_flight_id(job)?;
        let mut queue = self.lock();
        queue.in_flight.remove(&id);
        queue.completed.push(id);
        Ok(())
    }

    fn reset(&mut self, job: &JobHandle) -> anyhow::Result<()> {
        let id = in_flight_id(job)?;
        let record = job.to_record()?;
        let mut queue = self.lock();
        queue.in_flight.remove(&id);
        queue.resets.push(id);
        queue.queued.push_back(record);
        Ok(())
    }

    fn fail(&mut self, job: &JobHandle) -> anyhow::Result<()> {
        let id = in_flight_id(job)?;
        let mut queue = self.lock();
        queue.in_flight.remove(&id);
        queue.failed.push(id);
        Ok(())
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        self.lock().queued.clear();
        Ok(())
    }
}
