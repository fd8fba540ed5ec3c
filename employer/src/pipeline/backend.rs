// SPDX-License-Identifier: MIT

use std::fmt;
use std::ops::BitOr;

use anyhow::bail;

use crate::job::{JobHandle, JobId, Record};

/// Set of queue primitives a backend implements.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const ENQUEUE: Capabilities = Capabilities(1 << 0);
    pub const DEQUEUE: Capabilities = Capabilities(1 << 1);
    pub const COMPLETE: Capabilities = Capabilities(1 << 2);
    pub const RESET: Capabilities = Capabilities(1 << 3);
    pub const FAIL: Capabilities = Capabilities(1 << 4);
    pub const CLEAR: Capabilities = Capabilities(1 << 5);

    pub const NONE: Capabilities = Capabilities(0);
    /// What a pipeline refuses to run without.
    pub const REQUIRED: Capabilities = Capabilities(0b01_1111);
    pub const ALL: Capabilities = Capabilities(0b11_1111);

    const NAMES: [(Capabilities, &'static str); 6] = [
        (Self::ENQUEUE, "enqueue"),
        (Self::DEQUEUE, "dequeue"),
        (Self::COMPLETE, "complete"),
        (Self::RESET, "reset"),
        (Self::FAIL, "fail"),
        (Self::CLEAR, "clear"),
    ];

    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, other: Capabilities) -> Capabilities {
        Capabilities(self.0 & !other.0)
    }

    /// Names of the capabilities in `required` that `self` lacks.
    pub fn missing(self, required: Capabilities) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(cap, _)| required.contains(*cap) && !self.contains(*cap))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = Self::NAMES
            .iter()
            .filter(|(cap, _)| self.contains(*cap))
            .map(|(_, name)| *name)
            .collect();
        f.debug_tuple("Capabilities").field(&names).finish()
    }
}

/// Storage and transport behind a [`Pipeline`](super::Pipeline).
///
/// Records are handed over as-is; how they are persisted is up to the backend.
pub trait Backend: Send {
    /// Primitives this backend actually supports. Checked once, when the
    /// backend is assigned to a pipeline.
    fn capabilities(&self) -> Capabilities {
        Capabilities::REQUIRED
    }

    fn enqueue(&mut self, record: Record) -> anyhow::Result<JobId>;

    /// Next record, or `None` when the queue is empty.
    fn dequeue(&mut self) -> anyhow::Result<Option<Record>>;

    fn complete(&mut self, job: &JobHandle) -> anyhow::Result<()>;

    /// Puts the job back into the queue for another attempt.
    fn reset(&mut self, job: &JobHandle) -> anyhow::Result<()>;

    /// Marks the job as terminally failed; it is not queued again.
    fn fail(&mut self, job: &JobHandle) -> anyhow::Result<()>;

    fn clear(&mut self) -> anyhow::Result<()> {
        bail!("clear is not implemented by this backend")
    }
}
