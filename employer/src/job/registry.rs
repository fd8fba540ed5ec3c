// SPDX-License-Identifier: MIT

//! Type tag to job constructor lookup, populated at startup.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::job::{Job, JobHandle, Record};

type Factory = fn(Record) -> Result<JobHandle>;

#[derive(Clone, Default)]
pub struct JobRegistry {
    factories: HashMap<&'static str, Factory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `J` under its tag. Registering the same type twice is a no-op.
    pub fn register<J: Job>(&mut self) -> &mut Self {
        self.factories.entry(J::NAME).or_insert(J::from_record as Factory);
        self
    }

    pub fn with<J: Job>(mut self) -> Self {
        self.register::<J>();
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn resolve(&self, record: Record) -> Result<JobHandle> {
        match self.factories.get(record.type_name.as_str()) {
            Some(factory) => factory(record),
            None => Err(Error::UnknownJobType(record.type_name)),
        }
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("JobRegistry").field("types", &names).finish()
    }
}
