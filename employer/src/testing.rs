// SPDX-License-Identifier: MIT

//! Job types shared by the unit tests.

use std::thread;
use std::time::Duration;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::job::Job;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub name: Option<String>,
    pub times: Option<u32>,
    pub tags: Option<Vec<String>>,
}

impl Job for Greeting {
    const NAME: &'static str = "Greeting";
    const ATTRIBUTES: &'static [&'static str] = &["name", "times", "tags", "name"];

    fn perform(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Sleeps, then succeeds, fails or panics depending on its attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sleepy {
    pub millis: Option<u64>,
    pub fail: Option<bool>,
    pub panic: Option<bool>,
    pub retry: Option<bool>,
}

impl Sleepy {
    pub fn succeeding(millis: u64) -> Self {
        Self {
            millis: Some(millis),
            ..Default::default()
        }
    }

    pub fn failing(millis: u64) -> Self {
        Self {
            millis: Some(millis),
            fail: Some(true),
            ..Default::default()
        }
    }

    pub fn retrying(mut self) -> Self {
        self.retry = Some(true);
        self
    }
}

impl Job for Sleepy {
    const NAME: &'static str = "Sleepy";
    const ATTRIBUTES: &'static [&'static str] = &["millis", "fail", "panic", "retry"];

    fn perform(&self) -> anyhow::Result<()> {
        thread::sleep(Duration::from_millis(self.millis.unwrap_or(0)));
        if self.panic.unwrap_or(false) {
            panic!("sleepy job panicked on purpose");
        }
        if self.fail.unwrap_or(false) {
            bail!("sleepy job failed on purpose");
        }
        Ok(())
    }

    fn try_again(&self) -> bool {
        self.retry.unwrap_or(false)
    }
}
