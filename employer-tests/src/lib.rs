// SPDX-License-Identifier: MIT

//! Job types and helpers for the end-to-end tests.
//!
//! Jobs leave their traces in files, because a job run by a forking employee
//! cannot touch the memory of the test process.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use employer::{Job, JobRegistry};
use serde::{Deserialize, Serialize};

/// Appends one line with the pid of the process running it to `path`, then
/// sleeps for `millis`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchJob {
    pub path: Option<PathBuf>,
    pub millis: Option<u64>,
    /// Fail every run until the file holds this many lines.
    pub fail_until: Option<usize>,
    pub retry: Option<bool>,
}

impl TouchJob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn sleeping(mut self, millis: u64) -> Self {
        self.millis = Some(millis);
        self
    }

    pub fn failing_until(mut self, runs: usize) -> Self {
        self.fail_until = Some(runs);
        self
    }

    pub fn retrying(mut self) -> Self {
        self.retry = Some(true);
        self
    }
}

impl Job for TouchJob {
    const NAME: &'static str = "TouchJob";
    const ATTRIBUTES: &'static [&'static str] = &["path", "millis", "fail_until", "retry"];

    fn perform(&self) -> anyhow::Result<()> {
        let path = self.path.as_deref().context("TouchJob has no path")?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        drop(file);

        if let Some(millis) = self.millis {
            thread::sleep(Duration::from_millis(millis));
        }
        if let Some(runs) = self.fail_until {
            if runs_recorded(path) < runs {
                bail!("run {} of {runs} fails on purpose", runs_recorded(path));
            }
        }
        Ok(())
    }

    fn try_again(&self) -> bool {
        self.retry.unwrap_or(false)
    }
}

pub fn registry() -> JobRegistry {
    JobRegistry::new().with::<TouchJob>()
}

/// Pids written by every run of a [`TouchJob`], oldest first.
pub fn recorded_pids(path: &Path) -> Vec<u32> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

pub fn runs_recorded(path: &Path) -> usize {
    recorded_pids(path).len()
}

/// Polls `condition` every 10ms; false if it never held within `timeout`.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}
