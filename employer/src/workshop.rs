// SPDX-License-Identifier: MIT

//! Configuration and assembly of a boss with its employees.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::boss::{Backoff, Boss, StopHandle};
use crate::employee::{ForkingEmployee, ThreadingEmployee};
use crate::error::{Error, Result};
use crate::job::registry::JobRegistry;
use crate::pipeline::{Backend, Pipeline};

/// Roster and polling setup, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkshopConfig {
    /// Workers that fork a child process per job.
    pub forking_employees: usize,
    /// Workers that spawn a thread per job.
    pub threading_employees: usize,
    /// Ascending delays between dequeue attempts, in milliseconds.
    pub backoff_ms: Vec<u64>,
}

impl Default for WorkshopConfig {
    fn default() -> Self {
        Self {
            forking_employees: 4,
            threading_employees: 0,
            backoff_ms: vec![100, 500, 1000, 2500, 5000],
        }
    }
}

impl WorkshopConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forking_employees + self.threading_employees == 0 {
            return Err(Error::Config("at least one employee is required".into()));
        }
        if self.backoff_ms.is_empty() {
            return Err(Error::Config("backoff_ms must not be empty".into()));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::from_millis(&self.backoff_ms)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A boss staffed according to a [`WorkshopConfig`].
#[derive(Debug)]
pub struct Workshop {
    boss: Boss,
}

impl Workshop {
    /// Forking employees are allocated first, threading employees after them.
    pub fn new(
        config: &WorkshopConfig,
        registry: JobRegistry,
        backend: Box<dyn Backend>,
    ) -> Result<Self> {
        config.validate()?;
        let pipeline = Self::pipeline_only(registry, backend)?;
        let mut boss = Boss::new(pipeline).with_backoff(config.backoff());
        for _ in 0..config.forking_employees {
            boss.allocate_employee(Box::new(ForkingEmployee::new()));
        }
        for _ in 0..config.threading_employees {
            boss.allocate_employee(Box::new(ThreadingEmployee::new()));
        }
        info!(
            "Workshop staffed with {} forking and {} threading employees",
            config.forking_employees, config.threading_employees
        );
        Ok(Self { boss })
    }

    /// Just the pipeline, for processes that only enqueue.
    pub fn pipeline_only(
        registry: JobRegistry,
        backend: Box<dyn Backend>,
    ) -> Result<Arc<Pipeline>> {
        let pipeline = Arc::new(Pipeline::new(registry));
        pipeline.set_backend(backend)?;
        Ok(pipeline)
    }

    /// Blocks until stopped.
    pub fn run(&mut self) -> Result<()> {
        self.boss.manage()
    }

    pub fn stop(&self) {
        self.boss.stop_managing();
    }

    pub fn stop_now(&self) {
        self.boss.stop_handle().stop_now();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.boss.stop_handle()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        self.boss.pipeline()
    }

    pub fn boss(&self) -> &Boss {
        &self.boss
    }

    pub fn boss_mut(&mut self) -> &mut Boss {
        &mut self.boss
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::job::JobHandle;
    use crate::pipeline::memory::MemoryBackend;
    use crate::testing::{Greeting, Sleepy};

    fn registry() -> JobRegistry {
        JobRegistry::new().with::<Greeting>().with::<Sleepy>()
    }

    fn config_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let file = config_file(r#"{ "threading_employees": 2 }"#);

        let config = WorkshopConfig::load(file.path()).unwrap();

        assert_eq!(config.forking_employees, 4);
        assert_eq!(config.threading_employees, 2);
        assert_eq!(config.backoff_ms, WorkshopConfig::default().backoff_ms);
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let file = config_file(r#"{ "forking_employes": 2 }"#);
        assert!(matches!(WorkshopConfig::load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkshopConfig::load(dir.path().join("employer.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_validate() {
        let empty_roster = WorkshopConfig {
            forking_employees: 0,
            ..Default::default()
        };
        assert!(matches!(empty_roster.validate(), Err(Error::Config(_))));

        let no_backoff = WorkshopConfig {
            backoff_ms: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(no_backoff.validate(), Err(Error::Config(_))));

        assert!(WorkshopConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_config_round_trips_through_file() {
        let json = WorkshopConfig::default().to_json_pretty().unwrap();
        let file = config_file(&json);
        assert_eq!(WorkshopConfig::load(file.path()).unwrap(), WorkshopConfig::default());
    }

    #[test]
    fn test_roster_order() {
        let config = WorkshopConfig {
            forking_employees: 2,
            threading_employees: 1,
            backoff_ms: vec![1],
        };

        let workshop = Workshop::new(&config, registry(), Box::new(MemoryBackend::new())).unwrap();

        let kinds: Vec<_> = workshop.boss().employees().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["forking", "forking", "threading"]);
        assert_eq!(workshop.boss().backoff().delays(), &[Duration::from_millis(1)]);
    }

    #[test]
    fn test_pipeline_only_enqueues() {
        let backend = MemoryBackend::new();

        let pipeline = Workshop::pipeline_only(registry(), Box::new(backend.clone())).unwrap();
        pipeline.enqueue(&JobHandle::new(Greeting::default())).unwrap();

        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_run_until_stopped_from_another_thread() {
        let backend = MemoryBackend::new();
        let config = WorkshopConfig {
            forking_employees: 0,
            threading_employees: 2,
            backoff_ms: vec![0, 5],
        };
        let mut workshop = Workshop::new(&config, registry(), Box::new(backend.clone())).unwrap();
        for _ in 0..4 {
            workshop.pipeline().enqueue(&JobHandle::new(Sleepy::succeeding(20))).unwrap();
        }
        let stop = workshop.stop_handle();

        let runner = thread::spawn(move || workshop.run());
        let deadline = Instant::now() + Duration::from_secs(10);
        while !backend.is_settled() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        stop.stop_managing();

        runner.join().unwrap().unwrap();
        assert_eq!(backend.completed().len(), 4);
    }
}
