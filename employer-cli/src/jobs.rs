// SPDX-License-Identifier: MIT

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{ensure, Context};
use employer::{Job, JobHandle, JobRegistry, Pipeline, Record};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Runs an external program; a non-zero exit fails the job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandJob {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    /// Put the job back in the queue when the program fails.
    pub retry: Option<bool>,
}

impl Job for CommandJob {
    const NAME: &'static str = "CommandJob";
    const ATTRIBUTES: &'static [&'static str] = &["program", "args", "retry"];

    fn perform(&self) -> anyhow::Result<()> {
        let program = self
            .program
            .as_deref()
            .context("CommandJob has no program")?;
        debug!("Running {program} {:?}", self.args.as_deref().unwrap_or_default());
        let status = Command::new(program)
            .args(self.args.iter().flatten())
            .status()
            .with_context(|| format!("cannot run {program}"))?;
        ensure!(status.success(), "{program} exited with {status}");
        Ok(())
    }

    fn try_again(&self) -> bool {
        self.retry.unwrap_or(false)
    }
}

pub fn registry() -> JobRegistry {
    JobRegistry::new().with::<CommandJob>()
}

/// Enqueues every record of a JSON array. Records are resolved first, so an
/// unknown type rejects the whole file before anything is queued.
pub fn seed(pipeline: &Pipeline, path: &Path) -> anyhow::Result<usize> {
    let text =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let records: Vec<Record> = serde_json::from_str(&text)
        .with_context(|| format!("invalid jobs file {}", path.display()))?;
    let jobs = records
        .into_iter()
        .map(|record| pipeline.registry().resolve(record))
        .collect::<Result<Vec<JobHandle>, _>>()?;

    for job in &jobs {
        pipeline.enqueue(job)?;
    }
    info!("Queued {} jobs from {}", jobs.len(), path.display());
    Ok(jobs.len())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use employer::MemoryBackend;

    use super::*;

    fn pipeline(backend: &MemoryBackend) -> Pipeline {
        let pipeline = Pipeline::new(registry());
        pipeline.set_backend(Box::new(backend.clone())).unwrap();
        pipeline
    }

    fn jobs_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_command_job_exit_status() {
        let ok = CommandJob {
            program: Some("true".into()),
            ..Default::default()
        };
        assert!(ok.perform().is_ok());

        let failing = CommandJob {
            program: Some("false".into()),
            ..Default::default()
        };
        assert!(failing.perform().is_err());
    }

    #[test]
    fn test_command_job_without_program() {
        assert!(CommandJob::default().perform().is_err());
    }

    #[test]
    fn test_retry_attribute() {
        let job = CommandJob {
            retry: Some(true),
            ..Default::default()
        };
        assert!(job.try_again());
        assert!(!CommandJob::default().try_again());
    }

    #[test]
    fn test_seed_queues_records() {
        let backend = MemoryBackend::new();
        let file = jobs_file(
            r#"[
                {"type": "CommandJob", "attributes": {"program": "true"}},
                {
                    "type": "CommandJob",
                    "attributes": {"program": "echo", "args": ["hi"], "retry": true}
                }
            ]"#,
        );

        let queued = seed(&pipeline(&backend), file.path()).unwrap();

        assert_eq!(queued, 2);
        assert_eq!(backend.len(), 2);
    }

    #[test]
    fn test_seed_rejects_unknown_type() {
        let backend = MemoryBackend::new();
        let file = jobs_file(
            r#"[
                {"type": "CommandJob", "attributes": {"program": "true"}},
                {"type": "Mystery", "attributes": {}}
            ]"#,
        );

        assert!(seed(&pipeline(&backend), file.path()).is_err());
        assert!(backend.is_empty());
    }
}
