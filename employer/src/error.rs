// SPDX-License-Identifier: MIT

//! Error type shared by the pipeline, the employees and the boss.
//!
//! Job bodies never surface here: a failing `perform` is turned into a
//! pipeline transition (`reset` or `fail`) by the boss. Everything in this
//! enum is either a configuration mistake or a broken scheduling invariant and
//! is returned to the caller immediately.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("pipeline has no backend")]
    BackendRequired,

    #[error("backend is missing required capabilities: {}", missing.join(", "))]
    InvalidBackend { missing: Vec<&'static str> },

    #[error("backend does not support '{0}'")]
    Unsupported(&'static str),

    #[error("record of type '{found}' cannot be deserialized as '{expected}'")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("job has no pipeline")]
    NoPipeline,

    #[error("no job type registered for '{0}'")]
    UnknownJobType(String),

    #[error("employee is busy")]
    EmployeeBusy,

    #[error("no employee is free")]
    NoEmployeeFree,

    #[error("could not start worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("could not fork worker process: {0}")]
    Fork(#[from] nix::errno::Errno),

    #[error("job serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
