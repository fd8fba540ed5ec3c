// SPDX-License-Identifier: MIT

//! # Job contract
//!
//! A job type is a plain struct with named fields that derives serde's
//! `Serialize`/`Deserialize` and implements [`Job`]. The type declares its
//! canonical tag ([`Job::NAME`]) and its attribute schema
//! ([`Job::ATTRIBUTES`]) once, statically. Struct fields are the attribute
//! accessors; `Option` fields that are `None` are left out of the record.
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize)]
//! struct SendMail {
//!     to: Option<String>,
//!     attempts: Option<u32>,
//! }
//!
//! impl Job for SendMail {
//!     const NAME: &'static str = "SendMail";
//!     const ATTRIBUTES: &'static [&'static str] = &["to", "attempts"];
//!
//!     fn perform(&self) -> anyhow::Result<()> {
//!         mailer::send(self.to.as_deref().unwrap_or_default())
//!     }
//! }
//! ```
//!
//! Once a job is on its way through the system it travels as a [`JobHandle`]:
//! the type-erased job plus its queue id and a weak reference to the pipeline
//! that handed it out.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use serde::{de::DeserializeOwned, ser::Error as _, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;

pub mod registry;

pub use registry::JobRegistry;


/// Attribute name to value, as stored in a [`Record`].
pub type Attributes = Map<String, Value>;

/// Opaque identifier handed out by a backend on enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend-agnostic serialized form of a job: `{id?, type, attributes}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobId>,

    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub attributes: Attributes,
}

pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Canonical type tag written into every record of this type.
    const NAME: &'static str;

    /// Names of the serializable attributes, in declaration order.
    /// Repeated names are only serialized once.
    const ATTRIBUTES: &'static [&'static str];

    /// The job body. Runs inside a worker process or thread, never in the boss.
    fn perform(&self) -> anyhow::Result<()>;

    /// Whether a failed run should be put back into the queue.
    fn try_again(&self) -> bool {
        false
    }

    /// Declared attributes with a non-null value.
    fn attributes(&self) -> Result<Attributes> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(Error::Serialization(serde_json::Error::custom(format!(
                    "job type '{}' must serialize to a map",
                    Self::NAME
                ))))
            }
        };

        let mut attributes = Attributes::new();
        for name in Self::ATTRIBUTES {
            if attributes.contains_key(*name) {
                continue;
            }
            match fields.remove(*name) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    attributes.insert(name.to_string(), value);
                }
            }
        }
        Ok(attributes)
    }

    /// Record without an id, as produced for a job that was never enqueued.
    fn to_record(&self) -> Result<Record> {
        Ok(Record {
            id: None,
            type_name: Self::NAME.to_string(),
            attributes: self.attributes()?,
        })
    }

    /// Rebuilds a job from a record of this type, keeping the record's id.
    fn from_record(record: Record) -> Result<JobHandle> {
        if record.type_name != Self::NAME {
            return Err(Error::TypeMismatch {
                expected: Self::NAME,
                found: record.type_name,
            });
        }
        let job: Self = serde_json::from_value(Value::Object(record.attributes))?;
        let mut handle = JobHandle::new(job);
        handle.id = record.id;
        Ok(handle)
    }
}

/// Object-safe face of [`Job`]; implemented for every job type.
pub trait DynJob: Send + Sync + 'static {
    fn type_name(&self) -> &'static str;
    fn attribute_names(&self) -> &'static [&'static str];
    fn dyn_attributes(&self) -> Result<Attributes>;
    fn dyn_perform(&self) -> anyhow::Result<()>;
    fn dyn_try_again(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<J: Job> DynJob for J {
    fn type_name(&self) -> &'static str {
        J::NAME
    }

    fn attribute_names(&self) -> &'static [&'static str] {
        J::ATTRIBUTES
    }

    fn dyn_attributes(&self) -> Result<Attributes> {
        self.attributes()
    }

    fn dyn_perform(&self) -> anyhow::Result<()> {
        self.perform()
    }

    fn dyn_try_again(&self) -> bool {
        self.try_again()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A job in flight: the type-erased job, its queue id and its owning pipeline.
///
/// Cloning is cheap; clones share the job.
#[derive(Clone)]
pub struct JobHandle {
    id: Option<JobId>,
    job: Arc<dyn DynJob>,
    pipeline: Option<Weak<Pipeline>>,
}

impl JobHandle {
    pub fn new<J: Job>(job: J) -> Self {
        Self {
            id: None,
            job: Arc::new(job),
            pipeline: None,
        }
    }

    pub fn id(&self) -> Option<&JobId> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: JobId) {
        self.id = Some(id);
    }

    pub fn type_name(&self) -> &'static str {
        self.job.type_name()
    }

    pub fn attribute_names(&self) -> &'static [&'static str] {
        self.job.attribute_names()
    }

    pub fn downcast_ref<J: Job>(&self) -> Option<&J> {
        self.job.as_any().downcast_ref::<J>()
    }

    pub fn to_record(&self) -> Result<Record> {
        Ok(Record {
            id: self.id.clone(),
            type_name: self.type_name().to_string(),
            attributes: self.job.dyn_attributes()?,
        })
    }

    pub fn perform(&self) -> anyhow::Result<()> {
        self.job.dyn_perform()
    }

    pub fn try_again(&self) -> bool {
        self.job.dyn_try_again()
    }

    /// The pipeline this job was dequeued from, if it is still alive.
    pub fn pipeline(&self) -> Option<Arc<Pipeline>> {
        self.pipeline.as_ref().and_then(Weak::upgrade)
    }

    pub fn set_pipeline(&mut self, pipeline: &Arc<Pipeline>) {
        self.pipeline = Some(Arc::downgrade(pipeline));
    }

    pub fn complete(&self) -> Result<()> {
        self.owning_pipeline()?.complete(self)
    }

    pub fn fail(&self) -> Result<()> {
        self.owning_pipeline()?.fail(self)
    }

    pub fn reset(&self) -> Result<()> {
        self.owning_pipeline()?.reset(self)
    }

    fn owning_pipeline(&self) -> Result<Arc<Pipeline>> {
        self.pipeline().ok_or(Error::NoPipeline)
    }
}

impl<J: Job> From<J> for JobHandle {
    fn from(job: J) -> Self {
        JobHandle::new(job)
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("type", &self.type_name())
            .field("has_pipeline", &self.pipeline().is_some())
            .finish()
    }
}

/// Id for log lines; jobs that were never enqueued have none.
pub(crate) fn display_id(job: &JobHandle) -> String {
    job.id()
        .map(JobId::to_string)
        .unwrap_or_else(|| "<unqueued>".to_string())
}
