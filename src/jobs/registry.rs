//! Registry mapping a job's `job_type()` tag back to a constructor that
//! rebuilds it from its `serialize()` output, so pending jobs survive a
//! process restart.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{CoreError, Result};

use super::job::Job;

type Constructor = Box<dyn Fn(Value) -> Result<Box<dyn Job>> + Send + Sync>;

#[derive(Default)]
pub struct UnserializerRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl UnserializerRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, job_type: &'static str, constructor: F)
    where
        F: Fn(Value) -> Result<Box<dyn Job>> + Send + Sync + 'static,
    {
        self.constructors.insert(job_type, Box::new(constructor));
    }

    pub fn unserialize(&self, job_type: &str, payload: Value) -> Result<Box<dyn Job>> {
        match self.constructors.get(job_type) {
            Some(constructor) => constructor(payload),
            None => Err(CoreError::UnknownResource(format!(
                "no unserializer registered for job type '{job_type}'"
            ))),
        }
    }

    pub fn knows(&self, job_type: &str) -> bool {
        self.constructors.contains_key(job_type)
    }
}
