//! In-memory runtime double that records every call

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use crate::errors::RuntimeError;
use crate::runtime::{RemoveOptions, WorkloadHandle, WorkloadRuntime, WorkloadSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Create(WorkloadSpec),
    Start(WorkloadHandle),
    Inspect(String),
    Remove { name: String, options: RemoveOptions },
}

/// Behaves like a runtime with unique workload names
///
/// `fail_on("create" | "start" | "inspect" | "remove", err)` makes every
/// later call of that operation return `err`.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    calls: Mutex<Vec<RuntimeCall>>,
    existing: Mutex<AHashSet<String>>,
    failures: Mutex<AHashMap<&'static str, RuntimeError>>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a workload with `name` already exists
    pub fn with_existing(self, name: &str) -> Self {
        self.existing.lock().insert(name.to_string());
        self
    }

    pub fn fail_on(&self, operation: &'static str, error: RuntimeError) {
        self.failures.lock().insert(operation, error);
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().clone()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.existing.lock().contains(name)
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.lock().push(call);
    }

    fn injected(&self, operation: &str) -> Result<(), RuntimeError> {
        match self.failures.lock().get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl WorkloadRuntime for RecordingRuntime {
    fn name(&self) -> &str {
        "recording"
    }

    fn create_workload(&self, spec: &WorkloadSpec) -> Result<WorkloadHandle, RuntimeError> {
        self.record(RuntimeCall::Create(spec.clone()));
        self.injected("create")?;
        let mut existing = self.existing.lock();
        if !existing.insert(spec.name.clone()) {
            return Err(RuntimeError::Conflict {
                name: spec.name.clone(),
            });
        }
        Ok(WorkloadHandle::new(format!("rec-{}", spec.name)))
    }

    fn start_workload(&self, handle: &WorkloadHandle) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Start(handle.clone()));
        self.injected("start")
    }

    fn inspect_workload(&self, name: &str) -> Result<bool, RuntimeError> {
        self.record(RuntimeCall::Inspect(name.to_string()));
        self.injected("inspect")?;
        Ok(self.exists(name))
    }

    fn remove_workload(&self, name: &str, options: RemoveOptions) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Remove {
            name: name.to_string(),
            options,
        });
        self.injected("remove")?;
        self.existing.lock().remove(name);
        Ok(())
    }
}
