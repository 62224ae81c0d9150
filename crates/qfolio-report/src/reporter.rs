use qfolio_types::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::hashing::{compute_hash, compute_json_hash, without_fields, HashRef, TIMING_FIELDS};

/// Handle assigned by the job tracker to one optimization request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Persisted experiment with input/output hashes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub job_id: JobId,
    pub input_hash: HashRef,
    pub output_hash: HashRef,
    /// Hash over the inputs and the outputs minus timing fields, identifying
    /// a repeated experiment
    pub fingerprint: HashRef,
    pub inputs: serde_json::Value,
    pub outputs: serde_json::Value,
}

/// Job tracker sink for engine inputs and outputs
pub trait Reporter {
    /// Allocate a handle for a new job
    fn next_job_id(&self) -> JobId;

    fn publish(
        &self,
        job_id: JobId,
        inputs: &serde_json::Value,
        outputs: &serde_json::Value,
    ) -> Result<ExperimentRecord>;
}

/// In-memory job tracker
#[derive(Debug, Default)]
pub struct MemoryReporter {
    next_id: AtomicU64,
    records: Mutex<Vec<ExperimentRecord>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far
    pub fn records(&self) -> Vec<ExperimentRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Earlier job that produced the same fingerprint, if any
    pub fn find_duplicate(&self, fingerprint: &str) -> Option<JobId> {
        self.records()
            .iter()
            .find(|r| r.fingerprint == fingerprint)
            .map(|r| r.job_id)
    }
}

impl Reporter for MemoryReporter {
    fn next_job_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn publish(
        &self,
        job_id: JobId,
        inputs: &serde_json::Value,
        outputs: &serde_json::Value,
    ) -> Result<ExperimentRecord> {
        let input_hash = compute_json_hash(inputs)?;
        let output_hash = compute_json_hash(outputs)?;
        let stable_output = compute_json_hash(&without_fields(outputs, TIMING_FIELDS))?;
        let fingerprint = compute_hash(format!("{}:{}", input_hash, stable_output).as_bytes());

        let record = ExperimentRecord {
            job_id,
            input_hash,
            output_hash,
            fingerprint,
            inputs: inputs.clone(),
            outputs: outputs.clone(),
        };

        if let Some(previous) = self.find_duplicate(&record.fingerprint) {
            tracing::info!(%job_id, %previous, "experiment repeats an earlier job");
        }

        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }

        Ok(record)
    }
}
