mod reporter;
mod hashing;

pub use reporter::{ExperimentRecord, JobId, MemoryReporter, Reporter};
pub use hashing::{compute_hash, compute_json_hash, without_fields, HashRef, TIMING_FIELDS};
