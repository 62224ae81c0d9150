use qfolio_types::{CancelToken, PriceRow, QfolioError, Result, RunBudget};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::comparator::Comparator;
use crate::config::EngineConfig;
use crate::report::ComparisonReport;
use crate::request::OptimizationRequest;

/// Lifecycle of a submitted comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum JobStatus {
    Queued = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
}

impl JobStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => JobStatus::Queued,
            1 => JobStatus::Running,
            2 => JobStatus::Completed,
            3 => JobStatus::Failed,
            _ => JobStatus::Cancelled,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Caller's view of a submitted job
pub struct JobHandle {
    status: Arc<AtomicU8>,
    token: CancelToken,
    receiver: mpsc::Receiver<Result<ComparisonReport>>,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Ask the job to stop at its next iteration boundary
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Block until the job finishes
    pub fn wait(self) -> Result<ComparisonReport> {
        self.receiver
            .recv()
            .map_err(|_| QfolioError::Internal("worker dropped the job".to_string()))?
    }

    /// Block for at most `timeout`; `None` if still running
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<ComparisonReport>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(QfolioError::Internal(
                "worker dropped the job".to_string(),
            ))),
        }
    }
}

/// Bounded worker pool running comparisons off the caller's thread
pub struct SolverPool {
    pool: rayon::ThreadPool,
    comparator: Arc<Comparator>,
}

impl SolverPool {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("qfolio-worker-{}", i));
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| QfolioError::Internal(format!("failed to start worker pool: {}", e)))?;

        Ok(SolverPool {
            pool,
            comparator: Arc::new(Comparator::new(config)),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue a request; the returned handle reports status and the result
    pub fn submit(&self, rows: Vec<PriceRow>, request: OptimizationRequest) -> JobHandle {
        let status = Arc::new(AtomicU8::new(JobStatus::Queued as u8));
        let token = CancelToken::new();
        let (sender, receiver) = mpsc::channel();

        let job_status = Arc::clone(&status);
        let job_token = token.clone();
        let comparator = Arc::clone(&self.comparator);

        self.pool.spawn(move || {
            if job_token.is_cancelled() {
                job_status.store(JobStatus::Cancelled as u8, Ordering::Release);
                let _ = sender.send(Err(QfolioError::Cancelled(
                    "job cancelled before it started".to_string(),
                )));
                return;
            }

            job_status.store(JobStatus::Running as u8, Ordering::Release);
            let time_limit = request.time_limit_ms.map(Duration::from_millis);
            let budget = RunBudget::new(job_token.clone(), time_limit);

            let result = comparator.run_request(&rows, &request, &budget);
            let final_status = match &result {
                _ if job_token.is_cancelled() => JobStatus::Cancelled,
                Ok(_) => JobStatus::Completed,
                Err(err) => {
                    tracing::warn!(error = %err, "job failed");
                    JobStatus::Failed
                }
            };

            job_status.store(final_status as u8, Ordering::Release);
            let _ = sender.send(result);
        });

        JobHandle {
            status,
            token,
            receiver,
        }
    }
}
