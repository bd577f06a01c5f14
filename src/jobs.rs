//! Asynchronous job lifecycle for long-running Monte Carlo simulations.
//!
//! Small runs complete synchronously inside a request; large runs go
//! through [`JobManager`]: `submit` returns immediately with a job id,
//! `status` reports the lifecycle state, and `result` yields the finished
//! run or a typed lifecycle error.
//!
//! Lifecycle: `Requested -> Running -> Completed | Failed | Cancelled`.
//! Cancellation is cooperative: the worker observes the flag between
//! chunks, a chunk in flight finishes, and partial output is always
//! discarded since a cancelled run is not reproducible.

use crate::distribution::GeneratingDistribution;
use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::montecarlo::{MonteCarloSimulator, SimulationConfig, SimulationRun};
use parking_lot::{Mutex, RwLock};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identifier of a submitted job.
pub type JobId = u64;

/// Lifecycle state of a simulation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JobStatus {
    /// Accepted, worker not yet started
    Requested,
    /// Worker is generating chunks
    Running,
    /// Finished; the result is available
    Completed,
    /// Finished with an error; the error is available
    Failed,
    /// Cancelled; partial output was discarded
    Cancelled,
}

impl JobStatus {
    /// Whether the job can still change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Requested => "requested",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

struct JobSlot {
    status: JobStatus,
    result: Option<SimulationRun>,
    error: Option<AnalyticsError>,
    seed: u64,
}

struct Job {
    slot: Mutex<JobSlot>,
    cancel: AtomicBool,
}

/// Registry and scheduler for asynchronous simulation jobs.
///
/// Each submitted job runs on its own worker thread; the registry holds
/// only the lifecycle slot, so concurrent submissions never share mutable
/// state beyond the map itself.
pub struct JobManager {
    jobs: Arc<RwLock<HashMap<JobId, Arc<Job>>>>,
    next_id: AtomicU64,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Submit a simulation for background execution.
    ///
    /// Validation failures are not raised here; they surface through
    /// `result` as a `Failed` job so the submit path never blocks.
    pub fn submit(
        &self,
        distribution: GeneratingDistribution,
        config: SimulationConfig,
    ) -> JobId {
        let job_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = Arc::new(Job {
            slot: Mutex::new(JobSlot {
                status: JobStatus::Requested,
                result: None,
                error: None,
                seed: config.seed,
            }),
            cancel: AtomicBool::new(false),
        });
        self.jobs.write().insert(job_id, job.clone());

        std::thread::spawn(move || {
            job.slot.lock().status = JobStatus::Running;
            log::debug!("job {} running (seed {})", job_id, config.seed);

            let outcome = MonteCarloSimulator::new().simulate_with_cancel(
                &distribution,
                &config,
                Some(&job.cancel),
            );

            let mut slot = job.slot.lock();
            match outcome {
                Ok(run) => {
                    if job.cancel.load(Ordering::SeqCst) {
                        // Cancel raced the final chunk: discard the output
                        slot.status = JobStatus::Cancelled;
                    } else {
                        slot.result = Some(run);
                        slot.status = JobStatus::Completed;
                    }
                }
                Err(AnalyticsError::Cancelled { .. }) => {
                    slot.status = JobStatus::Cancelled;
                }
                Err(e) => {
                    log::warn!("job {} failed (seed {}): {}", job_id, config.seed, e);
                    slot.error = Some(e);
                    slot.status = JobStatus::Failed;
                }
            }
        });

        job_id
    }

    /// Current lifecycle status of a job.
    pub fn status(&self, job_id: JobId) -> AnalyticsResult<JobStatus> {
        let job = self.lookup(job_id)?;
        let status = job.slot.lock().status;
        Ok(status)
    }

    /// The finished run of a completed job.
    ///
    /// Fails with [`AnalyticsError::JobNotComplete`] before completion,
    /// [`AnalyticsError::Cancelled`] for a cancelled job, and the stored
    /// error (including its seed and parameters) for a failed one.
    pub fn result(&self, job_id: JobId) -> AnalyticsResult<SimulationRun> {
        let job = self.lookup(job_id)?;
        let slot = job.slot.lock();
        match slot.status {
            JobStatus::Completed => Ok(slot
                .result
                .clone()
                .expect("completed job always stores its run")),
            JobStatus::Failed => Err(slot
                .error
                .clone()
                .expect("failed job always stores its error")),
            JobStatus::Cancelled => Err(AnalyticsError::Cancelled {
                operation: "monte_carlo_job".to_string(),
                seed: slot.seed,
            }),
            status @ (JobStatus::Requested | JobStatus::Running) => {
                Err(AnalyticsError::JobNotComplete {
                    job_id,
                    status: status.to_string(),
                })
            }
        }
    }

    /// Request cooperative cancellation. A no-op for terminal jobs.
    pub fn cancel(&self, job_id: JobId) -> AnalyticsResult<()> {
        let job = self.lookup(job_id)?;
        job.cancel.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Poll until the job reaches a terminal state or the timeout lapses.
    pub fn wait(&self, job_id: JobId, timeout: Duration) -> AnalyticsResult<JobStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.status(job_id)?;
            if status.is_terminal() {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(AnalyticsError::JobNotComplete {
                    job_id,
                    status: status.to_string(),
                });
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn lookup(&self, job_id: JobId) -> AnalyticsResult<Arc<Job>> {
        self.jobs
            .read()
            .get(&job_id)
            .cloned()
            .ok_or(AnalyticsError::JobNotFound { job_id })
    }
}
