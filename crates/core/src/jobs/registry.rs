//! In-memory job registry.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::error::RegistryError;
use super::types::{
    ConversionJob, JobId, JobStatus, ProgressSnapshot, PROGRESS_COMPLETE, PROGRESS_FAILED,
};

/// Concurrency-safe store of conversion jobs.
///
/// Every operation takes the lock once, so reads never observe a partially
/// applied update. Progress only moves forward; the failure sentinel is the
/// one backwards transition and, like completion, is final.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, ConversionJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, ConversionJob>> {
        // A panic while holding the lock cannot leave a job half-written
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new job. Its progress starts at 0.
    pub fn create(&self, mut job: ConversionJob) -> Result<(), RegistryError> {
        let mut jobs = self.lock();
        if jobs.contains_key(&job.id) {
            return Err(RegistryError::AlreadyExists(job.id));
        }
        job.progress = 0;
        jobs.insert(job.id, job);
        Ok(())
    }

    /// Current progress of a job, or `None` if it is unknown.
    pub fn get(&self, id: &JobId) -> Option<ProgressSnapshot> {
        self.lock().get(id).map(ConversionJob::snapshot)
    }

    /// Full copy of a job's state.
    pub fn job(&self, id: &JobId) -> Option<ConversionJob> {
        self.lock().get(id).cloned()
    }

    /// Applies a progress update and returns the resulting progress.
    ///
    /// - [`PROGRESS_FAILED`] always applies unless the job is already terminal.
    /// - Other values are clamped to 0..=100 and ignored if lower than the current value.
    /// - Terminal jobs never change.
    ///
    /// Returns `None` if the job is unknown.
    pub fn set_progress(&self, id: &JobId, percent: i32) -> Option<i32> {
        let mut jobs = self.lock();
        let job = jobs.get_mut(id)?;

        if job.status().is_terminal() {
            return Some(job.progress);
        }

        if percent == PROGRESS_FAILED {
            job.progress = PROGRESS_FAILED;
            job.finished_at = Some(Utc::now());
            return Some(job.progress);
        }

        let percent = percent.clamp(0, PROGRESS_COMPLETE);
        if percent > job.progress {
            job.progress = percent;
            if percent == PROGRESS_COMPLETE {
                job.finished_at = Some(Utc::now());
            }
        }

        Some(job.progress)
    }

    /// Records where a succeeded job's artifact was published.
    pub fn mark_published(&self, id: &JobId, path: PathBuf) -> Result<(), RegistryError> {
        let mut jobs = self.lock();
        let job = jobs.get_mut(id).ok_or(RegistryError::NotFound(*id))?;
        if job.status() != JobStatus::Succeeded {
            return Err(RegistryError::NotSucceeded(*id));
        }
        job.output_path_published = Some(path);
        Ok(())
    }

    /// Removes a job. Returns whether it was present.
    pub fn delete(&self, id: &JobId) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Ids of all jobs currently held.
    pub fn ids(&self) -> Vec<JobId> {
        self.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of jobs in each status.
    pub fn count_by_status(&self) -> HashMap<JobStatus, usize> {
        let mut counts = HashMap::new();
        for job in self.lock().values() {
            *counts.entry(job.status()).or_insert(0) += 1;
        }
        counts
    }

    /// Removes jobs nobody is going to consume.
    ///
    /// A job is stale when it has been terminal for longer than
    /// `unobserved_ttl`, or when it is older than `max_age` whatever its state.
    pub fn purge_stale(
        &self,
        now: DateTime<Utc>,
        unobserved_ttl: Duration,
        max_age: Duration,
    ) -> Vec<JobId> {
        let elapsed_since = |t: DateTime<Utc>| (now - t).to_std().unwrap_or_default();

        let mut jobs = self.lock();
        let stale: Vec<JobId> = jobs
            .values()
            .filter(|job| {
                let expired_terminal = job
                    .finished_at
                    .is_some_and(|finished| elapsed_since(finished) > unobserved_ttl);
                expired_terminal || elapsed_since(job.created_at) > max_age
            })
            .map(|job| job.id)
            .collect();

        for id in &stale {
            jobs.remove(id);
        }
        stale
    }
}
