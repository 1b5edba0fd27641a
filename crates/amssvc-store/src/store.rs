//! Job repository with queue semantics layered on keyed storage.
//!
//! A single lock guards the whole map. Readers get clones, never references
//! into the map, so no caller can observe a partially applied mutation.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use amssvc_models::{Job, JobId, JobStatus, StatusUpdate};

use crate::error::{StoreError, StoreResult};

/// Filter for [`JobStore::find_all`]. The default matches every job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
}

impl JobFilter {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
        }
    }

    fn matches(&self, job: &Job) -> bool {
        self.status.map_or(true, |status| job.status == status)
    }
}

/// Volatile, concurrency-safe job store.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all jobs matching `filter`, oldest first.
    pub async fn find_all(&self, filter: &JobFilter) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs.values().filter(|j| filter.matches(j)).cloned().collect();
        matching.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        matching
    }

    pub async fn find_by_id(&self, id: &JobId) -> StoreResult<Job> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Insert a job, or fully replace the stored copy of the same job.
    ///
    /// A different job (different creation time) already holding the id is a
    /// conflict. Returns the stored copy with `modified_at` stamped.
    pub async fn save(&self, mut job: Job) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;

        if let Some(existing) = jobs.get(&job.id) {
            if existing.created_at != job.created_at {
                return Err(StoreError::conflict(format!(
                    "job with id {} already exists",
                    job.id
                )));
            }
        }

        job.touch();
        jobs.insert(job.id.clone(), job.clone());
        debug!(job_id = %job.id, status = %job.status, "Saved job");
        Ok(job)
    }

    pub async fn delete_by_id(&self, id: &JobId) -> StoreResult<()> {
        match self.jobs.write().await.remove(id) {
            Some(_) => {
                debug!(job_id = %id, "Deleted job");
                Ok(())
            }
            None => Err(not_found(id)),
        }
    }

    /// Claim the oldest dispatchable job.
    ///
    /// Selection and the transition to `running` happen under one write lock,
    /// so concurrent callers never receive the same job. An empty queue is
    /// reported as `NotFound` and leaves the store untouched.
    pub async fn get_next(&self) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;

        let next_id = jobs
            .values()
            .filter(|j| j.status.is_dispatchable())
            .min_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
            .map(|j| j.id.clone())
            .ok_or_else(|| StoreError::not_found("no dispatchable job in queue"))?;

        let job = jobs
            .get_mut(&next_id)
            .ok_or_else(|| not_found(&next_id))?;
        job.start();
        Ok(job.clone())
    }

    pub async fn set_status(&self, id: &JobId, update: &StatusUpdate) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or_else(|| not_found(id))?;
        job.apply(update);
        debug!(job_id = %id, status = %job.status, "Updated job status");
        Ok(job.clone())
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

fn not_found(id: &JobId) -> StoreError {
    StoreError::not_found(format!("job with id {} does not exist", id))
}
