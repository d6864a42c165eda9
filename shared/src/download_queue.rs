/// Sequential FIFO queue of download jobs.
///
/// Exactly one job runs at a time. The cursor advances when the running job completes or
/// fails; there is no retry.
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{output_file_name, JobStatus, QueuedJob};

#[derive(Debug, Default)]
struct QueueInner {
    jobs: Vec<QueuedJob>,
    cursor: usize,
}

/// Shared handle to the download queue. Cloning shares the same queue.
#[derive(Debug, Clone, Default)]
pub struct DownloadQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `urls` into a fresh batch saving into `folder`. Resets the cursor.
    pub async fn load(&self, urls: &[String], folder: &Path) -> usize {
        let total = urls.len();
        let jobs = urls
            .iter()
            .enumerate()
            .map(|(i, url)| QueuedJob {
                id: Uuid::new_v4().to_string(),
                url: url.clone(),
                index: i + 1,
                total,
                output: folder.join(output_file_name(i + 1)),
                status: JobStatus::Queued,
                progress: 0,
                error_msg: None,
            })
            .collect();

        let mut inner = self.inner.lock().await;
        inner.jobs = jobs;
        inner.cursor = 0;
        info!("Download queue loaded with {} job(s) into {:?}", total, folder);
        total
    }

    /// Start the job at the cursor. Returns `None` once the batch is exhausted.
    ///
    /// Calling this while a job is still running returns that job again rather than
    /// starting a second one.
    pub async fn next_job(&self) -> Option<QueuedJob> {
        let mut inner = self.inner.lock().await;
        let cursor = inner.cursor;
        let job = inner.jobs.get_mut(cursor)?;
        if job.status == JobStatus::Queued {
            job.status = JobStatus::Running;
            info!("Job {} ({} of {}) running", job.id, job.index, job.total);
        }
        Some(job.clone())
    }

    /// Update progress for the running job.
    pub async fn update_progress(&self, job_id: &str, percent: u8) {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.iter_mut().find(|j| j.id == job_id) {
            job.progress = percent.min(100);
        }
    }

    /// Mark the running job done and advance.
    pub async fn complete(&self, job_id: &str) {
        self.finish(job_id, JobStatus::Done, None).await;
    }

    /// Mark the running job failed and advance.
    pub async fn fail(&self, job_id: &str, error_msg: impl Into<String>) {
        self.finish(job_id, JobStatus::Error, Some(error_msg.into())).await;
    }

    async fn finish(&self, job_id: &str, status: JobStatus, error_msg: Option<String>) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        match inner.jobs.get_mut(inner.cursor) {
            Some(job) if job.id == job_id && job.status == JobStatus::Running => {
                job.status = status;
                if status == JobStatus::Done {
                    job.progress = 100;
                }
                job.error_msg = error_msg;
                inner.cursor += 1;
                info!("Job {} finished as {}", job_id, status);
            }
            _ => warn!("Job {} is not the running job, ignoring {}", job_id, status),
        }
    }

    /// Cancel every job that has not finished and move the cursor past the end.
    pub async fn cancel_all(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let mut cancelled = 0;
        for job in inner.jobs.iter_mut().filter(|j| !j.status.is_finished()) {
            job.status = JobStatus::Cancelled;
            cancelled += 1;
        }
        inner.cursor = inner.jobs.len();
        if cancelled > 0 {
            info!("Cancelled {} queued job(s)", cancelled);
        }
        cancelled
    }

    /// Snapshot of every job in the current batch.
    pub async fn jobs(&self) -> Vec<QueuedJob> {
        self.inner.lock().await.jobs.clone()
    }

    pub async fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().await;
        let count = |status: JobStatus| inner.jobs.iter().filter(|j| j.status == status).count();
        QueueStats {
            total: inner.jobs.len(),
            running: count(JobStatus::Running),
            queued: count(JobStatus::Queued),
            done: count(JobStatus::Done),
            failed: count(JobStatus::Error),
            cancelled: count(JobStatus::Cancelled),
        }
    }
}

/// Queue statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub running: usize,
    pub queued: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
}
