/// Carries out the effects produced by the UI state: sniffing, persistence and the
/// sequential download runner.
use std::path::PathBuf;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sto_downloader::YtDlp;
use sto_shared::config::AppConfig;
use sto_shared::db;
use sto_shared::download_queue::DownloadQueue;
use sto_shared::errors::DownloadError;
use sto_shared::events::{self, AppEvent, EventSender, EventSenderExt};
use sto_shared::models::{JobStatus, QueuedJob};
use sto_sniffer::Sniffer;

use crate::link_detector::DetectedLink;
use crate::state::Effect;

/// How long shutdown waits for the download runner to stop yt-dlp.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct Controller {
    config: AppConfig,
    sniffer: Sniffer,
    queue: DownloadQueue,
    db_pool: Option<SqlitePool>,
    events: EventSender,
    shutdown: CancellationToken,
    batch_cancel: CancellationToken,
    runner: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(config: AppConfig, db_pool: Option<SqlitePool>, events: EventSender) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            sniffer: Sniffer::new(config.browser.clone()),
            config,
            queue: DownloadQueue::new(),
            db_pool,
            events,
            batch_cancel: shutdown.child_token(),
            shutdown,
            runner: None,
        }
    }

    /// Links saved by earlier sessions, oldest first.
    pub async fn saved_links(&self) -> Vec<String> {
        let Some(pool) = &self.db_pool else {
            return Vec::new();
        };
        match db::list_links(pool).await {
            Ok(links) => links.into_iter().map(|l| l.url).collect(),
            Err(e) => {
                warn!("Could not load saved links: {}", e);
                Vec::new()
            }
        }
    }

    pub fn handle(&mut self, effect: Effect) {
        match effect {
            Effect::Extract(link) => self.extract(link),
            Effect::PersistLinks { source_url, links } => self.persist_links(source_url, links),
            Effect::DeleteLink(url) => self.delete_link(url),
            Effect::StartDownloads { urls, folder } => self.start_downloads(urls, folder),
            Effect::CancelDownloads => {
                info!("Download batch cancelled by user");
                self.batch_cancel.cancel();
            }
            Effect::Quit => info!("Quit requested"),
        }
    }

    fn extract(&self, link: DetectedLink) {
        let Some(url) = link.url().map(str::to_string) else {
            return;
        };
        info!("Extracting {} from {}", link.describe(), url);
        let sniffer = self.sniffer.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let links = sniffer.extract(&url, &events).await;
            info!("Extraction for {} yielded {} link(s)", url, links.len());
        });
    }

    fn persist_links(&self, source_url: Option<String>, links: Vec<String>) {
        let Some(pool) = self.db_pool.clone() else {
            return;
        };
        tokio::spawn(async move {
            for link in &links {
                if let Err(e) = db::save_link(&pool, link, source_url.as_deref()).await {
                    warn!("Could not save link {}: {}", link, e);
                }
            }
        });
    }

    fn delete_link(&self, url: String) {
        let Some(pool) = self.db_pool.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = db::delete_link(&pool, &url).await {
                warn!("Could not delete link {}: {}", url, e);
            }
        });
    }

    fn start_downloads(&mut self, urls: Vec<String>, folder: PathBuf) {
        if self.runner.as_ref().is_some_and(|r| !r.is_finished()) {
            warn!("Download batch already running, ignoring new batch");
            return;
        }

        let ytdlp = match YtDlp::locate(&self.config.download) {
            Ok(ytdlp) => ytdlp,
            Err(e) => {
                error!("Cannot start downloads: {}", e);
                self.events.emit(AppEvent::DownloadsAborted {
                    reason: format!("❌ Download error: {e}"),
                });
                return;
            }
        };

        self.batch_cancel = self.shutdown.child_token();
        let runner = QueueRunner {
            ytdlp,
            queue: self.queue.clone(),
            db_pool: self.db_pool.clone(),
            events: self.events.clone(),
            cancel: self.batch_cancel.clone(),
        };
        let events = self.events.clone();
        self.runner = Some(tokio::spawn(async move {
            // A panicking batch must still release the UI
            if let Err(e) = tokio::spawn(runner.run(urls, folder)).await {
                error!("Download runner stopped: {}", e);
                events.emit(AppEvent::DownloadsAborted {
                    reason: "❌ Download error: download runner stopped unexpectedly".to_string(),
                });
            }
        }));
    }

    /// Cancel running work and wait briefly for yt-dlp to be killed.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        if let Some(runner) = self.runner.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, runner).await.is_err() {
                warn!("Download runner did not stop within {:?}", SHUTDOWN_GRACE);
            }
        }
        info!("Controller stopped");
    }
}

/// Drives one batch through the queue, one yt-dlp process at a time.
struct QueueRunner {
    ytdlp: YtDlp,
    queue: DownloadQueue,
    db_pool: Option<SqlitePool>,
    events: EventSender,
    cancel: CancellationToken,
}

impl QueueRunner {
    async fn run(self, urls: Vec<String>, folder: PathBuf) {
        self.queue.load(&urls, &folder).await;
        if let Some(pool) = &self.db_pool {
            for job in self.queue.jobs().await {
                if let Err(e) = db::create_job(pool, &job).await {
                    warn!("Could not record job {}: {}", job.id, e);
                }
            }
        }

        while let Some(job) = self.queue.next_job().await {
            self.events.emit(AppEvent::DownloadStarted {
                index: job.index,
                total: job.total,
            });
            if let Some(pool) = &self.db_pool {
                if let Err(e) = db::start_job(pool, &job.id).await {
                    warn!("Could not mark job {} started: {}", job.id, e);
                }
            }

            let ok = match self.run_job(&job).await {
                Ok(()) => {
                    self.queue.complete(&job.id).await;
                    if let Some(pool) = &self.db_pool {
                        if let Err(e) = db::complete_job(pool, &job.id).await {
                            warn!("Could not mark job {} done: {}", job.id, e);
                        }
                    }
                    true
                }
                Err(e) if e.is_cancelled() => {
                    self.abort().await;
                    return;
                }
                Err(e) => {
                    error!("Job {} ({}) failed: {}", job.id, job.url, e);
                    self.events.status(format!("❌ Download error: {e}"));
                    self.queue.fail(&job.id, e.to_string()).await;
                    self.record_failure(&job.id, JobStatus::Error, &e.to_string()).await;
                    false
                }
            };
            self.events.emit(AppEvent::DownloadFinished { index: job.index, ok });
        }

        info!("Download batch finished: {:?}", self.queue.stats().await);
        self.events.emit(AppEvent::AllDownloadsDone);
    }

    /// Run yt-dlp for one job, mirroring its progress into the queue and the database.
    async fn run_job(&self, job: &QueuedJob) -> Result<(), DownloadError> {
        let (tx, mut rx) = events::channel();
        let download = async move {
            let result = self.ytdlp.download(&job.url, &job.output, &tx, &self.cancel).await;
            drop(tx);
            result
        };
        let forward = async {
            let mut last_saved: u8 = 0;
            while let Some(event) = rx.recv().await {
                if let AppEvent::DownloadProgress(percent) = event {
                    self.queue.update_progress(&job.id, percent).await;
                    // Throttle DB writes to 10% steps
                    if percent >= last_saved.saturating_add(10) || (percent == 100 && last_saved < 100) {
                        last_saved = percent;
                        self.save_progress(&job.id, percent).await;
                    }
                }
                self.events.emit(event);
            }
        };
        let (result, ()) = tokio::join!(download, forward);
        result
    }

    async fn save_progress(&self, job_id: &str, percent: u8) {
        if let Some(pool) = &self.db_pool {
            if let Err(e) = db::update_job_progress(pool, job_id, i32::from(percent)).await {
                warn!("Could not save progress of job {}: {}", job_id, e);
            }
        }
    }

    async fn abort(&self) {
        let cancelled = self.queue.cancel_all().await;
        info!("Download batch cancelled, {} job(s) dropped", cancelled);
        for job in self.queue.jobs().await {
            if job.status == JobStatus::Cancelled {
                self.record_failure(&job.id, JobStatus::Cancelled, "cancelled").await;
            }
        }
        self.events.emit(AppEvent::DownloadsAborted {
            reason: "⏹ Downloads cancelled.".to_string(),
        });
    }

    async fn record_failure(&self, job_id: &str, status: JobStatus, msg: &str) {
        if let Some(pool) = &self.db_pool {
            if let Err(e) = db::fail_job(pool, job_id, status, msg).await {
                warn!("Could not record failure of job {}: {}", job_id, e);
            }
        }
    }
}
