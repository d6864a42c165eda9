/// Database connection pool and helpers for sto-grab.
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::errors::StoResult;
use crate::models::{JobRecord, JobStatus, LinkRecord, QueuedJob};

/// Create SQLite connection pool with WAL mode and busy timeout.
pub async fn create_pool(database_url: &str) -> StoResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(10))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("Connected to database: {}", database_url);
    Ok(pool)
}

/// Run migrations from the migrations directory.
pub async fn run_migrations(pool: &SqlitePool) -> StoResult<()> {
    sqlx::migrate!("../migrations").run(pool).await?;

    info!("Database migrations completed");
    Ok(())
}

// ====== LINKS ======

/// Remember a manifest link. Returns false if it was already stored.
pub async fn save_link(pool: &SqlitePool, url: &str, source_url: Option<&str>) -> StoResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO links (url, source_url)
        VALUES (?, ?)
        "#,
    )
    .bind(url)
    .bind(source_url)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// All stored links in the order they were found.
pub async fn list_links(pool: &SqlitePool) -> StoResult<Vec<LinkRecord>> {
    let links = sqlx::query_as::<_, LinkRecord>(
        r#"SELECT url, source_url, found_at FROM links ORDER BY rowid"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(links)
}

/// Forget a link (removed from the list by the user).
pub async fn delete_link(pool: &SqlitePool, url: &str) -> StoResult<()> {
    sqlx::query("DELETE FROM links WHERE url = ?")
        .bind(url)
        .execute(pool)
        .await?;

    Ok(())
}

// ====== JOBS ======

/// Record a queued download job.
pub async fn create_job(pool: &SqlitePool, job: &QueuedJob) -> StoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO jobs (id, url, output_path, status, progress)
        VALUES (?, ?, ?, ?, 0)
        "#,
    )
    .bind(&job.id)
    .bind(&job.url)
    .bind(job.output.display().to_string())
    .bind(JobStatus::Queued.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark job as running.
pub async fn start_job(pool: &SqlitePool, job_id: &str) -> StoResult<()> {
    sqlx::query(
        r#"
        UPDATE jobs SET status = ?, started_at = CURRENT_TIMESTAMP WHERE id = ?
        "#,
    )
    .bind(JobStatus::Running.as_str())
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Update job progress.
pub async fn update_job_progress(pool: &SqlitePool, job_id: &str, progress: i32) -> StoResult<()> {
    sqlx::query(
        r#"
        UPDATE jobs SET progress = ? WHERE id = ?
        "#,
    )
    .bind(progress)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark job as completed.
pub async fn complete_job(pool: &SqlitePool, job_id: &str) -> StoResult<()> {
    sqlx::query(
        r#"
        UPDATE jobs
        SET status = ?, progress = 100, finished_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(JobStatus::Done.as_str())
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark job as failed or cancelled.
pub async fn fail_job(
    pool: &SqlitePool,
    job_id: &str,
    status: JobStatus,
    error_msg: &str,
) -> StoResult<()> {
    sqlx::query(
        r#"
        UPDATE jobs
        SET status = ?, error_msg = ?, finished_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(error_msg)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent jobs first.
pub async fn recent_jobs(pool: &SqlitePool, limit: i64) -> StoResult<Vec<JobRecord>> {
    let jobs = sqlx::query_as::<_, JobRecord>(
        r#"
        SELECT * FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    async fn test_pool(dir: &tempfile::TempDir) -> SqlitePool {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn job(id: &str) -> QueuedJob {
        QueuedJob {
            id: id.to_string(),
            url: "https://cdn.example/master.m3u8".to_string(),
            index: 1,
            total: 1,
            output: PathBuf::from("/videos/video_1.mp4"),
            status: JobStatus::Queued,
            progress: 0,
            error_msg: None,
        }
    }

    #[tokio::test]
    async fn test_links_keep_order_and_dedupe() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;

        assert!(save_link(&pool, "https://b.example/x.m3u8", Some("https://s.to/a")).await.unwrap());
        assert!(save_link(&pool, "https://a.example/y.m3u8", None).await.unwrap());
        assert!(!save_link(&pool, "https://b.example/x.m3u8", None).await.unwrap());

        let links = list_links(&pool).await.unwrap();
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b.example/x.m3u8", "https://a.example/y.m3u8"]);
        assert_eq!(links[0].source_url.as_deref(), Some("https://s.to/a"));

        delete_link(&pool, "https://b.example/x.m3u8").await.unwrap();
        assert_eq!(list_links(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;

        create_job(&pool, &job("j1")).await.unwrap();
        start_job(&pool, "j1").await.unwrap();
        update_job_progress(&pool, "j1", 40).await.unwrap();

        let jobs = recent_jobs(&pool, 10).await.unwrap();
        assert_eq!(jobs[0].status, "running");
        assert_eq!(jobs[0].progress, 40);
        assert!(jobs[0].started_at.is_some());

        complete_job(&pool, "j1").await.unwrap();
        let jobs = recent_jobs(&pool, 10).await.unwrap();
        assert_eq!(jobs[0].status, "done");
        assert_eq!(jobs[0].progress, 100);
        assert_eq!(jobs[0].output_path, "/videos/video_1.mp4");
        assert!(jobs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_job() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;

        create_job(&pool, &job("j2")).await.unwrap();
        fail_job(&pool, "j2", JobStatus::Error, "HTTP Error 403").await.unwrap();

        let jobs = recent_jobs(&pool, 1).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, "error");
        assert_eq!(jobs[0].error_msg.as_deref(), Some("HTTP Error 403"));
    }
}
