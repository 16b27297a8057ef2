//! Jobs command - Background job management.
//!
//! - `work`: run the email worker
//! - `list`: show queue counts by status
//! - `clear`: drop failed jobs
//! - `cleanup`: delete expired refresh sessions once
//!
//! ```bash
//! cargo run -- jobs work
//! cargo run -- jobs cleanup
//! ```

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{Database, Persistence};
use crate::services::{AuthService, Authenticator};

/// Execute the jobs command
pub async fn execute(args: JobsArgs, config: Config) -> AppResult<()> {
    match args.action {
        JobsAction::Work => run_worker(&config).await,
        JobsAction::List => list_jobs(&config).await,
        JobsAction::Clear => clear_failed_jobs(&config).await,
        JobsAction::Cleanup => cleanup_sessions(config).await,
    }
}

/// Start the email worker on the apalis Postgres queue
async fn run_worker(config: &Config) -> AppResult<()> {
    use apalis::prelude::*;

    use crate::jobs::{email_job_handler, PgEmailQueue};

    tracing::info!("Connecting to job queue...");
    let queue = PgEmailQueue::connect(&config.database_url).await?;

    tracing::info!("Job worker started. Press Ctrl+C to stop.");

    let worker = WorkerBuilder::new("email-worker")
        .backend(queue.storage())
        .build_fn(email_job_handler);

    let monitor = Monitor::new().register(worker);

    tokio::select! {
        result = monitor.run() => {
            if let Err(e) = result {
                tracing::error!("Worker error: {}", e);
                return Err(AppError::internal(format!("Worker failed: {}", e)));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping worker...");
        }
    }

    tracing::info!("Job worker stopped.");
    Ok(())
}

async fn connect(config: &Config) -> AppResult<DatabaseConnection> {
    tracing::info!("Connecting to database...");
    let db = Database::connect_without_migrations(config).await?;
    Ok(db.get_connection())
}

/// Whether `jobs work` has created the apalis schema yet
async fn queue_initialized(db: &DatabaseConnection) -> AppResult<bool> {
    let row = db
        .query_one(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = 'apalis') as exists",
        ))
        .await?;

    Ok(row
        .and_then(|r| r.try_get::<bool>("", "exists").ok())
        .unwrap_or(false))
}

/// List queued email jobs by status
async fn list_jobs(config: &Config) -> AppResult<()> {
    let db = connect(config).await?;

    if !queue_initialized(&db).await? {
        println!("\n=== Job Queue Status ===");
        println!("Job queue not initialized.");
        println!("Run 'jobs work' or 'serve' first to create the queue tables.");
        println!("========================\n");
        return Ok(());
    }

    let rows = db
        .query_all(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT status::text as status, COUNT(*)::bigint as count FROM apalis.jobs GROUP BY status",
        ))
        .await?;

    let mut pending = 0i64;
    let mut running = 0i64;
    let mut failed = 0i64;
    let mut done = 0i64;

    for row in rows {
        if let (Ok(status), Ok(count)) = (
            row.try_get::<String>("", "status"),
            row.try_get::<i64>("", "count"),
        ) {
            match status.as_str() {
                "Pending" => pending = count,
                "Running" => running = count,
                "Failed" => failed = count,
                "Done" => done = count,
                _ => {}
            }
        }
    }

    println!("\n=== Job Queue Status ===");
    println!("Pending:  {}", pending);
    println!("Running:  {}", running);
    println!("Failed:   {}", failed);
    println!("Done:     {}", done);
    println!("========================\n");

    Ok(())
}

/// Clear failed jobs from the queue
async fn clear_failed_jobs(config: &Config) -> AppResult<()> {
    let db = connect(config).await?;

    if !queue_initialized(&db).await? {
        println!("Job queue not initialized. Nothing to clear.");
        return Ok(());
    }

    let result = db
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            "DELETE FROM apalis.jobs WHERE status = 'Failed'",
        ))
        .await?;

    println!("Cleared {} failed job(s) from the queue.", result.rows_affected());
    Ok(())
}

/// One-off purge of expired refresh sessions
async fn cleanup_sessions(config: Config) -> AppResult<()> {
    let db = connect(&config).await?;
    let auth = Authenticator::new(Arc::new(Persistence::new(db)), config);

    let purged = auth.purge_expired_sessions().await?;
    println!("Deleted {} expired session(s).", purged);
    Ok(())
}
