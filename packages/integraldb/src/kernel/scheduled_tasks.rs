//! Periodic pipeline runs using tokio-cron-scheduler.
//!
//! ```text
//! Scheduler (every UPDATE_INTERVAL_SECS)
//!     │
//!     └─► run_once()  ingest → extract → embed
//! ```
//!
//! A run that is still going when the next tick fires makes that tick a no-op.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use super::{BaseDrive, BaseMailbox, PipelineDeps};
use crate::domains::pipeline::run_once;

/// Remote sources handed to every scheduled run.
#[derive(Clone, Default)]
pub struct PipelineSources {
    pub mailbox: Option<Arc<dyn BaseMailbox>>,
    pub drive: Option<Arc<dyn BaseDrive>>,
}

/// Start the periodic pipeline job
pub async fn start_scheduler(
    deps: PipelineDeps,
    sources: PipelineSources,
    interval: Duration,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let running = Arc::new(Mutex::new(()));

    let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let deps = deps.clone();
        let sources = sources.clone();
        let running = running.clone();
        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!("Previous pipeline run still in progress, skipping this tick");
                return;
            };
            run_scheduled(&deps, &sources).await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(
        interval_secs = interval.as_secs(),
        "Scheduled pipeline runs started"
    );
    Ok(scheduler)
}

/// One run; failures are logged, never propagated, so the schedule keeps going.
pub async fn run_scheduled(deps: &PipelineDeps, sources: &PipelineSources) {
    tracing::info!("Running scheduled pipeline");
    let result = run_once(deps, sources.mailbox.as_deref(), sources.drive.as_deref()).await;
    match result {
        Ok(report) => tracing::info!(
            extracted = report.extract.extracted,
            embedded = report.embed.embedded,
            "Scheduled pipeline run complete"
        ),
        Err(e) => tracing::error!(error = %e, kind = e.kind(), "Scheduled pipeline run failed"),
    }
}
