use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_retry::strategy::jitter;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::models::RunSummary;
use crate::orchestrator::EngineContext;

/// What a scheduled check tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Completed(RunSummary),
    /// A previous run was still in progress.
    Skipped,
    Failed(String),
}

/// Drives periodic watch runs and URL list reloads for one engine.
pub struct WatchScheduler {
    scheduler: JobScheduler,
    engine: Arc<EngineContext>,
    config: SchedulerConfig,
    jobs: Vec<Uuid>,
}

impl WatchScheduler {
    pub async fn new(engine: Arc<EngineContext>) -> crate::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        let config = engine.config().scheduler.clone();

        Ok(Self {
            scheduler,
            engine,
            config,
            jobs: Vec::new(),
        })
    }

    pub async fn start(&mut self) -> crate::Result<()> {
        let check = self.check_job()?;
        let reload = self.reload_job()?;
        self.jobs.push(self.scheduler.add(check).await?);
        self.jobs.push(self.scheduler.add(reload).await?);

        self.scheduler.start().await?;
        tracing::info!(
            "Watch scheduler started: check every {}s (+{}s jitter), reload every {}s (+{}s jitter)",
            self.config.check_interval_secs,
            self.config.check_jitter_secs,
            self.config.reload_interval_secs,
            self.config.reload_jitter_secs
        );
        Ok(())
    }

    pub async fn shutdown(&mut self) -> crate::Result<()> {
        for job in self.jobs.drain(..) {
            if let Err(e) = self.scheduler.remove(&job).await {
                tracing::debug!("Failed to remove job {}: {:?}", job, e);
            }
        }
        self.scheduler.shutdown().await?;
        tracing::info!("Watch scheduler shutdown");
        Ok(())
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    fn check_job(&self) -> crate::Result<Job> {
        let engine = Arc::clone(&self.engine);
        let spread = Duration::from_secs(self.config.check_jitter_secs);
        let job = Job::new_repeated_async(
            Duration::from_secs(self.config.check_interval_secs),
            move |_uuid, _lock| {
                let engine = Arc::clone(&engine);
                Box::pin(async move {
                    tokio::time::sleep(jitter(spread)).await;
                    check_tick(&engine).await;
                })
            },
        )?;
        Ok(job)
    }

    fn reload_job(&self) -> crate::Result<Job> {
        let engine = Arc::clone(&self.engine);
        let spread = Duration::from_secs(self.config.reload_jitter_secs);
        let job = Job::new_repeated_async(
            Duration::from_secs(self.config.reload_interval_secs),
            move |_uuid, _lock| {
                let engine = Arc::clone(&engine);
                Box::pin(async move {
                    tokio::time::sleep(jitter(spread)).await;
                    // Failures are already logged and announced by the engine.
                    let _ = engine.reload_urls().await;
                })
            },
        )?;
        Ok(job)
    }
}

/// First URL load and run before the schedule starts. Neither failure stops the service;
/// a failed load leaves the list empty until the next reload tick.
pub async fn startup(engine: &EngineContext) -> TickOutcome {
    if let Err(e) = engine.reload_urls().await {
        tracing::error!("Initial URL load failed, starting with an empty list: {}", e);
    }
    match engine.run_once().await {
        Ok(summary) => TickOutcome::Completed(summary),
        Err(e) => {
            tracing::error!("Initial run failed: {}", e);
            TickOutcome::Failed(e.to_string())
        }
    }
}

/// One scheduled run; skipped when the previous one has not finished.
pub async fn check_tick(engine: &EngineContext) -> TickOutcome {
    match engine.try_run_once().await {
        None => {
            tracing::warn!("Previous run still in progress; skipping this tick");
            TickOutcome::Skipped
        }
        Some(Ok(summary)) => TickOutcome::Completed(summary),
        Some(Err(e)) => {
            tracing::error!("Scheduled run failed: {}", e);
            TickOutcome::Failed(e.to_string())
        }
    }
}
