//! Background job scheduler.
//!
//! Registers the recurring scoring batch and the daily brief. Both need the
//! oracle, so neither is registered when no API key is configured.

use std::sync::Arc;

use chrono::Utc;
use kantoi_core::AppConfig;
use kantoi_db::PgStore;
use kantoi_sentiment::{BatchOptions, GeminiClient, GeminiConfig, ImpactScorer};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    store: PgStore,
    scorer: Arc<ImpactScorer>,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match oracle_client(&config) {
        Some(oracle) => {
            register_score_job(
                &scheduler,
                store.clone(),
                Arc::clone(&oracle),
                scorer,
                &config,
            )
            .await?;
            register_brief_job(&scheduler, store, oracle, &config).await?;
        }
        None => {
            tracing::warn!("scheduler: GEMINI_API_KEY not set; scoring and brief jobs disabled");
        }
    }

    scheduler.start().await?;
    Ok(scheduler)
}

fn oracle_client(config: &AppConfig) -> Option<Arc<GeminiClient>> {
    let gemini = GeminiConfig::from_app_config(config)?;
    match GeminiClient::new(&gemini) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to build oracle client");
            None
        }
    }
}

/// Register the recurring scoring batch (`KANTOI_SCORE_CRON`).
///
/// A tick that fires while the previous batch is still running is skipped.
async fn register_score_job(
    scheduler: &JobScheduler,
    store: PgStore,
    oracle: Arc<GeminiClient>,
    scorer: Arc<ImpactScorer>,
    config: &AppConfig,
) -> Result<(), JobSchedulerError> {
    let cron = config.score_cron.clone();
    let options = BatchOptions::from_app_config(config);
    let running = Arc::new(Mutex::new(()));

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let store = store.clone();
        let oracle = Arc::clone(&oracle);
        let scorer = Arc::clone(&scorer);
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!("scheduler: previous scoring batch still running; skipping tick");
                return;
            };
            tracing::info!("scheduler: starting scoring batch");
            match kantoi_sentiment::run_scoring_batch(
                &store,
                oracle.as_ref(),
                &scorer,
                options,
                Utc::now(),
            )
            .await
            {
                Ok(report) => tracing::info!(
                    scored = report.scored,
                    failed = report.failed,
                    "scheduler: scoring batch complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: scoring batch aborted"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered scoring job");
    Ok(())
}

/// Register the daily brief (`KANTOI_BRIEF_CRON`).
async fn register_brief_job(
    scheduler: &JobScheduler,
    store: PgStore,
    oracle: Arc<GeminiClient>,
    config: &AppConfig,
) -> Result<(), JobSchedulerError> {
    let cron = config.brief_cron.clone();
    let evidence_size = config.brief_evidence_size;

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let store = store.clone();
        let oracle = Arc::clone(&oracle);

        Box::pin(async move {
            tracing::info!("scheduler: starting daily brief");
            match kantoi_sentiment::generate_brief(
                &store,
                oracle.as_ref(),
                evidence_size,
                Utc::now(),
            )
            .await
            {
                Ok(Some(brief)) => {
                    tracing::info!(headline = %brief.headline, "scheduler: brief stored");
                }
                Ok(None) => tracing::info!("scheduler: no signals; brief skipped"),
                Err(e) => tracing::error!(error = %e, "scheduler: brief generation failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered brief job");
    Ok(())
}
