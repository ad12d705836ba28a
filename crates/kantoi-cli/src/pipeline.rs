//! Scoring and brief command handlers.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use kantoi_core::{AppConfig, Brief, SignalStore};
use kantoi_db::PgStore;
use kantoi_sentiment::{
    BatchOptions, GeminiClient, GeminiConfig, ImpactScorer, RecordOutcome, SentimentError,
};

fn oracle_from_config(config: &AppConfig) -> anyhow::Result<GeminiClient> {
    let gemini = GeminiConfig::from_app_config(config)
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is required for this command"))?;
    Ok(GeminiClient::new(&gemini)?)
}

fn scorer_from_config(config: &AppConfig) -> anyhow::Result<ImpactScorer> {
    let weights = kantoi_core::load_weights(&config.weights_path)?;
    tracing::info!(
        version = weights.version,
        fingerprint = %weights.fingerprint(),
        "weight table loaded"
    );
    Ok(ImpactScorer::new(weights))
}

/// Score pending source records, or preview the classifications with `dry_run`.
///
/// # Errors
///
/// Returns an error if the weights file or oracle key is missing, or if the
/// store fails. Per-record oracle failures are counted, not returned.
pub(crate) async fn run_score(
    store: &PgStore,
    config: &AppConfig,
    limit: Option<usize>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let scorer = scorer_from_config(config)?;
    let oracle = oracle_from_config(config)?;
    let mut options = BatchOptions::from_app_config(config);
    if let Some(limit) = limit {
        options.limit = limit;
    }

    if dry_run {
        return run_score_dry(store, &oracle, &scorer, options).await;
    }

    let report =
        kantoi_sentiment::run_scoring_batch(store, &oracle, &scorer, options, Utc::now()).await?;
    println!(
        "listed {} | scored {} | skipped {} | retrying {} | failed {} | label fallbacks {}",
        report.listed,
        report.scored,
        report.skipped,
        report.retrying,
        report.failed,
        report.fallbacks
    );
    Ok(())
}

async fn run_score_dry(
    store: &PgStore,
    oracle: &GeminiClient,
    scorer: &ImpactScorer,
    options: BatchOptions,
) -> anyhow::Result<()> {
    let records = store.list_unprocessed(options.limit).await?;
    if records.is_empty() {
        println!("dry-run: no pending source records");
        return Ok(());
    }

    let now = Utc::now();
    let outcomes: Vec<(String, Result<RecordOutcome, SentimentError>)> = stream::iter(&records)
        .map(|record| async move {
            let outcome = kantoi_sentiment::classify_record(oracle, scorer, record, now).await;
            (record.id.clone(), outcome)
        })
        .buffered(options.max_concurrent.max(1))
        .collect()
        .await;

    println!(
        "dry-run: classified {} record(s), nothing written",
        outcomes.len()
    );
    println!(
        "{:<22}{:<10}{:<24}{:<18}TRIGGER",
        "ID", "IMPACT", "ARCHETYPE", "TOPIC"
    );
    for (id, outcome) in outcomes {
        match outcome {
            Ok(RecordOutcome::Scored(scored)) => {
                let s = &scored.signal;
                println!(
                    "{:<22}{:<10.2}{:<24}{:<18}{}",
                    id,
                    s.impact_score,
                    s.archetype.as_str(),
                    s.topic.as_str(),
                    s.specific_trigger
                );
            }
            Ok(RecordOutcome::Skipped) => println!("{id:<22}skipped (caption too short)"),
            Err(e) => println!("{id:<22}error: {e}"),
        }
    }
    Ok(())
}

/// Generate and store a brief for the 24 hours ending now.
///
/// # Errors
///
/// Returns an error if the oracle key is missing, the store fails, or the
/// oracle reply cannot be repaired.
pub(crate) async fn run_brief_generate(store: &PgStore, config: &AppConfig) -> anyhow::Result<()> {
    let oracle = oracle_from_config(config)?;
    match kantoi_sentiment::generate_brief(store, &oracle, config.brief_evidence_size, Utc::now())
        .await?
    {
        Some(brief) => print_brief(&brief),
        None => println!("no signals in the last 24 hours; brief not generated"),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the store fails.
pub(crate) async fn run_brief_show(store: &PgStore) -> anyhow::Result<()> {
    match kantoi_sentiment::get_latest_brief(store).await? {
        Some(brief) => print_brief(&brief),
        None => println!("no brief stored yet; run `brief generate` first"),
    }
    Ok(())
}

fn print_brief(brief: &Brief) {
    println!("{}", crate::report::render_brief(brief));
}
