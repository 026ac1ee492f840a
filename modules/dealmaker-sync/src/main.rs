use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use apify_client::ApifyClient;
use dealmaker_common::{Config, RecordQuery};
use dealmaker_sync::classifier;
use dealmaker_sync::enrichment::ApifyEnricher;
use dealmaker_sync::quota::RateTracker;
use dealmaker_sync::repair::Repair;
use dealmaker_sync::sources::RecordSource;
use dealmaker_sync::stage::{MoveMode, StageMover};
use dealmaker_sync::workflow::{RunMode, Workflow, WorkflowSettings};
use hubspot_client::{HubSpotClient, ObjectType};

#[derive(Parser)]
#[command(
    name = "dealmaker",
    about = "Turn LinkedIn profiles mentioned in HubSpot deals into contacts"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Process deals waiting in the source stage (default)
    Run {
        /// Stop after checking existing contacts; no enrichment, no writes
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect or adjust the weekly processing quota
    Quota {
        #[command(subcommand)]
        action: Option<QuotaAction>,
    },
    /// Move tagged deals between pipeline stages
    MoveStage {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Move at most this many deals
        #[arg(long)]
        limit: Option<usize>,
        /// Apply the move; without this only a preview is printed
        #[arg(long)]
        confirm: bool,
    },
    /// Recreate contacts for advanced deals that have none
    Repair,
    /// List deal pipelines and their stage ids
    Pipelines,
}

#[derive(Subcommand)]
enum QuotaAction {
    Show,
    Reset,
    Set { count: u32 },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("dealmaker=info".parse()?)
        .add_directive("apify_client=info".parse()?)
        .add_directive("hubspot_client=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let config = Config::from_env()?;
    config.validate()?;
    config.log_redacted();

    let tracker = RateTracker::new(&config.tracking_file, config.max_deals_per_week);

    match cli.command.unwrap_or(Command::Run { dry_run: false }) {
        Command::Run { dry_run } => run(&config, &tracker, dry_run).await,
        Command::Quota { action } => quota(&tracker, action.unwrap_or(QuotaAction::Show)),
        Command::MoveStage {
            from,
            to,
            limit,
            confirm,
        } => move_stage(&config, from, to, limit, confirm).await,
        Command::Repair => repair(&config).await,
        Command::Pipelines => pipelines(&config).await,
    }
}

async fn run(config: &Config, tracker: &RateTracker, dry_run: bool) -> Result<()> {
    let hubspot = HubSpotClient::new(config.hubspot_token.clone());
    let enricher = ApifyEnricher::new(ApifyClient::new(config.require_apify_token()?.to_string()));
    let classifier = classifier::from_config(config.openai_api_key.as_deref(), &config.openai_model);

    let workflow = Workflow::new(
        &hubspot,
        &hubspot,
        &enricher,
        classifier.as_ref(),
        tracker,
        WorkflowSettings::from_config(config),
    );
    let mode = if dry_run { RunMode::DryRun } else { RunMode::Apply };
    let stats = workflow.run(mode).await?;
    println!("{stats}");
    Ok(())
}

fn quota(tracker: &RateTracker, action: QuotaAction) -> Result<()> {
    let quota = match action {
        QuotaAction::Show => tracker.load(),
        QuotaAction::Reset => {
            let q = tracker.reset()?;
            info!("Weekly quota reset");
            q
        }
        QuotaAction::Set { count } => {
            let q = tracker.set(count)?;
            info!(count, "Weekly quota set");
            q
        }
    };

    let current = tracker.current_week_id();
    let processed = if quota.current_week == current {
        quota.deals_processed
    } else {
        0
    };
    let limit = tracker.weekly_limit();
    let remaining = limit.saturating_sub(processed);

    println!("\n=== Weekly Quota ===");
    println!("File:        {}", tracker.path().display());
    println!("Week:        {current}");
    if quota.current_week != current {
        println!("Stored week: {} (resets on next run)", quota.current_week);
    }
    println!("Processed:   {processed}/{limit}");
    println!("Remaining:   {remaining}");
    println!("Last update: {}", quota.last_update.to_rfc3339());
    println!(
        "Status:      {}",
        if remaining == 0 { "limit reached" } else { "available" }
    );
    Ok(())
}

async fn move_stage(
    config: &Config,
    from: String,
    to: String,
    limit: Option<usize>,
    confirm: bool,
) -> Result<()> {
    let hubspot = HubSpotClient::new(config.hubspot_token.clone());
    let query = RecordQuery {
        pipeline_id: config.pipeline_id.clone(),
        stage_id: from,
        name_token: config.record_name_token.clone(),
    };

    let records = RecordSource::new(&hubspot, config.page_delay)
        .fetch_candidate_records(&query, limit)
        .await
        .context("Failed to fetch deals to move")?;

    let mode = if confirm { MoveMode::Apply } else { MoveMode::Preview };
    let stats = StageMover::new(&hubspot, config.write_delay)
        .move_records(&records, &to, mode)
        .await;
    println!("{stats}");
    if mode == MoveMode::Preview && stats.planned > 0 {
        println!("Preview only. Re-run with --confirm to apply.");
    }
    Ok(())
}

async fn repair(config: &Config) -> Result<()> {
    let hubspot = HubSpotClient::new(config.hubspot_token.clone());
    let enricher = ApifyEnricher::new(ApifyClient::new(config.require_apify_token()?.to_string()));
    let classifier = classifier::from_config(config.openai_api_key.as_deref(), &config.openai_model);

    let stats = Repair::new(
        &hubspot,
        &hubspot,
        &enricher,
        classifier.as_ref(),
        WorkflowSettings::from_config(config),
    )
    .run()
    .await?;
    println!("{stats}");
    Ok(())
}

async fn pipelines(config: &Config) -> Result<()> {
    let hubspot = HubSpotClient::new(config.hubspot_token.clone());
    let pipelines = hubspot
        .list_pipelines(ObjectType::Deals)
        .await
        .context("Failed to list deal pipelines")?;

    println!("\n=== Deal Pipelines ===");
    for pipeline in &pipelines {
        println!("\n{} (id: {})", pipeline.label, pipeline.id);
        for stage in &pipeline.stages {
            println!("  {:<40} {}", stage.label, stage.id);
        }
    }
    println!("\nConfigured:");
    println!("  PIPELINE_ID:     {}", config.pipeline_id);
    println!("  SOURCE_STAGE_ID: {}", config.source_stage_id);
    println!("  TARGET_STAGE_ID: {}", config.target_stage_id);
    Ok(())
}
