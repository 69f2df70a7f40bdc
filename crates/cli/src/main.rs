//! Fluent Daily - one-shot runner for the daily English-learning posting pipeline
//!
//! Each invocation performs a single run: pick today's topic, generate and
//! render the day's media, then post it. Scheduling (cron, CI) is external.

mod wiring;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use services::services::config::{Secrets, Settings};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fluent Daily - daily English-learning content for Instagram
#[derive(Parser)]
#[command(name = "fluent-daily")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate, render and publish today's English-learning posts")]
#[command(long_about = r#"
Fluent Daily picks today's theme from the weekly schedule, writes two reel
scripts, a static post and four carousel slides, renders them with FFmpeg,
uploads the media and publishes it to Instagram.

Credentials are read from the environment (or a .env file):
  INSTAGRAM_ACCESS_TOKEN, INSTAGRAM_BUSINESS_ID, HUGGINGFACE_TOKEN,
  CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY, CLOUDINARY_API_SECRET,
  TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID, and optionally HF_MODEL_ID.

Examples:
  fluent-daily                         # Run today's pipeline
  fluent-daily --config prod.toml run  # Run with explicit settings
  fluent-daily idea                    # Send a reel idea to the operator chat
"#)]
struct Cli {
    /// Settings file (defaults apply when it does not exist)
    #[arg(short, long, env = "FLUENT_CONFIG", default_value = "fluent.toml")]
    config: PathBuf,

    /// Weekly schedule CSV, overrides the settings file
    #[arg(short, long, env = "FLUENT_SCHEDULE")]
    schedule: Option<PathBuf>,

    /// Directory for rendered media, overrides the settings file
    #[arg(short = 'w', long, env = "FLUENT_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce and publish today's posts (default)
    Run,

    /// Generate one reel concept and send it to the operator chat
    Idea,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    format!("fluent_daily={0},services={0},warn", log_level).into()
                }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    if let Some(schedule) = cli.schedule {
        settings.schedule_path = schedule;
    }
    if let Some(work_dir) = cli.work_dir {
        settings.work_dir = work_dir;
    }

    let secrets = Secrets::from_env().context("Missing configuration")?;
    let client = reqwest::Client::builder()
        .timeout(settings.timeouts.http())
        .build()
        .context("Failed to build HTTP client")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&settings, &secrets, client).await,
        Commands::Idea => idea(&settings, &secrets, client).await,
    }
}

async fn run(settings: &Settings, secrets: &Secrets, client: reqwest::Client) -> Result<()> {
    tokio::fs::create_dir_all(&settings.work_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.work_dir.display()))?;

    let mut daily = wiring::daily_run(settings, secrets, client);
    let today = chrono::Utc::now().date_naive();
    info!("Starting daily run for {}", today);

    match daily.run(today).await {
        Ok(report) => {
            info!(
                "Published: {:?}, failed: {:?}, skipped: {:?}",
                report.published, report.failed, report.skipped
            );
            println!("Done: {}.", report);
            Ok(())
        }
        Err(e) => {
            error!("Run aborted: {}", e);
            Err(e.into())
        }
    }
}

async fn idea(settings: &Settings, secrets: &Secrets, client: reqwest::Client) -> Result<()> {
    let digest = wiring::idea_digest(settings, secrets, client);
    digest
        .deliver()
        .await
        .context("Reel idea was not delivered")?;
    println!("Reel idea sent.");
    Ok(())
}
