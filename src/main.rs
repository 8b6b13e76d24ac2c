use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use uuid::Uuid;

use marketing_brain::{
    brain, config::BrainConfig, db, models::AnalysisWindow, report, suggest::HttpSuggestClient,
};

#[derive(Parser)]
#[command(name = "marketing-brain")]
#[command(about = "Attribution, risk, and recommendation engine for ad performance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a realistic demo organization
    Seed,
    /// Import daily channel metrics from a CSV file
    Import {
        #[arg(long)]
        org: Uuid,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run one brain cycle and persist it as the latest state
    Run {
        #[arg(long)]
        org: Uuid,
        #[arg(long, default_value_t = 30)]
        window_days: u32,
        /// Window end date (defaults to today); pin it for reproducible runs
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Threshold overrides, TOML
        #[arg(long)]
        config: Option<PathBuf>,
        /// Skip the generative enrichment call even if configured
        #[arg(long, default_value_t = false)]
        no_suggest: bool,
        /// Write the full cycle as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Run one brain cycle and write a markdown briefing
    Report {
        #[arg(long)]
        org: Uuid,
        #[arg(long, default_value_t = 30)]
        window_days: u32,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "briefing.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketing_brain=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let organization_id = db::seed(&pool).await?;
            println!("Seed data inserted for organization {organization_id}.");
        }
        Commands::Import { org, csv } => {
            let inserted = db::import_csv(&pool, org, &csv).await?;
            println!("Inserted {inserted} metric rows from {}.", csv.display());
        }
        Commands::Run {
            org,
            window_days,
            end,
            config,
            no_suggest,
            json,
        } => {
            let config = load_config(config)?;
            let window = AnalysisWindow::trailing(
                end.unwrap_or_else(|| Utc::now().date_naive()),
                window_days,
            );
            let inputs = db::fetch_inputs(&pool, org, window).await?;
            let client = if no_suggest {
                None
            } else {
                HttpSuggestClient::from_env()
            };
            if client.is_some() {
                info!("generative enrichment enabled");
            }

            let cycle =
                brain::run_brain_cycle(&inputs, window, &config, client.as_ref()).await?;
            db::save_state(&pool, org, &cycle).await?;

            println!(
                "Cycle complete: blended ROAS {:.2}x, risk {} ({:?}), {} actions, \
                 ~${:.0}/month opportunity.",
                cycle.memory.blended_roas,
                cycle.oracle.risk_score,
                cycle.oracle.risk_level,
                cycle.curiosity.actions.len(),
                cycle.curiosity.total_opportunity
            );
            for diagnostic in &cycle.diagnostics {
                println!("warning [{}]: {}", diagnostic.scope, diagnostic.message);
            }
            if let Some(path) = json {
                std::fs::write(&path, serde_json::to_string_pretty(&cycle)?)?;
                println!("Cycle written to {}.", path.display());
            }
        }
        Commands::Report {
            org,
            window_days,
            end,
            config,
            out,
        } => {
            let config = load_config(config)?;
            let window = AnalysisWindow::trailing(
                end.unwrap_or_else(|| Utc::now().date_naive()),
                window_days,
            );
            let inputs = db::fetch_inputs(&pool, org, window).await?;
            let cycle = brain::run_brain_cycle(
                &inputs,
                window,
                &config,
                None::<&HttpSuggestClient>,
            )
            .await?;
            let briefing = report::build_report(&org.to_string(), &cycle);
            std::fs::write(&out, briefing)?;
            println!("Briefing written to {}.", out.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<BrainConfig> {
    match path {
        Some(path) => BrainConfig::from_path(&path),
        None => Ok(BrainConfig::default()),
    }
}
