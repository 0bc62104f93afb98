use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod aggregate;
mod config;
mod db;
mod error;
mod models;
mod pipeline;
mod render;
mod report;
mod source;
mod window;

use config::{ReportConfig, DEFAULT_HIGHLIGHT_BELOW, DEFAULT_OUTPUT_FILE, DEFAULT_TOP_N};
use source::{CsvSource, PgSource, RecordSource};
use window::YearMonth;

#[derive(Parser)]
#[command(name = "attendance-report")]
#[command(about = "Monthly employee attendance summary and spreadsheet report", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WindowArgs {
    /// Month to report on, as YYYY-MM
    #[arg(long)]
    month: YearMonth,
    /// Read records from a CSV file instead of Postgres
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Number of employees in the ranked subset
    #[arg(long, default_value_t = DEFAULT_TOP_N, value_parser = config::parse_top_n)]
    top_n: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a month of realistic attendance
    Seed,
    /// Import attendance rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the ranked attendance summary for a month
    Summary {
        #[command(flatten)]
        window: WindowArgs,
        /// Print the full summary table as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate the two-sheet xlsx attendance report
    Report {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
        out: PathBuf,
        /// Highlight attendance percentages below this fraction
        #[arg(long, default_value_t = DEFAULT_HIGHLIGHT_BELOW, value_parser = config::parse_fraction)]
        highlight_below: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} rows).");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} attendance rows from {}.", csv.display());
        }
        Commands::Summary { window, json } => match &window.csv {
            Some(path) => print_summary(&CsvSource::new(path), &window, json).await?,
            None => print_summary(&PgSource::new(connect().await?), &window, json).await?,
        },
        Commands::Report {
            window,
            out,
            highlight_below,
        } => {
            let config = ReportConfig::default()
                .with_top_n(window.top_n)
                .with_highlight_below(highlight_below)
                .with_output_path(out);
            let written = match &window.csv {
                Some(path) => {
                    let source = CsvSource::new(path);
                    tracing::debug!(path = %source.path().display(), "using csv record source");
                    pipeline::generate_report(&source, window.month, &config).await
                }
                None => {
                    let source = PgSource::new(connect().await?);
                    pipeline::generate_report(&source, window.month, &config).await
                }
            }
            .with_context(|| format!("failed to generate attendance report for {}", window.month))?;
            println!("Attendance report generated: {}", written.display());
        }
    }

    Ok(())
}

async fn print_summary<S: RecordSource>(
    source: &S,
    window: &WindowArgs,
    json: bool,
) -> anyhow::Result<()> {
    let summary = pipeline::summarize_month(source, window.month, window.top_n)
        .await
        .with_context(|| format!("failed to summarize attendance for {}", window.month))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary.table)?);
    } else {
        print!(
            "{}",
            report::summary_text(window.month, &summary.table, &summary.ranked)
        );
    }
    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the attendance Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
