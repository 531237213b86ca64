mod db;
mod fetch;
mod models;
mod normalize;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use db::Database;
use models::CanonicalJobRecord;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "jobmart")]
#[command(about = "Job market ETL - fetch, clean, and analyze remote job postings")]
struct Cli {
    /// Path to the SQLite database (defaults to the platform data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Run the full pipeline: fetch, normalize, load
    Run {
        /// Search keyword (e.g., "data scientist")
        #[arg(short, long)]
        search: Option<String>,

        /// Category filter
        #[arg(short, long)]
        category: Option<String>,

        /// Maximum number of jobs to keep
        #[arg(short, long)]
        limit: Option<usize>,

        /// Where to write the raw fetched records
        #[arg(long, default_value = "data/raw/jobs_raw.json")]
        raw_out: PathBuf,

        /// Where to write the cleaned records
        #[arg(long, default_value = "data/processed/jobs_clean.json")]
        clean_out: PathBuf,
    },

    /// Print the analytics report
    Report,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut db = match &cli.db {
        Some(path) => Database::open_at(path)?,
        None => Database::open()?,
    };

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Run {
            search,
            category,
            limit,
            raw_out,
            clean_out,
        } => {
            // Schema creation is idempotent, so a pipeline run may be the
            // first thing that ever touches the database.
            db.init()?;

            println!(
                "Fetching jobs{}...",
                search
                    .as_deref()
                    .map(|s| format!(" matching '{s}'"))
                    .unwrap_or_default()
            );
            let raw = fetch::fetch_jobs(search.as_deref(), category.as_deref(), limit)?;
            println!("Fetched {} postings", raw.len());

            fetch::write_raw_json(&raw, &raw_out)?;
            println!("Raw records written to {}", raw_out.display());

            let (records, summary) = normalize::normalize_batch(&raw);
            write_clean_json(&records, &clean_out)?;
            println!("Clean records written to {}", clean_out.display());

            println!("\nNormalization summary:");
            println!("  Processed:  {}", summary.processed);
            println!("  Dropped:    {} (no usable id)", summary.dropped);
            println!("  Duplicates: {}", summary.duplicates);
            println!("  Output:     {}", summary.output);
            println!(
                "  Null rates: publication_date {:.1}%, salary_min {:.1}%, salary_max {:.1}%, salary_currency {:.1}%",
                summary.null_rate(summary.null_publication_date),
                summary.null_rate(summary.null_salary_min),
                summary.null_rate(summary.null_salary_max),
                summary.null_rate(summary.null_salary_currency),
            );

            let (inserted, updated) = db.upsert_jobs(&records)?;
            println!("\nStore: {} inserted, {} updated", inserted, updated);
        }

        Commands::Report => {
            db.ensure_initialized()?;
            report::print_report(&db)?;
        }
    }

    Ok(())
}

fn write_clean_json(records: &[CanonicalJobRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
