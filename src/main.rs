mod config;
mod db;
mod record;
mod report;
mod resolver;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::store::RecordStore;

#[derive(Parser)]
#[command(name = "company_dedupe", about = "Duplicate merge for the company records table")]
struct Cli {
    /// SQLite database path (default: DEDUPE_DB_PATH or data/companies.sqlite)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Settings file with field names, sentinels and merge policies
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Load records from a JSON file
    Import { file: PathBuf },
    /// Merge confirmed duplicates and delete the losers
    Run {
        /// Plan only; write nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Show duplicate-flag statistics
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = config::load(cli.config.as_deref())?;
    let db_path = cli.db.clone().unwrap_or_else(db::default_path);

    let result = match cli.command {
        Commands::Init => {
            let store = db::SqliteStore::open(&db_path)?;
            store.init_schema()?;
            println!("Initialized schema in {:?}", db_path);
            Ok(())
        }
        Commands::Import { file } => {
            let mut store = db::SqliteStore::open(&db_path)?;
            store.init_schema()?;
            let imported = store.import_file(&file)?;
            println!("Imported {} records from {:?}", imported, file);
            Ok(())
        }
        Commands::Run { dry_run } => {
            let mut store = db::SqliteStore::open(&db_path)?;
            store.init_schema()?;
            let run_id = report::new_run_id();
            let started_at = chrono::Utc::now();
            let summary = resolver::run(&mut store, &settings, dry_run)?;
            report::print_summary(&summary);
            if !dry_run {
                store.persist_run(&run_id, started_at, &summary)?;
            }
            Ok(())
        }
        Commands::Stats => {
            let store = db::SqliteStore::open(&db_path)?;
            store.init_schema()?;
            let records = store.fetch_all()?;
            if records.is_empty() {
                println!("No records. Run 'import' first.");
                return Ok(());
            }
            let flagged = records
                .iter()
                .filter(|r| resolver::groups::is_flagged(r, &settings))
                .count();
            let linked = records
                .iter()
                .filter(|r| !r.is_empty(&settings.link_field))
                .count();
            println!("Records:  {}", records.len());
            println!("Flagged:  {}", flagged);
            println!("Linked:   {}", linked);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}
