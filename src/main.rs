use std::fs::File;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use cricket_graph::config::ImportConfig;
use cricket_graph::import::{Importer, discover_files};
use cricket_graph::store::{RunRecord, SqliteGraph};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let config = ImportConfig::resolve(&args, |key| std::env::var(key).ok())?;
    init_logging(&config)?;

    let store = SqliteGraph::open(&config.db_path)
        .with_context(|| format!("open graph store at {}", config.db_path.display()))?;
    let files = discover_files(&config.source_dirs)?;

    let run_id = store
        .begin_run(&Utc::now().to_rfc3339(), files.len())
        .context("record run start")?;
    let summary = Importer::new(&store, &config.tournament, config.workers)
        .run(&files)
        .context("write tournament root")?;
    store
        .finish_run(
            run_id,
            &RunRecord {
                finished_at: Utc::now().to_rfc3339(),
                files_imported: summary.files_imported,
                files_failed: summary.failures.len(),
                seasons_written: summary.seasons_written.len(),
                errors: summary.error_lines(),
            },
        )
        .context("record run end")?;

    println!("Match import complete");
    println!("DB: {}", config.db_path.display());
    println!("Tournament: {}", config.tournament.name);
    println!("Files: {}/{}", summary.files_imported, summary.files_total);
    println!("Upserts applied: {}", summary.upserts_applied);
    println!("Unresolved references: {}", summary.unresolved);
    println!("Seasons: {}", summary.seasons_written.join(", "));
    let errors = summary.error_lines();
    if !errors.is_empty() {
        println!("  errors: {}", errors.len());
        for err in errors.iter().take(12) {
            println!("   - {err}");
        }
    }
    Ok(())
}

fn init_logging(config: &ImportConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &config.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}
