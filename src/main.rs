//! CLI entry point: argument parsing, logger init, and exit-code mapping
//! (spec §6, SPEC_FULL §A/§B).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use scheduler_core::engine;
use scheduler_core::error::EngineError;
use scheduler_core::store::Store;

/// Computes and persists the next batch of outbound email send schedules
/// for one organization.
#[derive(Parser, Debug)]
#[command(name = "scheduler", version, about)]
struct Cli {
    /// Path to the organization's SQLite store.
    store_path: PathBuf,

    /// Organization id to schedule.
    org_id: i64,

    /// Run the full pipeline and print the summary without persisting.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // `--help`/`--version` surface as clap errors too; only an
            // actual usage mistake maps to spec §6's "1 invalid argument".
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            return ExitCode::from(code);
        }
    };

    match run(&cli) {
        Ok(summary) => {
            log::info!(
                "run {}: {} contacts processed, {} inserted, {} updated, {} unchanged, {} orphans deleted ({}ms)",
                summary.run_id,
                summary.contacts_processed,
                summary.inserted,
                summary.updated,
                summary.unchanged,
                summary.deleted_orphans,
                summary.duration_ms
            );
            ExitCode::from(0)
        }
        Err(e) => {
            log::error!("run failed: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<engine::RunSummary, EngineError> {
    let mut store = Store::open(&cli.store_path)?;
    let run_id = format!("run-{}", chrono::Utc::now().timestamp());
    engine::run(&mut store, cli.org_id, &run_id, cli.dry_run)
}
