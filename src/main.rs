use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use invoice_reconciler::types::QueueStatus;
use invoice_reconciler::{
    AzureOcr, MemoryRegistry, QueueController, SqliteRegistry, WellRegistry,
};

/// OCR scanned service invoices and reconcile them into well records.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Invoice files to process (PDF/PNG/JPG)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// SQLite well registry path
    #[arg(long, default_value = "wells.db")]
    db: PathBuf,

    /// Parse and report without writing to the registry on disk
    #[arg(long)]
    dry_run: bool,
}

fn run<R: WellRegistry>(args: &Args, registry: R) -> Result<bool, invoice_reconciler::ReconcileError> {
    let ocr = AzureOcr::from_env()?;
    let mut ctl = QueueController::new(ocr, registry);

    ctl.submit_batch(&args.files);
    let outcomes = if args.dry_run {
        ctl.items().to_vec()
    } else {
        ctl.commit_all()
    };

    let mut any_error = false;
    for item in &outcomes {
        match item.status {
            QueueStatus::Saved => {
                println!(
                    "{}: saved -> {}",
                    item.source_file_name,
                    item.resolved_well_id.as_deref().unwrap_or("?")
                );
            }
            QueueStatus::NeedsReview => {
                println!(
                    "{}: needs review ({})",
                    item.source_file_name,
                    item.error.as_deref().unwrap_or("")
                );
            }
            QueueStatus::Error => {
                any_error = true;
                println!(
                    "{}: error ({})",
                    item.source_file_name,
                    item.error.as_deref().unwrap_or("")
                );
            }
            _ => {
                let well = item
                    .extracted
                    .as_ref()
                    .and_then(|f| f.well_name_candidate.clone())
                    .unwrap_or_else(|| "?".to_string());
                println!("{}: parsed (well: {})", item.source_file_name, well);
            }
        }
    }
    Ok(any_error)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = if args.dry_run {
        run(&args, MemoryRegistry::new())
    } else {
        match SqliteRegistry::open(&args.db) {
            Ok(reg) => run(&args, reg),
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
