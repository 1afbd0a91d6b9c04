//! drivetree - copy a Google Drive folder tree into a new folder
//!
//! Exit status: 0 when every node was replicated, 1 when any node failed or
//! the run was halted, 2 on startup errors, 130 on a second Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use drivetree::cli::Args;
use drivetree::config::{default_config_path, load_settings, resolve_access_token};
use drivetree::drive::DriveClient;
use drivetree::log::ReportLog;
use drivetree::logger::{Logger, TeeLogger, TextLogger};
use drivetree::progress::Spinner;
use drivetree::{CancelFlag, Halt, ReplicateOptions, ReplicationReport, Replicator};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn run() -> Result<i32> {
    let args = Args::parse();
    let settings = args.apply(load_settings(args.config.as_deref())?);

    if args.init_config {
        let path = args.config.clone().unwrap_or_else(default_config_path);
        settings.save(&path)?;
        println!("Wrote {}", path.display());
        return Ok(0);
    }

    let token = resolve_access_token(
        args.access_token.as_deref(),
        settings.access_token_file.as_deref(),
    )?;

    let task = {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        args.resolve_task(&mut input, &mut std::io::stdout())?
    };

    // First Ctrl-C stops new remote calls; a second one exits immediately
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            if cancel.is_cancelled() {
                eprintln!("\nInterrupted again. Exiting (Ctrl-C)...");
                std::process::exit(130);
            }
            eprintln!("\nInterrupted by user. No new remote calls will be issued...");
            cancel.cancel();
        })
        .context("Error setting Ctrl-C handler")?;
    }

    let client = DriveClient::new(
        &settings.api_base,
        token,
        settings.page_size,
        Duration::from_secs(settings.request_timeout_secs),
    )?;

    let spinner: Arc<dyn Logger> = Arc::new(Spinner::new(args.verbose));
    let mut sinks = vec![spinner];
    if let Some(ref p) = settings.log_file {
        match TextLogger::new(p) {
            Ok(l) => sinks.push(Arc::new(l)),
            Err(e) => eprintln!("Warning: cannot open log file {}: {}", p.display(), e),
        }
    }
    let logger: Arc<dyn Logger> = Arc::new(TeeLogger::new(sinks));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    println!("\nStarting recursive copy...");
    let replicator = Replicator::new(&client, &client)
        .with_logger(logger)
        .with_cancel(cancel)
        .with_options(ReplicateOptions {
            max_depth: settings.max_depth,
        });
    let report = rt.block_on(replicator.replicate(&task));

    if let Some(ref p) = args.report {
        ReportLog::new(p)
            .write_report(&task, &report)
            .with_context(|| format!("Failed to write report {}", p.display()))?;
    }

    print_outcome(&report);
    Ok(if report.is_success() { 0 } else { 1 })
}

fn print_outcome(report: &ReplicationReport) {
    if let Some(id) = report.root.outcome.created_id() {
        println!("Destination folder '{}' has ID: {}", report.root.name, id);
    }

    let failures = report.failures();
    if !failures.is_empty() {
        eprintln!("\n{} item(s) failed:", failures.len());
        for f in &failures {
            eprintln!(
                "  {:?} {} (source {}): {}",
                f.operation,
                f.path,
                f.source_id,
                f.error.as_deref().unwrap_or_default()
            );
        }
    }

    match report.halted {
        Some(Halt::Cancelled) => {
            eprintln!("\nRecursive copy cancelled; the partial tree was left in place.")
        }
        Some(Halt::Unauthorized) => {
            eprintln!("\nRecursive copy stopped: the access token was rejected.")
        }
        None if failures.is_empty() => println!("\nRecursive copy complete!"),
        None => eprintln!("\nRecursive copy finished with failures."),
    }
}
