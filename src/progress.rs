//! Console progress for a replication run
//!
//! A spinner stays on the bottom line with running counts; per-node lines
//! (verbose) and failures scroll above it.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::logger::Logger;
use crate::replicate::ReplicationTask;
use crate::report::Summary;

pub struct Spinner {
    spinner: ProgressBar,
    start_time: Instant,
    folders: AtomicU64,
    files: AtomicU64,
    failures: AtomicU64,
    show_nodes: bool,
}

impl Spinner {
    pub fn new(verbose: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            spinner,
            start_time: Instant::now(),
            folders: AtomicU64::new(0),
            files: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            show_nodes: verbose,
        }
    }

    /// Hidden spinner for non-interactive use
    pub fn hidden() -> Self {
        let s = Self::new(false);
        s.spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        s
    }

    fn print_above(&self, line: String) {
        self.spinner.suspend(|| println!("{}", line));
    }

    fn refresh(&self) {
        self.spinner.set_message(format!(
            "Replicating: {} folders, {} files, {} failed in {:.1}s",
            self.folders.load(Ordering::Relaxed),
            self.files.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
            self.start_time.elapsed().as_secs_f64()
        ));
    }

    pub fn counts(&self) -> (u64, u64, u64) {
        (
            self.folders.load(Ordering::Relaxed),
            self.files.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }
}

impl Logger for Spinner {
    fn start(&self, task: &ReplicationTask) {
        if self.show_nodes {
            self.print_above(format!(
                "Source folder: {}  Destination parent: {}",
                task.source_folder_id, task.destination_parent_id
            ));
        }
        self.refresh();
    }

    fn folder_created(&self, path: &str, id: &str) {
        self.folders.fetch_add(1, Ordering::Relaxed);
        if self.show_nodes {
            self.print_above(format!("Created folder '{}' with ID: {}", path, id));
        }
        self.refresh();
    }

    fn file_copied(&self, path: &str, _source_id: &str, _id: &str) {
        self.files.fetch_add(1, Ordering::Relaxed);
        if self.show_nodes {
            self.print_above(format!("Copied file '{}'", path));
        }
        self.refresh();
    }

    fn error(&self, context: &str, path: &str, msg: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.spinner
            .suspend(|| eprintln!("Failed {} '{}': {}", context, path, msg));
        self.refresh();
    }

    fn done(&self, summary: &Summary, seconds: f64) {
        let verdict = if summary.failures == 0 { "Completed" } else { "Finished with failures" };
        self.spinner.finish_with_message(format!(
            "{}: {} folders, {} files, {} failed in {:.1}s",
            verdict, summary.folders_created, summary.files_copied, summary.failures, seconds
        ));
    }
}
