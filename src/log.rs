use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use anyhow::{Result, Context};
use chrono::Utc;

use crate::replicate::ReplicationTask;
use crate::report::{Halt, ReplicationReport, ReportEntry};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    CompletedWithFailures,
    Halted(Halt),
}

impl RunStatus {
    pub fn of(report: &ReplicationReport) -> Self {
        match report.halted {
            Some(h) => RunStatus::Halted(h),
            None if report.is_success() => RunStatus::Completed,
            None => RunStatus::CompletedWithFailures,
        }
    }
}

/// One JSONL line: a node entry or the closing run summary, stamped with the run
#[derive(Serialize, Deserialize, Debug)]
pub struct ReportLogLine {
    pub timestamp: String,
    pub run_id: String,
    #[serde(flatten)]
    pub record: ReportLogRecord,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum ReportLogRecord {
    Node(ReportEntry),
    Run(RunSummary),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RunSummary {
    pub source_folder_id: String,
    pub destination_parent_id: String,
    pub destination_name: String,
    pub status: RunStatus,
    pub folders_created: u64,
    pub files_copied: u64,
    pub failures: u64,
}

pub struct ReportLog {
    log_file_path: PathBuf,
}

impl ReportLog {
    pub fn new(path: &Path) -> Self {
        ReportLog { log_file_path: path.to_path_buf() }
    }

    /// Append every entry of `report` followed by a run summary line
    pub fn write_report(&self, task: &ReplicationTask, report: &ReplicationReport) -> Result<()> {
        if let Some(parent) = self.log_file_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("Failed to open report log file")?;
        let mut writer = BufWriter::new(file);
        let run_id = uuid::Uuid::new_v4().to_string();
        let timestamp = Utc::now().to_rfc3339();

        let summary = report.summary();
        let records = report
            .entries()
            .into_iter()
            .map(ReportLogRecord::Node)
            .chain(std::iter::once(ReportLogRecord::Run(RunSummary {
                source_folder_id: task.source_folder_id.clone(),
                destination_parent_id: task.destination_parent_id.clone(),
                destination_name: task.destination_name.clone(),
                status: RunStatus::of(report),
                folders_created: summary.folders_created,
                files_copied: summary.files_copied,
                failures: summary.failures,
            })));
        for record in records {
            let line = ReportLogLine {
                timestamp: timestamp.clone(),
                run_id: run_id.clone(),
                record,
            };
            serde_json::to_writer(&mut writer, &line)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}
