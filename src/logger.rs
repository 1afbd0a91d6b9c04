use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::replicate::ReplicationTask;
use crate::report::Summary;

/// Replication event sink. Every hook defaults to a no-op.
pub trait Logger: Send + Sync {
    fn start(&self, _task: &ReplicationTask) {}
    fn folder_created(&self, _path: &str, _id: &str) {}
    fn file_copied(&self, _path: &str, _source_id: &str, _id: &str) {}
    fn error(&self, _context: &str, _path: &str, _msg: &str) {}
    fn done(&self, _summary: &Summary, _seconds: f64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        let mut f = self.file.lock();
        let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
    }
}

impl Logger for TextLogger {
    fn start(&self, task: &ReplicationTask) {
        self.line(&format!(
            "START src={} parent={} name={}",
            task.source_folder_id, task.destination_parent_id, task.destination_name
        ));
    }
    fn folder_created(&self, path: &str, id: &str) {
        self.line(&format!("MKDIR path={} id={}", path, id));
    }
    fn file_copied(&self, path: &str, source_id: &str, id: &str) {
        self.line(&format!("COPY path={} src={} id={}", path, source_id, id));
    }
    fn error(&self, context: &str, path: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} path={} msg={}", context, path, msg));
    }
    fn done(&self, summary: &Summary, seconds: f64) {
        self.line(&format!(
            "DONE folders={} files={} failures={} seconds={seconds:.3}",
            summary.folders_created, summary.files_copied, summary.failures
        ));
    }
}

/// Fans each event out to several sinks (console + file)
pub struct TeeLogger {
    sinks: Vec<Arc<dyn Logger>>,
}

impl TeeLogger {
    pub fn new(sinks: Vec<Arc<dyn Logger>>) -> Self {
        Self { sinks }
    }
}

impl Logger for TeeLogger {
    fn start(&self, task: &ReplicationTask) {
        self.sinks.iter().for_each(|s| s.start(task));
    }
    fn folder_created(&self, path: &str, id: &str) {
        self.sinks.iter().for_each(|s| s.folder_created(path, id));
    }
    fn file_copied(&self, path: &str, source_id: &str, id: &str) {
        self.sinks
            .iter()
            .for_each(|s| s.file_copied(path, source_id, id));
    }
    fn error(&self, context: &str, path: &str, msg: &str) {
        self.sinks.iter().for_each(|s| s.error(context, path, msg));
    }
    fn done(&self, summary: &Summary, seconds: f64) {
        self.sinks.iter().for_each(|s| s.done(summary, seconds));
    }
}
