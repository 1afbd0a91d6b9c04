//! Tree-shaped replication report
//!
//! Mirrors the shape of the source tree as far as it was visited. Nodes that
//! were never attempted (abandoned branch, halted run) are simply absent.

use serde::{Deserialize, Serialize};

use crate::error::DriveError;
use crate::remote::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { id: String },
    Failed(DriveError),
}

impl Outcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Outcome::Created { .. })
    }

    pub fn created_id(&self) -> Option<&str> {
        match self {
            Outcome::Created { id } => Some(id),
            Outcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&DriveError> {
        match self {
            Outcome::Created { .. } => None,
            Outcome::Failed(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub source_id: String,
    pub name: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderReport {
    pub source_id: String,
    pub name: String,
    pub outcome: Outcome,
    /// Set when the cursor chain could not be consumed; children are then empty
    pub listing_error: Option<DriveError>,
    pub children: Vec<NodeReport>,
}

impl FolderReport {
    pub fn new(source_id: &str, name: &str, outcome: Outcome) -> Self {
        Self {
            source_id: source_id.to_string(),
            name: name.to_string(),
            outcome,
            listing_error: None,
            children: Vec::new(),
        }
    }

    pub fn find_child(&self, name: &str) -> Option<&NodeReport> {
        self.children.iter().find(|c| c.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeReport {
    Folder(FolderReport),
    File(FileReport),
}

impl NodeReport {
    pub fn name(&self) -> &str {
        match self {
            NodeReport::Folder(f) => &f.name,
            NodeReport::File(f) => &f.name,
        }
    }

    pub fn outcome(&self) -> &Outcome {
        match self {
            NodeReport::Folder(f) => &f.outcome,
            NodeReport::File(f) => &f.outcome,
        }
    }

    pub fn as_folder(&self) -> Option<&FolderReport> {
        match self {
            NodeReport::Folder(f) => Some(f),
            NodeReport::File(_) => None,
        }
    }
}

/// Why a run stopped issuing remote calls before finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Halt {
    Cancelled,
    Unauthorized,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub folders_created: u64,
    pub files_copied: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateFolder,
    ListChildren,
    CopyFile,
}

/// One flattened line of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Slash-joined names from the replicated root down to this node
    pub path: String,
    pub source_id: String,
    pub kind: NodeKind,
    pub operation: Operation,
    pub destination_id: Option<String>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

impl ReportEntry {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationReport {
    pub root: FolderReport,
    pub halted: Option<Halt>,
}

impl ReplicationReport {
    /// True when every visited node was created and the run was not halted
    pub fn is_success(&self) -> bool {
        self.halted.is_none() && self.summary().failures == 0
    }

    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        tally(&self.root, &mut s);
        s
    }

    /// Pre-order flattening: a folder, its listing failure (if any), then its children
    pub fn entries(&self) -> Vec<ReportEntry> {
        let mut out = Vec::new();
        flatten_folder(&self.root, "", &mut out);
        out
    }

    pub fn failures(&self) -> Vec<ReportEntry> {
        self.entries().into_iter().filter(|e| e.is_failure()).collect()
    }
}

fn tally(folder: &FolderReport, s: &mut Summary) {
    match folder.outcome {
        Outcome::Created { .. } => s.folders_created += 1,
        Outcome::Failed(_) => s.failures += 1,
    }
    if folder.listing_error.is_some() {
        s.failures += 1;
    }
    for child in &folder.children {
        match child {
            NodeReport::Folder(f) => tally(f, s),
            NodeReport::File(f) => match f.outcome {
                Outcome::Created { .. } => s.files_copied += 1,
                Outcome::Failed(_) => s.failures += 1,
            },
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn entry(
    path: &str,
    source_id: &str,
    kind: NodeKind,
    operation: Operation,
    outcome: &Outcome,
) -> ReportEntry {
    ReportEntry {
        path: path.to_string(),
        source_id: source_id.to_string(),
        kind,
        operation,
        destination_id: outcome.created_id().map(str::to_string),
        error_kind: outcome.error().map(|e| e.kind().to_string()),
        error: outcome.error().map(|e| e.to_string()),
    }
}

fn flatten_folder(folder: &FolderReport, prefix: &str, out: &mut Vec<ReportEntry>) {
    let path = join_path(prefix, &folder.name);
    out.push(entry(
        &path,
        &folder.source_id,
        NodeKind::Folder,
        Operation::CreateFolder,
        &folder.outcome,
    ));
    if let Some(err) = &folder.listing_error {
        out.push(entry(
            &path,
            &folder.source_id,
            NodeKind::Folder,
            Operation::ListChildren,
            &Outcome::Failed(err.clone()),
        ));
    }
    for child in &folder.children {
        match child {
            NodeReport::Folder(f) => flatten_folder(f, &path, out),
            NodeReport::File(f) => out.push(entry(
                &join_path(&path, &f.name),
                &f.source_id,
                NodeKind::File,
                Operation::CopyFile,
                &f.outcome,
            )),
        }
    }
}
