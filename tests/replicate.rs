use async_trait::async_trait;
use drivetree::logger::TextLogger;
use drivetree::report::{FolderReport, NodeReport};
use drivetree::{
    DriveError, DriveResult, Halt, ListingClient, MutationClient, Node, NodeKind, Outcome, Page,
    ReplicateOptions, ReplicationReport, ReplicationTask, Replicator,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    List { folder: String, cursor: Option<String> },
    CreateFolder { name: String, parent: String },
    Copy { source: String, name: String, parent: String },
}

impl Call {
    fn is_mutation(&self) -> bool {
        !matches!(self, Call::List { .. })
    }
}

#[derive(Debug, Clone)]
struct DestNode {
    name: String,
    kind: NodeKind,
}

/// In-memory Drive: a read-only source tree plus a destination that records creations
struct FakeDrive {
    source: HashMap<String, Vec<Node>>,
    page_size: usize,
    calls: Mutex<Vec<Call>>,
    dest: Mutex<HashMap<String, Vec<DestNode>>>,
    next_id: Mutex<u64>,
    fail_create: HashMap<String, DriveError>,
    fail_copy: HashMap<String, DriveError>,
    // folder id -> (page index, error)
    fail_list: HashMap<String, (usize, DriveError)>,
}

impl FakeDrive {
    fn new() -> Self {
        Self {
            source: HashMap::new(),
            page_size: 100,
            calls: Mutex::new(Vec::new()),
            dest: Mutex::new(HashMap::new()),
            next_id: Mutex::new(0),
            fail_create: HashMap::new(),
            fail_copy: HashMap::new(),
            fail_list: HashMap::new(),
        }
    }

    fn folder(mut self, id: &str, children: Vec<Node>) -> Self {
        self.source.insert(id.to_string(), children);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn list_calls(&self) -> usize {
        self.calls().iter().filter(|c| !c.is_mutation()).count()
    }

    fn mutation_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    fn dest_children(&self, parent: &str) -> Vec<DestNode> {
        self.dest.lock().get(parent).cloned().unwrap_or_default()
    }

    fn mint(&self, parent: &str, name: &str, kind: NodeKind) -> String {
        let mut n = self.next_id.lock();
        *n += 1;
        let id = format!("d{}", *n);
        self.dest
            .lock()
            .entry(parent.to_string())
            .or_default()
            .push(DestNode {
                name: name.to_string(),
                kind,
            });
        id
    }
}

fn provider(reason: &str) -> DriveError {
    DriveError::Provider {
        status: 403,
        reason: reason.to_string(),
        message: format!("{} (simulated)", reason),
    }
}

#[async_trait]
impl ListingClient for FakeDrive {
    async fn list_children(&self, folder_id: &str, cursor: Option<&str>) -> DriveResult<Page> {
        self.calls.lock().push(Call::List {
            folder: folder_id.to_string(),
            cursor: cursor.map(str::to_string),
        });
        let offset: usize = match cursor {
            Some(c) => c
                .rsplit_once(':')
                .and_then(|(_, n)| n.parse().ok())
                .ok_or_else(|| provider("invalidPageToken"))?,
            None => 0,
        };
        if let Some((page, err)) = self.fail_list.get(folder_id) {
            if offset / self.page_size == *page {
                return Err(err.clone());
            }
        }
        let all = self.source.get(folder_id).ok_or_else(|| DriveError::NotFound {
            message: format!("File not found: {}.", folder_id),
        })?;
        let end = (offset + self.page_size).min(all.len());
        Ok(Page {
            nodes: all[offset..end].to_vec(),
            next_cursor: (end < all.len()).then(|| format!("{}:{}", folder_id, end)),
        })
    }
}

#[async_trait]
impl MutationClient for FakeDrive {
    async fn create_folder(&self, name: &str, parent_id: &str) -> DriveResult<String> {
        self.calls.lock().push(Call::CreateFolder {
            name: name.to_string(),
            parent: parent_id.to_string(),
        });
        if let Some(err) = self.fail_create.get(name) {
            return Err(err.clone());
        }
        Ok(self.mint(parent_id, name, NodeKind::Folder))
    }

    async fn copy_file(&self, source_id: &str, name: &str, parent_id: &str) -> DriveResult<String> {
        self.calls.lock().push(Call::Copy {
            source: source_id.to_string(),
            name: name.to_string(),
            parent: parent_id.to_string(),
        });
        if let Some(err) = self.fail_copy.get(source_id) {
            return Err(err.clone());
        }
        Ok(self.mint(parent_id, name, NodeKind::File))
    }
}

async fn run(drive: &FakeDrive, source: &str, name: &str) -> ReplicationReport {
    Replicator::new(drive, drive)
        .replicate(&ReplicationTask::new(source, "root", name))
        .await
}

fn failed_count(folder: &FolderReport) -> usize {
    folder
        .children
        .iter()
        .filter(|c| !c.outcome().is_created())
        .count()
}

/// At every created level, destination child count == source child count minus failures
fn assert_mirrors_source(drive: &FakeDrive, folder: &FolderReport) {
    let Some(dest_id) = folder.outcome.created_id() else {
        return;
    };
    if folder.listing_error.is_some() {
        return;
    }
    let source_count = drive.source.get(&folder.source_id).map_or(0, Vec::len);
    assert_eq!(
        drive.dest_children(dest_id).len(),
        source_count - failed_count(folder),
        "child count mismatch under {}",
        folder.name
    );
    for child in &folder.children {
        if let NodeReport::Folder(sub) = child {
            assert_mirrors_source(drive, sub);
        }
    }
}

#[tokio::test]
async fn empty_folder_creates_only_destination() {
    let drive = FakeDrive::new().folder("src", vec![]);
    let report = run(&drive, "src", "Copy").await;

    assert_eq!(drive.mutation_calls(), 1);
    assert_eq!(drive.list_calls(), 1);
    assert!(report.root.children.is_empty());
    assert!(report.is_success());
    assert_eq!(report.root.outcome, Outcome::Created { id: "d1".into() });
}

#[tokio::test]
async fn nested_tree_is_mirrored_level_by_level() {
    let drive = FakeDrive::new()
        .folder(
            "src",
            vec![
                Node::file("f1", "readme.md"),
                Node::folder("a", "Alpha"),
                Node::folder("b", "Beta"),
            ],
        )
        .folder("a", vec![Node::file("f2", "one.txt"), Node::folder("a1", "Deep")])
        .folder("a1", vec![Node::file("f3", "two.txt")])
        .folder("b", vec![]);

    let report = run(&drive, "src", "Copy").await;

    assert!(report.is_success());
    let s = report.summary();
    assert_eq!(s.folders_created, 4);
    assert_eq!(s.files_copied, 3);
    assert_mirrors_source(&drive, &report.root);

    // Every child references its parent's new id, and parents precede children
    let calls = drive.calls();
    let deep_create = calls
        .iter()
        .position(|c| matches!(c, Call::CreateFolder { name, .. } if name == "Deep"))
        .unwrap();
    let deep_list = calls
        .iter()
        .position(|c| matches!(c, Call::List { folder, .. } if folder == "a1"))
        .unwrap();
    let two_copy = calls
        .iter()
        .position(|c| matches!(c, Call::Copy { source, .. } if source == "f3"))
        .unwrap();
    assert!(deep_create < deep_list && deep_list < two_copy);

    let alpha = report.root.find_child("Alpha").and_then(NodeReport::as_folder).unwrap();
    let alpha_id = alpha.outcome.created_id().unwrap();
    assert!(calls.contains(&Call::Copy {
        source: "f2".into(),
        name: "one.txt".into(),
        parent: alpha_id.into(),
    }));
}

#[tokio::test]
async fn pagination_consumes_whole_cursor_chain() {
    let children: Vec<Node> = (0..7)
        .map(|i| Node::file(format!("f{i}"), format!("file{i}")))
        .collect();
    let mut drive = FakeDrive::new().folder("src", children.clone());
    drive.page_size = 3;

    let report = run(&drive, "src", "Copy").await;

    assert_eq!(drive.list_calls(), 3);
    let cursors: Vec<Option<String>> = drive
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::List { cursor, .. } => Some(cursor),
            _ => None,
        })
        .collect();
    assert_eq!(cursors, vec![None, Some("src:3".into()), Some("src:6".into())]);

    let copied: Vec<String> = drive
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Copy { source, .. } => Some(source),
            _ => None,
        })
        .collect();
    let expected: Vec<String> = children.iter().map(|n| n.id.clone()).collect();
    assert_eq!(copied, expected);
    assert_eq!(report.root.children.len(), 7);
}

#[tokio::test]
async fn root_creation_failure_abandons_everything() {
    let mut drive = FakeDrive::new()
        .folder("src", vec![Node::file("f1", "a"), Node::folder("sub", "Sub")])
        .folder("sub", vec![Node::file("f2", "b")]);
    drive.fail_create.insert("Copy".into(), provider("invalidParent"));

    let report = run(&drive, "src", "Copy").await;

    assert_eq!(drive.calls().len(), 1);
    assert_eq!(drive.list_calls(), 0);
    assert!(report.root.children.is_empty());
    assert_eq!(report.root.outcome, Outcome::Failed(provider("invalidParent")));
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.halted, None);
}

#[tokio::test]
async fn failed_copy_does_not_stop_siblings() {
    let mut drive = FakeDrive::new().folder(
        "src",
        vec![
            Node::file("f1", "one"),
            Node::file("f2", "two"),
            Node::file("f3", "three"),
        ],
    );
    drive.fail_copy.insert("f2".into(), provider("storageQuotaExceeded"));

    let report = run(&drive, "src", "Copy").await;

    let outcomes: Vec<bool> = report
        .root
        .children
        .iter()
        .map(|c| c.outcome().is_created())
        .collect();
    assert_eq!(outcomes, vec![true, false, true]);
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].source_id, "f2");
    assert_eq!(failures[0].path, "Copy/two");
    assert!(!report.is_success());
    assert_mirrors_source(&drive, &report.root);
}

#[tokio::test]
async fn failed_subfolder_is_contained_to_its_branch() {
    let mut drive = FakeDrive::new()
        .folder("src", vec![Node::folder("a", "Broken"), Node::folder("b", "Fine")])
        .folder("a", vec![Node::file("fa", "lost.txt")])
        .folder("b", vec![Node::file("fb", "kept.txt")]);
    drive.fail_create.insert("Broken".into(), provider("forbidden"));

    let report = run(&drive, "src", "Copy").await;

    assert!(!drive
        .calls()
        .iter()
        .any(|c| matches!(c, Call::List { folder, .. } if folder == "a")));
    let fine = report.root.find_child("Fine").and_then(NodeReport::as_folder).unwrap();
    assert!(fine.outcome.is_created());
    assert_eq!(fine.children.len(), 1);
    assert!(fine.children[0].outcome().is_created());
    let broken = report.root.find_child("Broken").and_then(NodeReport::as_folder).unwrap();
    assert!(broken.children.is_empty());
    assert_eq!(report.failures().len(), 1);
    assert_mirrors_source(&drive, &report.root);
}

#[tokio::test]
async fn replicating_twice_duplicates_the_tree() {
    let drive = FakeDrive::new()
        .folder("src", vec![Node::file("f1", "a.txt")]);

    let first = run(&drive, "src", "Copy").await;
    let second = run(&drive, "src", "Copy").await;

    let roots = drive.dest_children("root");
    assert_eq!(roots.len(), 2);
    assert!(roots.iter().all(|n| n.name == "Copy" && n.kind == NodeKind::Folder));
    assert_ne!(
        first.root.outcome.created_id(),
        second.root.outcome.created_id()
    );
}

#[tokio::test]
async fn duplicate_names_and_provider_order_are_kept() {
    let drive = FakeDrive::new()
        .folder(
            "src",
            vec![
                Node::file("z", "same.txt"),
                Node::folder("d", "same.txt"),
                Node::file("a", "same.txt"),
            ],
        )
        .folder("d", vec![]);

    let report = run(&drive, "src", "Copy").await;

    let dest_id = report.root.outcome.created_id().unwrap();
    let kinds: Vec<NodeKind> = drive.dest_children(dest_id).iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NodeKind::File, NodeKind::Folder, NodeKind::File]);
    assert!(drive.dest_children(dest_id).iter().all(|n| n.name == "same.txt"));
}

#[tokio::test]
async fn unauthorized_halts_the_whole_run() {
    let mut drive = FakeDrive::new()
        .folder(
            "src",
            vec![
                Node::file("f1", "one"),
                Node::file("f2", "two"),
                Node::folder("sub", "Sub"),
            ],
        )
        .folder("sub", vec![Node::file("f3", "three")]);
    drive.fail_copy.insert(
        "f2".into(),
        DriveError::Unauthorized {
            status: 401,
            message: "Invalid Credentials".into(),
        },
    );

    let report = run(&drive, "src", "Copy").await;

    assert_eq!(report.halted, Some(Halt::Unauthorized));
    assert!(!drive
        .calls()
        .iter()
        .any(|c| matches!(c, Call::CreateFolder { name, .. } if name == "Sub")));
    assert_eq!(report.root.children.len(), 2);
    assert_eq!(report.failures().len(), 1);
}

#[tokio::test]
async fn listing_failure_marks_enumeration_incomplete() {
    let mut drive = FakeDrive::new()
        .folder(
            "src",
            vec![Node::folder("a", "Flaky"), Node::file("f9", "after.txt")],
        )
        .folder(
            "a",
            vec![Node::file("a1", "x"), Node::file("a2", "y"), Node::file("a3", "z")],
        );
    drive.page_size = 2;
    drive
        .fail_list
        .insert("a".into(), (1, DriveError::Transport("connection reset".into())));

    let report = run(&drive, "src", "Copy").await;

    let flaky = report.root.find_child("Flaky").and_then(NodeReport::as_folder).unwrap();
    assert!(flaky.outcome.is_created());
    assert_eq!(
        flaky.listing_error,
        Some(DriveError::Transport("connection reset".into()))
    );
    // Nothing from the partial first page was copied
    assert!(flaky.children.is_empty());
    assert!(!drive
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Copy { source, .. } if source == "a1")));
    // The sibling after it still went through
    assert!(report.root.find_child("after.txt").unwrap().outcome().is_created());
    assert_eq!(report.summary().failures, 1);
}

#[tokio::test]
async fn missing_source_folder_is_reported_on_listing() {
    let drive = FakeDrive::new();
    let report = run(&drive, "ghost", "Copy").await;

    assert!(report.root.outcome.is_created());
    assert!(matches!(
        report.root.listing_error,
        Some(DriveError::NotFound { .. })
    ));
    assert_eq!(report.failures()[0].error_kind.as_deref(), Some("not_found"));
}

#[tokio::test]
async fn depth_cap_rejects_deeper_folders_without_creating_them() {
    let drive = FakeDrive::new()
        .folder("src", vec![Node::folder("l1", "L1")])
        .folder("l1", vec![Node::folder("l2", "L2"), Node::file("f", "file")])
        .folder("l2", vec![]);

    let report = Replicator::new(&drive, &drive)
        .with_options(ReplicateOptions { max_depth: Some(1) })
        .replicate(&ReplicationTask::new("src", "root", "Copy"))
        .await;

    let l1 = report.root.find_child("L1").and_then(NodeReport::as_folder).unwrap();
    assert_eq!(
        l1.find_child("L2").unwrap().outcome(),
        &Outcome::Failed(DriveError::DepthExceeded(1))
    );
    assert!(l1.find_child("file").unwrap().outcome().is_created());
    assert!(!drive
        .calls()
        .iter()
        .any(|c| matches!(c, Call::CreateFolder { name, .. } if name == "L2")));
}

#[tokio::test]
async fn text_log_records_the_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("run.log");
    let mut drive =
        FakeDrive::new().folder("src", vec![Node::file("f1", "a"), Node::file("f2", "b")]);
    drive.fail_copy.insert("f2".into(), provider("rateLimitExceeded"));

    let logger = Arc::new(TextLogger::new(&log_path)?);
    Replicator::new(&drive, &drive)
        .with_logger(logger)
        .replicate(&ReplicationTask::new("src", "root", "Copy"))
        .await;

    let text = std::fs::read_to_string(&log_path)?;
    assert!(text.contains("START src=src parent=root name=Copy"));
    assert!(text.contains("MKDIR path=Copy id=d1"));
    assert!(text.contains("COPY path=Copy/a src=f1"));
    assert!(text.contains("ERROR ctx=copy_file path=Copy/b"));
    assert!(text.contains("DONE folders=1 files=1 failures=1"));
    Ok(())
}
