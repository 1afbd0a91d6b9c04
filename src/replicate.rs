//! Recursive tree replication
//!
//! Depth-first and strictly sequential: a destination folder is always
//! created before its source is listed, and every child is processed in the
//! order the provider returned it. A failed folder creation abandons that
//! branch; any other child failure is recorded and its siblings continue.
//! Authorization failures and cancellation halt the whole run.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::DriveError;
use crate::logger::{Logger, NoopLogger};
use crate::remote::{ListingClient, MutationClient, Node, NodeKind};
use crate::report::{FileReport, FolderReport, Halt, NodeReport, Outcome, ReplicationReport};

/// One folder level of work: copy `source_folder_id` as `destination_name`
/// under `destination_parent_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationTask {
    pub source_folder_id: String,
    pub destination_parent_id: String,
    pub destination_name: String,
}

impl ReplicationTask {
    pub fn new(
        source_folder_id: impl Into<String>,
        destination_parent_id: impl Into<String>,
        destination_name: impl Into<String>,
    ) -> Self {
        Self {
            source_folder_id: source_folder_id.into(),
            destination_parent_id: destination_parent_id.into(),
            destination_name: destination_name.into(),
        }
    }
}

/// Shared cancellation switch. Checked before every remote call.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicateOptions {
    /// Deepest folder level that may be created; the replicated root is level 0
    pub max_depth: Option<usize>,
}

// Per-run traversal state
#[derive(Default)]
struct Walk {
    ancestors: Vec<String>,
    halted: Option<Halt>,
}

type FolderFuture<'a> = Pin<Box<dyn Future<Output = Option<FolderReport>> + Send + 'a>>;

pub struct Replicator<'c, L, M> {
    lister: &'c L,
    mutator: &'c M,
    logger: Arc<dyn Logger>,
    cancel: CancelFlag,
    options: ReplicateOptions,
}

impl<'c, L, M> Replicator<'c, L, M>
where
    L: ListingClient,
    M: MutationClient,
{
    pub fn new(lister: &'c L, mutator: &'c M) -> Self {
        Self {
            lister,
            mutator,
            logger: Arc::new(NoopLogger),
            cancel: CancelFlag::new(),
            options: ReplicateOptions::default(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_options(mut self, options: ReplicateOptions) -> Self {
        self.options = options;
        self
    }

    /// Replicate the whole subtree described by `task` and return the report.
    /// Never fails as a whole: every failure is recorded in the report.
    pub async fn replicate(&self, task: &ReplicationTask) -> ReplicationReport {
        let started = Instant::now();
        self.logger.start(task);

        let mut walk = Walk::default();
        let root = self
            .replicate_folder(
                &mut walk,
                task.source_folder_id.clone(),
                task.destination_parent_id.clone(),
                task.destination_name.clone(),
                task.destination_name.clone(),
                0,
            )
            .await
            .unwrap_or_else(|| {
                FolderReport::new(
                    &task.source_folder_id,
                    &task.destination_name,
                    Outcome::Failed(DriveError::Cancelled),
                )
            });

        let report = ReplicationReport {
            root,
            halted: walk.halted,
        };
        self.logger
            .done(&report.summary(), started.elapsed().as_secs_f64());
        report
    }

    fn should_stop(&self, walk: &mut Walk) -> bool {
        if walk.halted.is_some() {
            return true;
        }
        if self.cancel.is_cancelled() {
            walk.halted = Some(Halt::Cancelled);
            return true;
        }
        false
    }

    fn record_failure(&self, walk: &mut Walk, context: &str, path: &str, err: &DriveError) {
        self.logger.error(context, path, &err.to_string());
        if err.is_fatal() && walk.halted.is_none() {
            walk.halted = Some(Halt::Unauthorized);
        }
    }

    /// `None` means the folder was never attempted because the run halted.
    fn replicate_folder<'a>(
        &'a self,
        walk: &'a mut Walk,
        source_id: String,
        parent_id: String,
        name: String,
        path: String,
        depth: usize,
    ) -> FolderFuture<'a> {
        Box::pin(async move {
            if self.should_stop(walk) {
                return None;
            }

            let new_id = match self.mutator.create_folder(&name, &parent_id).await {
                Ok(id) => id,
                Err(e) => {
                    self.record_failure(walk, "create_folder", &path, &e);
                    return Some(FolderReport::new(&source_id, &name, Outcome::Failed(e)));
                }
            };
            self.logger.folder_created(&path, &new_id);
            let mut report =
                FolderReport::new(&source_id, &name, Outcome::Created { id: new_id.clone() });

            let children = match self.enumerate(walk, &source_id).await {
                Ok(Some(nodes)) => nodes,
                Ok(None) => {
                    // Halted with part of the cursor chain unread
                    let e = DriveError::Cancelled;
                    self.record_failure(walk, "list_children", &path, &e);
                    report.listing_error = Some(e);
                    return Some(report);
                }
                Err(e) => {
                    self.record_failure(walk, "list_children", &path, &e);
                    report.listing_error = Some(e);
                    return Some(report);
                }
            };

            walk.ancestors.push(source_id.clone());
            for child in children {
                if self.should_stop(walk) {
                    break;
                }
                let child_path = format!("{}/{}", path, child.name);
                match child.kind {
                    NodeKind::Folder => {
                        if let Some(err) = self.reject_folder(walk, &child, depth + 1) {
                            self.record_failure(walk, "create_folder", &child_path, &err);
                            report.children.push(NodeReport::Folder(FolderReport::new(
                                &child.id,
                                &child.name,
                                Outcome::Failed(err),
                            )));
                            continue;
                        }
                        let sub = self
                            .replicate_folder(
                                walk,
                                child.id,
                                new_id.clone(),
                                child.name,
                                child_path,
                                depth + 1,
                            )
                            .await;
                        if let Some(sub) = sub {
                            report.children.push(NodeReport::Folder(sub));
                        }
                    }
                    NodeKind::File => {
                        let copied = self.mutator.copy_file(&child.id, &child.name, &new_id).await;
                        let outcome = match copied {
                            Ok(id) => {
                                self.logger.file_copied(&child_path, &child.id, &id);
                                Outcome::Created { id }
                            }
                            Err(e) => {
                                self.record_failure(walk, "copy_file", &child_path, &e);
                                Outcome::Failed(e)
                            }
                        };
                        report.children.push(NodeReport::File(FileReport {
                            source_id: child.id,
                            name: child.name,
                            outcome,
                        }));
                    }
                }
            }
            walk.ancestors.pop();

            Some(report)
        })
    }

    /// Consume the whole cursor chain. `Ok(None)` means the run halted mid-chain.
    async fn enumerate(
        &self,
        walk: &mut Walk,
        folder_id: &str,
    ) -> Result<Option<Vec<Node>>, DriveError> {
        let mut nodes = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            if self.should_stop(walk) {
                return Ok(None);
            }
            let page = self
                .lister
                .list_children(folder_id, cursor.as_deref())
                .await?;
            nodes.extend(page.nodes);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(Some(nodes)),
            }
        }
    }

    fn reject_folder(&self, walk: &Walk, child: &Node, depth: usize) -> Option<DriveError> {
        if walk.ancestors.iter().any(|a| a == &child.id) {
            return Some(DriveError::Cycle(child.id.clone()));
        }
        match self.options.max_depth {
            Some(max) if depth > max => Some(DriveError::DepthExceeded(max)),
            _ => None,
        }
    }
}
