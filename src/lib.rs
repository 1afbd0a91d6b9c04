//! drivetree library
//!
//! Recursive replication of a Google Drive folder tree into a new folder,
//! with per-node outcome reporting.

pub mod cli;
pub mod config;
pub mod drive;
pub mod error;
pub mod log;
pub mod logger;
pub mod progress;
pub mod remote;
pub mod replicate;
pub mod report;

pub use error::{DriveError, DriveResult};
pub use remote::{ListingClient, MutationClient, Node, NodeKind, Page};
pub use replicate::{CancelFlag, ReplicateOptions, ReplicationTask, Replicator};
pub use report::{Halt, Outcome, ReplicationReport};
