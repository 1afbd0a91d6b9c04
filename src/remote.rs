use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriveResult;
// Remote listing/mutation seams and the entries they exchange

/// Mime type Drive uses to mark folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

impl NodeKind {
    /// Only the folder mime type is a folder; docs, shortcuts and blobs are all files
    pub fn from_mime_type(mime: &str) -> Self {
        if mime == FOLDER_MIME_TYPE {
            NodeKind::Folder
        } else {
            NodeKind::File
        }
    }
}

/// A child entry returned by a listing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::Folder,
        }
    }

    pub fn file(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::File,
        }
    }
}

/// One page of a listing; `next_cursor == None` ends the chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub nodes: Vec<Node>,
    pub next_cursor: Option<String>,
}

/// Read-only enumeration of a folder's immediate children.
#[async_trait]
pub trait ListingClient: Send + Sync {
    async fn list_children(&self, folder_id: &str, cursor: Option<&str>) -> DriveResult<Page>;
}

/// Destination-side mutations. Each call is exactly one remote attempt.
#[async_trait]
pub trait MutationClient: Send + Sync {
    /// Returns the id of the new folder.
    async fn create_folder(&self, name: &str, parent_id: &str) -> DriveResult<String>;

    /// Returns the id of the new copy.
    async fn copy_file(&self, source_id: &str, name: &str, parent_id: &str)
        -> DriveResult<String>;
}
