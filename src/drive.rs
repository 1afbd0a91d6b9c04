//! Google Drive v3 REST client implementing the listing and mutation seams
//!
//! One HTTP request per call, no retries. Non-success responses are decoded
//! from Drive's JSON error envelope and classified into [`DriveError`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{DriveError, DriveResult};
use crate::remote::{ListingClient, MutationClient, Node, NodeKind, Page, FOLDER_MIME_TYPE};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";

// Drive caps pageSize at 1000
pub const MAX_PAGE_SIZE: u32 = 1000;

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Authenticated handle to the Drive API. Cheap to share behind an `Arc`.
pub struct DriveClient {
    http: Client,
    api_base: String,
    access_token: String,
    page_size: u32,
}

impl DriveClient {
    pub fn new(
        api_base: &str,
        access_token: String,
        page_size: u32,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("drivetree/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.api_base)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> DriveResult<T> {
        let response = req.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| DriveError::Transport(format!("malformed response body: {e}")))
    }
}

#[async_trait]
impl ListingClient for DriveClient {
    async fn list_children(&self, folder_id: &str, cursor: Option<&str>) -> DriveResult<Page> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", parents_query(folder_id)),
            ("spaces", "drive".to_string()),
            ("fields", LIST_FIELDS.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(token) = cursor {
            params.push(("pageToken", token.to_string()));
        }

        let req = self.http.get(self.files_url()).query(&params);
        let listing: FileListResponse = self.send_json(req).await?;
        Ok(into_page(listing))
    }
}

#[async_trait]
impl MutationClient for DriveClient {
    async fn create_folder(&self, name: &str, parent_id: &str) -> DriveResult<String> {
        let body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id],
        });
        let req = self
            .http
            .post(self.files_url())
            .query(&[("fields", "id")])
            .json(&body);
        let created: CreatedFile = self.send_json(req).await?;
        Ok(created.id)
    }

    async fn copy_file(
        &self,
        source_id: &str,
        name: &str,
        parent_id: &str,
    ) -> DriveResult<String> {
        let body = serde_json::json!({
            "name": name,
            "parents": [parent_id],
        });
        let url = format!("{}/{}/copy", self.files_url(), source_id);
        let req = self.http.post(url).query(&[("fields", "id")]).json(&body);
        let created: CreatedFile = self.send_json(req).await?;
        Ok(created.id)
    }
}

fn into_page(listing: FileListResponse) -> Page {
    let nodes = listing
        .files
        .into_iter()
        .map(|f| Node {
            kind: NodeKind::from_mime_type(&f.mime_type),
            id: f.id,
            name: f.name,
        })
        .collect();
    Page {
        nodes,
        next_cursor: listing.next_page_token.filter(|t| !t.is_empty()),
    }
}

/// Build the `q` filter selecting the immediate children of `folder_id`
pub fn parents_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}' in parents", escaped)
}

/// Map a non-success status plus Drive error body onto the error taxonomy
pub fn classify_error(status: u16, body: &str) -> DriveError {
    let (reason, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => {
            let reason = env
                .error
                .errors
                .into_iter()
                .map(|d| d.reason)
                .find(|r| !r.is_empty())
                .unwrap_or_default();
            (reason, env.error.message)
        }
        Err(_) => (String::new(), body.trim().to_string()),
    };
    let message = if message.is_empty() {
        format!("HTTP {}", status)
    } else {
        message
    };

    match status {
        401 => DriveError::Unauthorized { status, message },
        403 if reason == "authError" || reason == "insufficientPermissions" => {
            DriveError::Unauthorized { status, message }
        }
        404 => DriveError::NotFound { message },
        _ => DriveError::Provider {
            status,
            reason,
            message,
        },
    }
}
