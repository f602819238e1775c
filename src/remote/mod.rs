//! The remote gist collection as seen by the sync engine.
//!
//! [`RemoteSource`] is the only way the core talks to the remote API: two
//! paginated listings (owned and starred gists), per-file content fetches,
//! and the create/delete calls used by the library facade.
//! [`GitHubSource`] speaks the GitHub REST API; [`MemorySource`] keeps
//! everything in process.

mod github;
mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use github::GitHubSource;
pub use memory::MemorySource;

use crate::{
    error::Result,
    snippet::{SnippetParts, version_id},
};

/// Listings are 1-based.
pub const FIRST_PAGE: u32 = 1;

/// A file reference inside a listed gist.
///
/// Listings usually omit `content`; it is fetched through `raw_url`. A file
/// with inline content and no `raw_url` needs no round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub filename: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub raw_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOwner {
    pub login: String,
}

/// A gist as listed by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGist {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub public: bool,
    #[serde(default)]
    pub owner: Option<RemoteOwner>,
    pub files: BTreeMap<String, RemoteFile>,
    #[serde(default)]
    pub comments: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
}

impl RemoteGist {
    pub fn version_id(&self) -> String {
        version_id(&self.id, &self.updated_at)
    }

    pub fn parts(&self) -> SnippetParts {
        SnippetParts {
            remote_id: self.id.clone(),
            owner: self
                .owner
                .as_ref()
                .map(|o| o.login.clone())
                .unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            public: self.public,
            comment_count: self.comments,
            created_at: self.created_at,
            updated_at: self.updated_at,
            url: self.html_url.clone(),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<RemoteGist>,
    /// The page to request next, `None` once the listing is exhausted.
    pub next: Option<u32>,
}

/// A gist to be created remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGist {
    pub description: String,
    pub public: bool,
    /// Filename to content.
    pub files: BTreeMap<String, String>,
}

pub trait RemoteSource: Sync {
    /// The login of the authenticated user.
    fn login(&self) -> Result<String>;

    fn list_owned(&self, page: u32) -> Result<Page>;

    fn list_starred(&self, page: u32) -> Result<Page>;

    fn fetch_file_content(&self, file: &RemoteFile) -> Result<String>;

    /// Create a gist and return it as the remote now lists it.
    fn create(&self, gist: &NewGist) -> Result<RemoteGist>;

    fn delete(&self, remote_id: &str) -> Result<()>;
}
