use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("could not open index at {path}: {reason}")]
    IndexOpen { path: PathBuf, reason: String },

    #[error("no credentials found; run 'gistshelf sync --token <github token>'")]
    ConfigMissing,

    #[error(
        "credentials file {0} is unreadable; run 'gistshelf sync --token <github token>'"
    )]
    ConfigCorrupt(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("remote authentication failed: {0}")]
    RemoteAuth(String),

    #[error("listing {listing} failed on page {page}: {reason}")]
    RemotePagination {
        listing: &'static str,
        page: u32,
        reason: String,
    },

    #[error("fetching {file} failed: {reason}")]
    ContentFetch { file: String, reason: String },

    #[error("remote request failed: {0}")]
    RemoteRequest(String),

    #[error("indexed record {id} is malformed: field '{field}'")]
    MalformedRecord { id: String, field: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("sync cancelled")]
    Cancelled,

    #[error("another gistshelf process holds the library lock at {0}")]
    Locked(PathBuf),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}
