//! gistshelf - a local, searchable mirror of your GitHub gists.
//!
//! A sync pulls the owned and starred gists of a user into a
//! [Tantivy](https://github.com/quickwit-oss/tantivy) index, fetching file
//! content only for versions it has not seen. Queries combine free text with
//! exact tag, language, owner, star and visibility filters, and fall back to
//! fuzzy matching when nothing matches exactly.
//!
//! # Quick start
//!
//! ```no_run
//! use gistshelf::{Credentials, DataDir, GitHubSource, Library};
//! use gistshelf::query::SearchQuery;
//! use gistshelf::sync::{CancelToken, SyncOptions};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let credentials = Credentials::load(&data_dir.config_file()).unwrap();
//! let source = GitHubSource::new(&credentials.token);
//! let mut library = Library::open(data_dir).unwrap();
//!
//! library
//!     .sync(&source, &SyncOptions::default(), &CancelToken::new())
//!     .unwrap();
//!
//! let query = SearchQuery {
//!     term: "quicksort".to_string(),
//!     ..Default::default()
//! };
//! for snippet in library.search(&query).unwrap().hits {
//!     println!("{} {}", snippet.idx, snippet.description);
//! }
//! ```

pub mod artifacts;
pub mod config;
pub mod data_dir;
pub mod document_index;
pub mod error;
pub mod facet;
pub mod library;
pub mod projector;
pub mod query;
pub mod remote;
pub mod snippet;
pub mod sync;
pub mod tantivy_index;

pub use config::Credentials;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use library::Library;
pub use remote::{GitHubSource, MemorySource, RemoteSource};
pub use snippet::{LibrarySummary, Snippet, SnippetFile, Tag};
pub use tantivy_index::SearchIndex;
