//! The index capability consumed by the sync and query engines.
//!
//! Queries are typed clause trees rather than query strings, so filter
//! values never pass through a query parser. Hits come back as flattened
//! key/value documents; [`crate::projector`] turns them into snippets.

use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::{
    error::{Error, Result},
    snippet::Snippet,
};

/// Indexed fields addressable by clauses, sorts and facets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexField {
    Id,
    RemoteId,
    Idx,
    Owner,
    Description,
    Public,
    Starred,
    FileCount,
    Languages,
    Filenames,
    Tags,
    CommentCount,
    CreatedAt,
    UpdatedAt,
}

impl IndexField {
    /// The key used for the field in flattened documents.
    pub fn key(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::RemoteId => "remoteId",
            Self::Idx => "idx",
            Self::Owner => "owner",
            Self::Description => "description",
            Self::Public => "public",
            Self::Starred => "starred",
            Self::FileCount => "fileCount",
            Self::Languages => "languages",
            Self::Filenames => "filenames",
            Self::Tags => "tags",
            Self::CommentCount => "commentCount",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }
}

impl fmt::Display for IndexField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Fields that can be summarized by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetField {
    Tags,
    Languages,
    Owner,
}

impl FacetField {
    pub fn field(self) -> IndexField {
        match self {
            Self::Tags => IndexField::Tags,
            Self::Languages => IndexField::Languages,
            Self::Owner => IndexField::Owner,
        }
    }
}

impl FromStr for FacetField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tag" | "tags" => Ok(Self::Tags),
            "language" | "languages" => Ok(Self::Languages),
            "owner" | "owners" => Ok(Self::Owner),
            other => Err(Error::InvalidFilter(format!(
                "cannot summarize '{other}' (expected tags, languages or owner)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermValue {
    Text(String),
    Bool(bool),
    U64(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    All,
    /// Free text, analyzed and matched against every text field.
    Text(String),
    /// Free text matched by edit distance against every text field.
    Fuzzy { text: String, distance: u8 },
    /// Exact equality on a keyword, flag or numeric field.
    Term { field: IndexField, value: TermValue },
    Bool(Vec<(Occur, Clause)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: IndexField,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub clause: Clause,
    /// `None` orders by descending score. Ties under either order go to the
    /// higher score, then to the newest `updatedAt`.
    pub sort: Option<SortSpec>,
    pub limit: usize,
}

/// A flattened stored document.
///
/// Scalars are keyed by field name, multi-valued fields hold arrays, and
/// file entries are keyed `files.<filename>.<attribute>`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub score: f32,
    pub fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    pub hits: Vec<RawHit>,
    /// Number of matching documents before the limit.
    pub total: u64,
}

#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Drop every document; only valid as the first op of a batch.
    DeleteAll,
    Index(Box<Snippet>),
    Delete(String),
}

/// An ordered set of operations applied atomically.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete_all(&mut self) {
        self.ops.insert(0, BatchOp::DeleteAll);
    }

    pub fn index(&mut self, snippet: Snippet) {
        self.ops.push(BatchOp::Index(Box::new(snippet)));
    }

    pub fn delete(&mut self, id: impl Into<String>) {
        self.ops.push(BatchOp::Delete(id.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

pub trait DocumentIndex {
    /// Apply every op of the batch or none of them.
    fn apply(&mut self, batch: Batch) -> Result<()>;

    fn index(&mut self, snippet: Snippet) -> Result<()> {
        let mut batch = Batch::new();
        batch.index(snippet);
        self.apply(batch)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let mut batch = Batch::new();
        batch.delete(id);
        self.apply(batch)
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchHits>;

    /// Distinct values of `field` with the number of documents holding
    /// each, at most `limit` values, count descending.
    fn facet(&self, field: FacetField, limit: usize) -> Result<Vec<(String, u64)>>;

    fn doc_count(&self) -> Result<u64>;
}
